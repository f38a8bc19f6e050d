// build.rs
// Compiles the sandbox GLSL shaders to SPIR-V with glslc from the Vulkan SDK

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK, or place SPIR-V in target/shaders");
        return;
    };

    let glslc = glslc_path(&vulkan_sdk);
    if !glslc.exists() {
        panic!("glslc not found at {}", glslc.display());
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let shader_dir = manifest_dir.join("shaders");
    let target_dir = manifest_dir.join("../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {}: {}", target_dir.display(), e);
        return;
    }

    let Ok(entries) = std::fs::read_dir(&shader_dir) else {
        eprintln!("info: No shader directory at {}", shader_dir.display());
        return;
    };

    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(stem) = path.file_stem() else { continue };
        if !is_shader {
            continue;
        }

        let out_file = target_dir.join(stem).with_extension("spv");
        if is_up_to_date(&path, &out_file) {
            continue;
        }

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}", path.display(), out_file.display());
                compiled += 1;
            }
            Ok(s) => panic!("glslc failed for {} with exit code {}", path.display(), s.code().unwrap_or(-1)),
            Err(e) => panic!("Failed to run glslc for {}: {}", path.display(), e),
        }
    }

    eprintln!("info: Compiled {} shader(s)", compiled);
}

fn glslc_path(vulkan_sdk: &str) -> PathBuf {
    if cfg!(target_os = "windows") {
        Path::new(vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        Path::new(vulkan_sdk).join("bin").join("glslc")
    }
}

fn is_up_to_date(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src <= dst,
        _ => false,
    }
}
