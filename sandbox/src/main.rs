//! Sandbox: an indexed, vertex-colored quad tinted by an animated uniform

use std::f64::consts::PI;
use std::path::PathBuf;
use std::rc::Rc;

use glacier::foundation::logging;
use glacier::prelude::*;

/// Per-frame color shift, one float per channel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct TestUniform {
    modifier_a: f32,
    modifier_b: f32,
    modifier_c: f32,
}

impl TestUniform {
    /// Three cosines a third of a turn apart
    fn at(time: f64) -> Self {
        Self {
            modifier_a: ((time.cos() + 1.0) / 2.0) as f32,
            modifier_b: ((time + 2.0 * PI / 3.0).cos() / 2.0) as f32,
            modifier_c: ((time + 4.0 * PI / 3.0).cos() / 2.0) as f32,
        }
    }
}

#[rustfmt::skip]
const VERTICES: [f32; 24] = [
    // position          color
    -1.0, -1.0, 0.0,     1.0, 0.0, 0.0,
     1.0, -1.0, 0.0,     0.0, 1.0, 0.0,
     1.0,  1.0, 0.0,     0.0, 0.0, 1.0,
    -1.0,  1.0, 0.0,     0.0, 1.0, 0.0,
];

const INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/shaders")
}

struct SandboxApp {
    config: ApplicationConfig,
    timer: f64,
    uniform: TestUniform,
    uniform_buffer: Option<Rc<UniformBuffer>>,
    pipeline: Option<PipelineId>,
}

impl SandboxApp {
    fn new() -> Self {
        let window = WindowConfig::new("SandboxApp", 800, 600)
            .with_min_size(640, 480)
            .with_resizable(true);
        let config = ApplicationConfig::new("SandboxApp")
            .with_version(0, 1, 0)
            .with_vsync(true)
            .with_window(window);

        Self {
            config,
            timer: 0.0,
            uniform: TestUniform::at(0.0),
            uniform_buffer: None,
            pipeline: None,
        }
    }
}

impl Application for SandboxApp {
    fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    fn initialize(&mut self, renderer: &mut Renderer) -> Result<(), AppError> {
        let shaders = shader_dir();
        let vertex_shader = renderer.load_shader(shaders.join("vertex.spv"))?;
        let fragment_shader = renderer.load_shader(shaders.join("fragment.spv"))?;

        let layout = VertexLayout::new()
            .with(ElementType::Float, 3)?
            .with(ElementType::Float, 3)?;
        let vertex_buffer = renderer.create_vertex_buffer(layout, &VERTICES)?;
        let index_buffer = renderer.create_index_buffer(&INDICES)?;
        let uniform_buffer = renderer.create_uniform_buffer(&self.uniform)?;

        let descriptor = PipelineDescriptor::new(vertex_buffer)
            .with_shader(ShaderStage::Vertex, vertex_shader)
            .with_shader(ShaderStage::Fragment, fragment_shader)
            .with_index_buffer(index_buffer)
            .with_uniform_buffer(Rc::clone(&uniform_buffer));

        self.pipeline = Some(renderer.add_pipeline(descriptor)?);
        self.uniform_buffer = Some(uniform_buffer);
        Ok(())
    }

    fn update(&mut self, delta_time: f64) -> Result<(), AppError> {
        self.timer += delta_time;
        self.uniform = TestUniform::at(self.timer);
        Ok(())
    }

    fn render(&mut self, renderer: &mut Renderer) -> Result<(), AppError> {
        if let Some(uniform_buffer) = &self.uniform_buffer {
            uniform_buffer.update(renderer.current_slot()?, &self.uniform)?;
        }
        renderer.record_pipelines()?;
        Ok(())
    }

    fn terminate(&mut self, renderer: &mut Renderer) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = renderer.remove_pipeline(pipeline) {
                log::warn!("Failed to remove pipeline: {}", e);
            }
        }
        self.uniform_buffer = None;
    }
}

fn main() {
    logging::init_with_level(log::LevelFilter::Debug);

    if let Err(e) = glacier::run(SandboxApp::new()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
