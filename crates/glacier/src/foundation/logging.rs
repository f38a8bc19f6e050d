//! Logging setup
//!
//! Glacier logs through the `log` facade. Binaries pick the backend; this
//! module wires up `env_logger`, which honours `RUST_LOG`.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a default level used when `RUST_LOG` is unset
pub fn init_with_level(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
