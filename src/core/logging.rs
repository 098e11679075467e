//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// voxlume::core::logging::init();
/// log::info!("Engine started");
/// ```
pub fn init() {
    init_with_filter("info");
}

/// Initialize logging with an explicit default filter (e.g. from [`EngineConfig`]).
///
/// RUST_LOG still takes precedence. Calling this more than once is harmless;
/// later calls are ignored.
///
/// [`EngineConfig`]: crate::core::config::EngineConfig
pub fn init_with_filter(filter: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter)
    ).try_init();
}
