pub mod api;
pub mod core;

/// Installs the `env_logger` backend. Defaults to `info`; `RUST_LOG` overrides.
/// Calling it again is a no-op.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
