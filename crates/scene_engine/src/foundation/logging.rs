//! Logging utilities
//!
//! The engine logs through the `log` facade; hosts install `env_logger`
//! through [`init`] or [`init_with_filters`].

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system at `info`, honouring `RUST_LOG` when set.
///
/// Repeated calls are ignored.
pub fn init() {
    init_with_filters("info");
}

/// Initialize the logging system from an env_logger filter string
/// (for example `"debug"` or `"scene_engine::render=trace,info"`).
///
/// `RUST_LOG` takes precedence over `filters`. Returns false when a logger
/// was already installed.
pub fn init_with_filters(filters: &str) -> bool {
    let env = env_logger::Env::default().default_filter_or(filters);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_with_filters("warn");
        assert!(!init_with_filters("debug"));
    }
}
