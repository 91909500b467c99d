//! Logging bootstrap shared by endpoints, the authenticator and the discovery layer.
//!
//! A process either loads a `sloggers`-compatible TOML config (the same format used by the
//! sample host/client binaries) from disk, or falls back to a sane terminal default.

use serdeconv;
use slog::Logger;
use sloggers::{Config, LoggerConfig};

const DEFAULT_CONFIG: &str = r#"
type = "terminal"
level = "info"
destination = "stderr"
"#;

/// Build the default terminal logger. Used by the sample programs and by tests.
pub fn default_logger() -> Logger {
    let config: LoggerConfig = serdeconv::from_toml_str(DEFAULT_CONFIG).expect("built-in logging config is valid");
    config.build_logger().expect("terminal logger always builds")
}

/// Load a logger from a TOML config file, falling back to [`default_logger`] if the file is
/// missing or malformed. Intended for the sample host/client binaries, which look for a
/// `logging.toml` next to the executable.
pub fn load_or_default<P: AsRef<std::path::Path>>(path: P) -> Logger {
    match serdeconv::from_toml_file::<LoggerConfig, _>(path) {
        Ok(config) => config.build_logger().unwrap_or_else(|_| default_logger()),
        Err(_) => default_logger(),
    }
}
