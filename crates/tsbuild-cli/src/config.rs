//! CLI configuration.

use std::path::PathBuf;

/// Defaults that command-line flags override.
pub struct Config {
    /// Compiler executable used by `compile`.
    pub tsc_path: String,

    /// Directory source patterns are resolved against.
    pub project_root: PathBuf,

    /// Log filter used when neither `--log` nor `RUST_LOG` is set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tsc_path: "tsc".to_string(),
            project_root: PathBuf::from("."),
            log_filter: "info".to_string(),
        }
    }
}
