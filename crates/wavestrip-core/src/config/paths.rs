//! Path utilities for wavestrip configuration files

use std::path::PathBuf;

/// Get the wavestrip configuration directory
///
/// Returns: `<config_dir>/wavestrip` (e.g. `~/.config/wavestrip` on Linux),
/// falling back to `./wavestrip` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wavestrip")
}

/// Get the default config file path for a given file name
///
/// Returns: `<config_dir>/wavestrip/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// Default location of the decimator configuration
pub fn default_decimator_config_path() -> PathBuf {
    default_config_path("decimator.yaml")
}
