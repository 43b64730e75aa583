//! YAML configuration I/O
//!
//! Generic loading and saving for any serde configuration type. Loading is
//! forgiving: a missing or unreadable file yields the type's defaults, so a
//! broken config never prevents waveforms from rendering.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read and parse a YAML configuration file
///
/// Unlike [`load_config`] this reports every failure to the caller.
pub fn try_load_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Load configuration from a YAML file, falling back to defaults
///
/// A missing file is normal (first run) and logged at info level; a file that
/// exists but cannot be read or parsed logs a warning.
///
/// ```ignore
/// let config: DecimatorConfig = load_config(&default_decimator_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match try_load_config(path) {
        Ok(config) => {
            log::info!("load_config: Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecimatorConfig;
    use crate::decimator::ReductionStrategy;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: DecimatorConfig = load_config(Path::new("/nonexistent/path/decimator.yaml"));
        assert_eq!(config, DecimatorConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("decimator.yaml");

        let config = DecimatorConfig {
            strategy: ReductionStrategy::MinMaxValue,
            num_readers: 3,
            normalise_output: true,
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: DecimatorConfig = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_try_load_reports_errors() {
        let err = try_load_config::<DecimatorConfig>(Path::new("/nonexistent/decimator.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decimator.yaml");
        std::fs::write(&path, "strategy: [not, a, strategy").unwrap();

        let config: DecimatorConfig = load_config(&path);
        assert_eq!(config, DecimatorConfig::default());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decimator.yaml");
        std::fs::write(&path, "strategy: avgValue\nmulti_reader: false\n").unwrap();

        let config: DecimatorConfig = load_config(&path);
        assert_eq!(config.strategy, ReductionStrategy::AvgValue);
        assert!(!config.multi_reader);
        assert_eq!(config.num_readers, DecimatorConfig::default().num_readers);
    }
}
