//! Configuration file discovery and loading
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable
//! 3. `<user config dir>/aiia/config.toml`, then `/etc/aiia/config.toml` on Linux
//! 4. None (built-in defaults apply)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternate config file
pub const CONFIG_ENV_VAR: &str = "AIIA_CONFIG";

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "aiia";

/// Locate the configuration file to load, if any
///
/// An explicit path or environment override is returned even if the file
/// does not exist, so that the caller reports the typo instead of silently
/// falling back to defaults.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_candidates().into_iter().find(|p| p.exists())
}

/// Platform default config file locations, most specific first
fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR_NAME).join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml"));
    }
    candidates
}

/// Read and deserialize a TOML config file
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Config(format!("Config file not found: {}", path.display()))
        } else {
            Error::Io(e)
        }
    })?;

    let value = toml::from_str(&content)?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(value)
}

/// Load config from the resolved location, or `T::default()` if none exists
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
    env_var_name: &str,
) -> Result<T> {
    match resolve_config_file(cli_arg, env_var_name) {
        Some(path) => load_toml_file(&path),
        None => {
            tracing::debug!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;
    use tempfile::TempDir;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        threshold: f64,
    }

    #[test]
    #[serial]
    fn test_cli_path_takes_priority_over_env() {
        std::env::set_var("AIIA_TEST_CONFIG_A", "/from/env.toml");
        let resolved = resolve_config_file(Some(Path::new("/from/cli.toml")), "AIIA_TEST_CONFIG_A");
        assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));
        std::env::remove_var("AIIA_TEST_CONFIG_A");
    }

    #[test]
    #[serial]
    fn test_env_path_used_without_cli() {
        std::env::set_var("AIIA_TEST_CONFIG_B", "/from/env.toml");
        let resolved = resolve_config_file(None, "AIIA_TEST_CONFIG_B");
        assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));
        std::env::remove_var("AIIA_TEST_CONFIG_B");
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "name = \"demo\"\nthreshold = 0.25\n").unwrap();

        let loaded: Sample = load_toml_file(&path).unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(loaded.threshold, 0.25);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let result: Result<Sample> = load_toml_file(Path::new("/nonexistent/aiia.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "threshold = [unterminated").unwrap();

        let result: Result<Sample> = load_toml_file(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unreadable_config_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result: Result<Sample> = load_toml_file(dir.path());
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
