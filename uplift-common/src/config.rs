//! Configuration loading and database path resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Optional TOML configuration file contents.
///
/// Looked up at `<os config dir>/uplift/config.toml` (Linux also checks
/// `/etc/uplift/config.toml`).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TomlConfig {
    pub database: Option<String>,
}

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `UPLIFT_DATABASE` environment variable
/// 3. TOML config file (`database` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(cli_arg: Option<&str>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("UPLIFT_DATABASE") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_config_file() {
        if let Some(database) = config.database {
            return Ok(PathBuf::from(database));
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_database_path())
}

/// Load and parse the platform config file, if one exists
pub fn load_config_file() -> Result<TomlConfig> {
    let path = find_config_file()?;
    let contents = std::fs::read_to_string(&path)?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("uplift").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/uplift/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("uplift").join("uplift.db"))
        .unwrap_or_else(|| PathBuf::from("./uplift.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_takes_priority() {
        let path = resolve_database_path(Some("/tmp/explicit.db")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
    }

    #[test]
    fn test_fallback_produces_some_path() {
        // Without a CLI argument the resolver must still land on a usable path
        let path = resolve_database_path(None).unwrap();
        assert!(!path.as_os_str().is_empty());
    }
}
