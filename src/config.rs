// Configuration file handling
//
// The rc file lives at ~/.lotledger/rc and holds `key=value` lines:
//
//   data.location=./ledger.db
//   user.role=admin
//
// Blank lines and lines starting with '#' are ignored.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::models::Role;

/// Effective configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_location: PathBuf,
    pub role: Role,
}

impl Config {
    /// Ledger home directory (~/.lotledger)
    pub fn home_dir() -> Result<PathBuf> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .context("Failed to determine home directory")?;
        Ok(home.join(".lotledger"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("rc"))
    }

    /// Get the default database path
    pub fn default_data_location() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("ledger.db"))
    }

    /// Load configuration from the rc file, falling back to defaults
    pub fn load() -> Result<Config> {
        let config_path = Self::config_path()?;
        let default = Config {
            data_location: Self::default_data_location()?,
            role: Role::default(),
        };

        if !config_path.exists() {
            return Ok(default);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        Ok(Self::parse(&contents, &config_path, default))
    }

    /// Apply rc file contents on top of `base`
    pub fn parse(contents: &str, config_path: &Path, base: Config) -> Config {
        let mut config = base;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("Ignoring malformed config line: {}", line);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "data.location" => {
                    let path = PathBuf::from(value);
                    // Relative paths resolve against the config file directory
                    config.data_location = if path.is_relative() {
                        config_path
                            .parent()
                            .map(|dir| dir.join(&path))
                            .unwrap_or(path)
                    } else {
                        path
                    };
                }
                "user.role" => match Role::from_str(value) {
                    Some(role) => config.role = role,
                    None => {
                        log::warn!("Unknown role '{}' in config, using '{}'", value, Role::User.as_str());
                        config.role = Role::User;
                    }
                },
                other => log::debug!("Ignoring unknown config key: {}", other),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            data_location: PathBuf::from("/default/ledger.db"),
            role: Role::User,
        }
    }

    #[test]
    fn test_parse_relative_location() {
        let config = Config::parse("data.location=./custom.db\n", Path::new("/home/a/.lotledger/rc"), base());
        assert_eq!(config.data_location, PathBuf::from("/home/a/.lotledger/./custom.db"));
        assert_eq!(config.role, Role::User);
    }

    #[test]
    fn test_parse_absolute_location_and_role() {
        let contents = "# comment\ndata.location=/tmp/x.db\nuser.role=admin\n";
        let config = Config::parse(contents, Path::new("/home/a/.lotledger/rc"), base());
        assert_eq!(config.data_location, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.role, Role::Admin);
    }

    #[test]
    fn test_unknown_role_falls_back_to_user() {
        let config = Config::parse("user.role=superuser\n", Path::new("/rc"), Config { role: Role::Admin, ..base() });
        assert_eq!(config.role, Role::User);
    }

    #[test]
    fn test_malformed_lines_ignored() {
        let config = Config::parse("garbage\n\n", Path::new("/rc"), base());
        assert_eq!(config, base());
    }
}
