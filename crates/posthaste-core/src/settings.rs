//! Optional user settings file.
//!
//! Values here fill in whatever the command line and environment leave
//! unset. The file lives at `<config dir>/posthaste/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::credentials::IdentityScheme;
use crate::error::ConfigError;

/// Defaults loaded from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub username: Option<String>,
    pub identity: Option<IdentityScheme>,
    pub auth_url: Option<String>,
    pub region: Option<String>,
    pub internal: Option<bool>,
    pub service_name: Option<String>,
    pub threads: Option<usize>,
    pub queue_ceiling: Option<usize>,
}

impl Settings {
    /// Location of the settings file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("posthaste").join("config.toml"))
    }

    /// Load settings from the default location.
    ///
    /// A missing file yields empty settings; an unreadable or malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "username = \"alice\"\nidentity = \"password\"\nregion = \"ORD\"\nthreads = 32\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.username.as_deref(), Some("alice"));
        assert_eq!(settings.identity, Some(IdentityScheme::Password));
        assert_eq!(settings.region.as_deref(), Some("ORD"));
        assert_eq!(settings.threads, Some(32));
        assert!(settings.auth_url.is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "colour = \"blue\"\n").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let err = Settings::load_from(&temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
