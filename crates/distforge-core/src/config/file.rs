use std::path::{Path, PathBuf};

use super::decode::decode_strict;
use super::schema::ProjectConfig;
use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "dist-plugin.yml";
pub const LEGACY_CONFIG_FILE_NAME: &str = "dist.yml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    Current(PathBuf),
    Legacy(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Current(path) | ConfigSource::Legacy(path) => path,
        }
    }
}

/// Finds the config file in `config_dir`, preferring the current file name.
pub fn locate_config(config_dir: &Path) -> Option<ConfigSource> {
    let current = config_dir.join(CONFIG_FILE_NAME);
    if current.is_file() {
        return Some(ConfigSource::Current(current));
    }
    let legacy = config_dir.join(LEGACY_CONFIG_FILE_NAME);
    if legacy.is_file() {
        return Some(ConfigSource::Legacy(legacy));
    }
    None
}

pub fn read_config_bytes(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the current-schema config from `config_dir`; a missing file yields the empty config.
pub fn load_project_config(config_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let bytes = read_config_bytes(&path)?;
    Ok(decode_strict("configuration", &bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        path.push(format!("distforge-core-{}-{}", name, stamp));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    #[test]
    fn missing_config_is_empty() {
        let dir = temp_dir("missing-config");
        assert_eq!(locate_config(&dir), None);
        assert_eq!(
            load_project_config(&dir).expect("config"),
            ProjectConfig::default()
        );
    }

    #[test]
    fn current_file_is_preferred_over_legacy() {
        let dir = temp_dir("both-configs");
        std::fs::write(dir.join(LEGACY_CONFIG_FILE_NAME), "legacy-config: true\n")
            .expect("write legacy");
        assert!(matches!(locate_config(&dir), Some(ConfigSource::Legacy(_))));
        std::fs::write(dir.join(CONFIG_FILE_NAME), "products: {}\n").expect("write current");
        assert_eq!(
            locate_config(&dir),
            Some(ConfigSource::Current(dir.join(CONFIG_FILE_NAME)))
        );
    }

    #[test]
    fn decode_errors_name_the_configuration() {
        let dir = temp_dir("invalid-config");
        std::fs::write(dir.join(CONFIG_FILE_NAME), "bogus: 1\n").expect("write config");
        let error = load_project_config(&dir).expect_err("error");
        assert!(matches!(error, ConfigError::Decode(_)));
        assert!(error.to_string().starts_with("failed to decode configuration"));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let dir = temp_dir("invalid-utf8");
        std::fs::write(dir.join(CONFIG_FILE_NAME), b"products: {\"fo\xffo\": {}}\n")
            .expect("write config");
        let error = load_project_config(&dir).expect_err("invalid utf-8");
        assert!(matches!(error, ConfigError::Decode(_)));
        assert!(error.to_string().starts_with("failed to decode configuration"));
    }
}
