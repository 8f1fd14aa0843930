use super::decode::decode_strict;
use super::schema::ProjectConfig;
use crate::error::{ConfigError, DecodeError};

pub fn serialize_config(config: &ProjectConfig) -> Result<String, ConfigError> {
    serde_yaml::to_string(config).map_err(|source| ConfigError::Serialization {
        context: "configuration".to_string(),
        source,
    })
}

pub fn deserialize_config(input: &str) -> Result<ProjectConfig, DecodeError> {
    decode_strict("configuration", input.as_bytes())
}
