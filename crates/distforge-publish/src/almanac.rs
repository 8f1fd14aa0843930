//! `almanac`: records a release (metadata, tags, artifact digests) as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use distforge_core::plugin::{decode_plugin_config, file_name, upgrade_unchanged_shape};
use distforge_core::{PublishOutcome, PublishRequest, Publisher};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{sha256_file, PublishError};

pub const TYPE_NAME: &str = "almanac";

pub const RELEASE_FILE_NAME: &str = "almanac-release.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AlmanacConfig {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Where the release record is written; defaults to the first artifact's directory.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output_dir: String,
}

/// Legacy almanac blocks (`metadata`, `tags`) keep their shape; only the marker is dropped.
pub fn upgrade_config(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    upgrade_unchanged_shape::<AlmanacConfig>(config)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseRecord {
    pub product: String,
    pub version: String,
    pub group_id: String,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub artifacts: Vec<ReleaseArtifact>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseArtifact {
    pub name: String,
    pub sha256: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlmanacPublisher {
    config: AlmanacConfig,
}

impl AlmanacPublisher {
    pub fn new(config: AlmanacConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(decode_plugin_config(config)?))
    }

    pub fn record(&self, request: &PublishRequest) -> anyhow::Result<ReleaseRecord> {
        let mut artifacts = Vec::with_capacity(request.artifacts.len());
        for artifact in &request.artifacts {
            artifacts.push(ReleaseArtifact {
                name: file_name(artifact)?,
                sha256: sha256_file(artifact)?,
            });
        }
        Ok(ReleaseRecord {
            product: request.product.to_string(),
            version: request.version.clone(),
            group_id: request.group_id.clone(),
            metadata: self.config.metadata.clone(),
            tags: self.config.tags.clone(),
            artifacts,
        })
    }

    fn output_dir(&self, request: &PublishRequest) -> Result<PathBuf, PublishError> {
        if !self.config.output_dir.is_empty() {
            return Ok(PathBuf::from(&self.config.output_dir));
        }
        request
            .artifacts
            .first()
            .and_then(|artifact| artifact.parent())
            .map(|dir| dir.to_path_buf())
            .ok_or_else(|| PublishError::InvalidConfig {
                publisher: TYPE_NAME,
                message: format!(
                    "output-dir is required when product \"{}\" has no artifacts",
                    request.product
                ),
            })
    }
}

impl Publisher for AlmanacPublisher {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn publish(&self, request: &PublishRequest) -> anyhow::Result<PublishOutcome> {
        request.validate()?;
        let record = self.record(request)?;
        let dest = self.output_dir(request)?.join(RELEASE_FILE_NAME);
        let location = Some(dest.display().to_string());
        if request.dry_run {
            info!(product = %request.product, file = %dest.display(), "dry run: release record not written");
            return Ok(PublishOutcome {
                uploaded: vec![RELEASE_FILE_NAME.to_string()],
                location,
                ..PublishOutcome::default()
            });
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(PublishError::io(parent))?;
        }
        let mut json = serde_json::to_string_pretty(&record)?;
        json.push('\n');
        fs::write(&dest, json).map_err(PublishError::io(&dest))?;
        info!(product = %request.product, tags = record.tags.len(), "wrote almanac release record");
        Ok(PublishOutcome {
            uploaded: vec![RELEASE_FILE_NAME.to_string()],
            skipped: Vec::new(),
            location,
        })
    }
}
