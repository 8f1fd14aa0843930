use std::fs;
use std::path::{Path, PathBuf};

use distforge_core::plugin::{decode_plugin_config, file_name, upgrade_unchanged_shape};
use distforge_core::{PublishOutcome, PublishRequest, Publisher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::maven::{pom_file_name, render_pom, repository_path};
use crate::{sha256_file, PublishError};

pub const TYPE_NAME: &str = "local";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LocalConfig {
    /// Root of the local repository.
    pub path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_pom: bool,
}

pub fn upgrade_config(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    upgrade_unchanged_shape::<LocalConfig>(config)
}

/// Publishes into a Maven-style directory tree on the local file system.
pub struct LocalPublisher {
    root: PathBuf,
    write_pom: bool,
}

impl LocalPublisher {
    pub fn new(config: LocalConfig) -> Result<Self, PublishError> {
        if config.path.trim().is_empty() {
            return Err(PublishError::InvalidConfig {
                publisher: TYPE_NAME,
                message: "path is required".to_string(),
            });
        }
        Ok(Self {
            root: PathBuf::from(config.path),
            write_pom: !config.no_pom,
        })
    }

    pub fn from_config(config: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(decode_plugin_config(config)?)?)
    }

    pub fn release_dir(&self, request: &PublishRequest) -> PathBuf {
        self.root
            .join(repository_path(&request.group_id, &request.product, &request.version))
    }
}

impl Publisher for LocalPublisher {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn publish(&self, request: &PublishRequest) -> anyhow::Result<PublishOutcome> {
        request.validate()?;
        let release_dir = self.release_dir(request);
        let mut outcome = PublishOutcome {
            location: Some(path_to_url(&release_dir)),
            ..PublishOutcome::default()
        };
        if request.dry_run {
            for artifact in &request.artifacts {
                outcome.uploaded.push(file_name(artifact)?);
            }
            info!(product = %request.product, dir = %release_dir.display(), "dry run: nothing written");
            return Ok(outcome);
        }
        fs::create_dir_all(&release_dir).map_err(PublishError::io(&release_dir))?;

        for artifact in &request.artifacts {
            let name = file_name(artifact)?;
            let dest = release_dir.join(&name);
            if dest.exists() {
                debug!(artifact = %name, "already published");
                outcome.skipped.push(name);
                continue;
            }
            fs::copy(artifact, &dest).map_err(PublishError::io(&dest))?;
            write_checksum(&dest)?;
            outcome.uploaded.push(name);
        }

        if self.write_pom {
            let name = pom_file_name(&request.product, &request.version);
            let dest = release_dir.join(&name);
            if dest.exists() {
                outcome.skipped.push(name);
            } else {
                let pom = render_pom(
                    &request.product,
                    &request.version,
                    &request.group_id,
                    &request.packaging_extension,
                );
                fs::write(&dest, pom).map_err(PublishError::io(&dest))?;
                write_checksum(&dest)?;
                outcome.uploaded.push(name);
            }
        }

        info!(
            product = %request.product,
            uploaded = outcome.uploaded.len(),
            skipped = outcome.skipped.len(),
            "published to local repository"
        );
        Ok(outcome)
    }
}

/// Writes `<file>.sha256` holding the digest and file name.
fn write_checksum(path: &Path) -> Result<(), PublishError> {
    let digest = sha256_file(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut checksum_path = path.as_os_str().to_owned();
    checksum_path.push(".sha256");
    let checksum_path = PathBuf::from(checksum_path);
    fs::write(&checksum_path, format!("{}  {}\n", digest, name))
        .map_err(PublishError::io(&checksum_path))
}

fn path_to_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_required() {
        let error = LocalPublisher::from_config(b"no-pom: true\n")
            .err()
            .expect("missing path");
        assert!(error.to_string().contains("path is required"));
    }

    #[test]
    fn legacy_config_upgrades() {
        let upgraded = upgrade_config(b"legacy-config: true\npath: out/repo\n").expect("upgrade");
        assert_eq!(String::from_utf8(upgraded).expect("utf-8"), "path: out/repo\n");
    }
}
