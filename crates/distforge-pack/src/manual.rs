//! `manual`: the dist script produces the artifact; the dister only checks it exists.

use distforge_core::plugin::{decode_plugin_config, upgrade_unchanged_shape};
use distforge_core::{DistId, Dister, ProductOutputInfo};
use serde::{Deserialize, Serialize};

use crate::archive::reset_dir;
use crate::{PackError, RunOutput};

pub const TYPE_NAME: &str = "manual";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ManualConfig {
    /// Extension of the produced artifact, without the leading dot.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extension: String,
}

pub fn upgrade_config(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    upgrade_unchanged_shape::<ManualConfig>(config)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManualDister {
    extension: String,
}

impl ManualDister {
    pub fn new(config: ManualConfig) -> Self {
        Self {
            extension: config.extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(decode_plugin_config(config)?))
    }

    fn artifact_name(&self, rendered_name: &str) -> String {
        if self.extension.is_empty() {
            rendered_name.to_string()
        } else {
            format!("{}.{}", rendered_name, self.extension)
        }
    }
}

impl Dister for ManualDister {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn artifacts(&self, rendered_name: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![self.artifact_name(rendered_name)])
    }

    fn packaging_extension(&self) -> &str {
        &self.extension
    }

    fn run_dist(&self, dist: &DistId, output: &ProductOutputInfo) -> anyhow::Result<Vec<u8>> {
        let work_dir = output.dist_work_dir(dist);
        reset_dir(&work_dir)?;
        RunOutput {
            work_dir,
            staged: Vec::new(),
        }
        .to_bytes()
    }

    fn generate_dist_artifacts(
        &self,
        dist: &DistId,
        output: &ProductOutputInfo,
        _run_output: &[u8],
    ) -> anyhow::Result<()> {
        let artifact = output.artifact_path(dist, &self.artifact_name(&output.rendered_name()));
        if !artifact.is_file() {
            return Err(PackError::MissingFile { path: artifact }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_uses_extension_when_set() {
        let dister = ManualDister::from_config(b"extension: .tar.gz\n").expect("dister");
        assert_eq!(dister.artifacts("foo-1.0.0").expect("artifacts"), vec!["foo-1.0.0.tar.gz"]);
        assert_eq!(dister.packaging_extension(), "tar.gz");

        let bare = ManualDister::from_config(b"").expect("dister");
        assert_eq!(bare.artifacts("foo-1.0.0").expect("artifacts"), vec!["foo-1.0.0"]);
    }
}
