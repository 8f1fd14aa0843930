//! `os-arch-bin`: one archive per OS/arch holding that platform's executable.

use distforge_core::plugin::{decode_plugin_config, upgrade_unchanged_shape};
use distforge_core::{DistId, Dister, OsArch, ProductOutputInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::{copy_file, file_entry, reset_dir, write_tar_gz};
use crate::{current_os_arch, RunOutput};

pub const TYPE_NAME: &str = "os-arch-bin";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct OsArchBinConfig {
    /// Platforms to package; defaults to the platform running the dist.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub os_archs: Vec<OsArch>,
}

pub fn upgrade_config(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    upgrade_unchanged_shape::<OsArchBinConfig>(config)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OsArchBinDister {
    os_archs: Vec<OsArch>,
}

impl OsArchBinDister {
    pub fn new(config: OsArchBinConfig) -> Self {
        let os_archs = if config.os_archs.is_empty() {
            vec![current_os_arch()]
        } else {
            config.os_archs
        };
        Self { os_archs }
    }

    pub fn from_config(config: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(decode_plugin_config(config)?))
    }

    pub fn os_archs(&self) -> &[OsArch] {
        &self.os_archs
    }

    fn artifact_name(rendered_name: &str, os_arch: &OsArch) -> String {
        format!("{}-{}-{}.tgz", rendered_name, os_arch.os, os_arch.arch)
    }
}

impl Dister for OsArchBinDister {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn artifacts(&self, rendered_name: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .os_archs
            .iter()
            .map(|os_arch| Self::artifact_name(rendered_name, os_arch))
            .collect())
    }

    fn packaging_extension(&self) -> &str {
        "tgz"
    }

    fn run_dist(&self, dist: &DistId, output: &ProductOutputInfo) -> anyhow::Result<Vec<u8>> {
        let work_dir = output.dist_work_dir(dist);
        reset_dir(&work_dir)?;
        let mut staged = Vec::new();
        for os_arch in &self.os_archs {
            let relative = format!("{}/{}", os_arch, output.product);
            copy_file(&output.executable(os_arch), &work_dir.join(&relative))?;
            debug!(product = %output.product, %os_arch, "staged executable");
            staged.push(relative);
        }
        RunOutput { work_dir, staged }.to_bytes()
    }

    fn generate_dist_artifacts(
        &self,
        dist: &DistId,
        output: &ProductOutputInfo,
        run_output: &[u8],
    ) -> anyhow::Result<()> {
        let run = RunOutput::from_bytes(run_output)?;
        let rendered = output.rendered_name();
        for os_arch in &self.os_archs {
            let executable = run.work_dir.join(os_arch.to_string()).join(output.product.as_str());
            let entry = file_entry(
                &executable,
                &format!("{}/{}", rendered, output.product),
            )?;
            let artifact = output.artifact_path(dist, &Self::artifact_name(&rendered, os_arch));
            write_tar_gz(&artifact, &[entry])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifacts_follow_os_arch_naming() {
        let dister = OsArchBinDister::from_config(
            b"os-archs:\n  - {os: linux, arch: amd64}\n  - {os: darwin, arch: arm64}\n",
        )
        .expect("dister");
        assert_eq!(
            dister.artifacts("foo-1.0.0").expect("artifacts"),
            vec!["foo-1.0.0-linux-amd64.tgz", "foo-1.0.0-darwin-arm64.tgz"]
        );
        assert_eq!(dister.packaging_extension(), "tgz");
    }

    #[test]
    fn empty_config_targets_current_platform() {
        let dister = OsArchBinDister::from_config(b"").expect("dister");
        assert_eq!(dister.os_archs(), &[current_os_arch()]);
    }

    #[test]
    fn legacy_config_upgrades_to_same_shape() {
        let upgraded = upgrade_config(b"legacy-config: true\nos-archs:\n- os: linux\n  arch: amd64\n")
            .expect("upgrade");
        let config: OsArchBinConfig = serde_yaml::from_slice(&upgraded).expect("decode");
        assert_eq!(config.os_archs, vec![OsArch::new("linux", "amd64")]);
    }
}
