//! `bin`: a single archive with every built platform under `bin/<os>-<arch>/`.

use distforge_core::plugin::decode_plugin_config;
use distforge_core::{DistId, Dister, ProductOutputInfo};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::archive::{copy_file, entries_from_dir, reset_dir, write_tar_gz};
use crate::RunOutput;

pub const TYPE_NAME: &str = "bin";

/// Legacy keys that configured the generated launcher; the launcher now lives in the dist script.
const LEGACY_LAUNCHER_KEYS: [&str; 2] = ["omit-init-sh", "init-sh-template-file"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BinConfig {}

/// Legacy bin configuration only carried launcher settings, so it upgrades to an empty config.
pub fn upgrade_config(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    if config.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let mut value: Value = serde_yaml::from_slice(config)?;
    let Some(mapping) = value.as_mapping_mut() else {
        decode_plugin_config::<BinConfig>(config)?;
        return Ok(config.to_vec());
    };
    if mapping.remove("legacy-config") != Some(Value::Bool(true)) {
        decode_plugin_config::<BinConfig>(config)?;
        return Ok(config.to_vec());
    }
    for key in LEGACY_LAUNCHER_KEYS {
        mapping.remove(key);
    }
    let _: BinConfig = serde_yaml::from_value(value)?;
    Ok(Vec::new())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinDister;

impl BinDister {
    pub fn from_config(config: &[u8]) -> anyhow::Result<Self> {
        let BinConfig {} = decode_plugin_config(config)?;
        Ok(Self)
    }
}

impl Dister for BinDister {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn artifacts(&self, rendered_name: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![format!("{}.tgz", rendered_name)])
    }

    fn packaging_extension(&self) -> &str {
        "tgz"
    }

    fn run_dist(&self, dist: &DistId, output: &ProductOutputInfo) -> anyhow::Result<Vec<u8>> {
        if output.os_archs.is_empty() {
            anyhow::bail!("product \"{}\" has no os-archs to package", output.product);
        }
        let work_dir = output.dist_work_dir(dist);
        reset_dir(&work_dir)?;
        let mut staged = Vec::new();
        for os_arch in &output.os_archs {
            let relative = format!("bin/{}/{}", os_arch, output.product);
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
        // Scripts may add files next to the staged executables, so the whole work dir is archived.
        let entries = entries_from_dir(&run.work_dir, &rendered)?;
        write_tar_gz(
            &output.artifact_path(dist, &format!("{}.tgz", rendered)),
            &entries,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_launcher_settings_are_dropped() {
        let upgraded = upgrade_config(b"legacy-config: true\nomit-init-sh: false\n").expect("upgrade");
        assert!(upgraded.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(upgrade_config(b"omit-init-sh: true\n").is_err());
        assert!(BinDister::from_config(b"extension: zip\n").is_err());
    }

    #[test]
    fn single_tgz_artifact() {
        let dister = BinDister::from_config(b"").expect("dister");
        assert_eq!(dister.artifacts("foo-1.0.0").expect("artifacts"), vec!["foo-1.0.0.tgz"]);
    }
}
