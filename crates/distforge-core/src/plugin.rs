//! Contracts implemented by dist, docker builder and publisher plugins.
//!
//! Plugins are external code, so every fallible method returns
//! [`anyhow::Result`]; callers wrap failures with the plugin category and type.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Value;

use crate::product::{DistId, DockerId, OsArch, ProductDistId, ProductId};

/// Migrates one plugin type's configuration bytes from an older schema to the current one.
pub trait ConfigUpgrader: Send + Sync {
    fn upgrade_config(&self, config: &[u8]) -> anyhow::Result<Vec<u8>>;
}

impl<F> ConfigUpgrader for F
where
    F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn upgrade_config(&self, config: &[u8]) -> anyhow::Result<Vec<u8>> {
        self(config)
    }
}

/// Where a product's build and dist outputs live for one version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductOutputInfo {
    pub product: ProductId,
    pub version: String,
    pub project_dir: PathBuf,
    pub build_output_dir: PathBuf,
    pub os_archs: Vec<OsArch>,
    pub dist_output_dir: PathBuf,
}

impl ProductOutputInfo {
    /// `<build-output-dir>/<version>/<os>-<arch>/<product>`
    pub fn executable(&self, os_arch: &OsArch) -> PathBuf {
        self.build_output_dir
            .join(&self.version)
            .join(os_arch.to_string())
            .join(self.product.as_str())
    }

    /// `<dist-output-dir>/<version>/<dist-id>`
    pub fn dist_dir(&self, dist: &DistId) -> PathBuf {
        self.dist_output_dir.join(&self.version).join(dist.as_str())
    }

    /// `<dist-dir>/<product>-<version>`; dist scripts see this as `$DIST_WORK_DIR`.
    pub fn dist_work_dir(&self, dist: &DistId) -> PathBuf {
        self.dist_dir(dist)
            .join(format!("{}-{}", self.product, self.version))
    }

    /// Product name with version, used as the artifact base name.
    pub fn rendered_name(&self) -> String {
        format!("{}-{}", self.product, self.version)
    }

    pub fn artifact_path(&self, dist: &DistId, file_name: &str) -> PathBuf {
        self.dist_dir(dist).join(file_name)
    }
}

/// Turns a built product into one packaged dist.
///
/// `run_dist` populates the dist work directory and returns plugin-defined
/// bytes that are passed back into `generate_dist_artifacts`, which must
/// produce exactly the files `artifacts` names.
pub trait Dister: Send + Sync {
    fn type_name(&self) -> &str;

    fn artifacts(&self, rendered_name: &str) -> anyhow::Result<Vec<String>>;

    /// Maven packaging type for the primary artifact; may be empty.
    fn packaging_extension(&self) -> &str;

    fn run_dist(&self, dist: &DistId, output: &ProductOutputInfo) -> anyhow::Result<Vec<u8>>;

    fn generate_dist_artifacts(
        &self,
        dist: &DistId,
        output: &ProductOutputInfo,
        run_output: &[u8],
    ) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockerBuildRequest {
    pub product: ProductId,
    pub version: String,
    pub repository: Option<String>,
    pub context_dir: PathBuf,
    pub tag_templates: Vec<String>,
    pub input_dists: Vec<ProductDistId>,
}

/// Plans a container image build. Execution is left to the caller.
pub trait DockerBuilder: Send + Sync {
    fn type_name(&self) -> &str;

    /// Arguments for the `docker` command line, not including the program name.
    fn build_args(&self, docker: &DockerId, request: &DockerBuildRequest) -> anyhow::Result<Vec<String>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishRequest {
    pub product: ProductId,
    pub version: String,
    pub group_id: String,
    pub artifacts: Vec<PathBuf>,
    pub packaging_extension: String,
    pub dry_run: bool,
}

impl PublishRequest {
    /// Checks the fields every publisher relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.product.as_str().trim().is_empty() {
            anyhow::bail!("product is required");
        }
        if self.version.trim().is_empty() {
            anyhow::bail!("version is required");
        }
        if self.group_id.trim().is_empty() {
            anyhow::bail!("group-id is required for product \"{}\"", self.product);
        }
        for artifact in &self.artifacts {
            if !artifact.is_file() {
                anyhow::bail!("artifact '{}' does not exist", artifact.display());
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub location: Option<String>,
}

pub trait Publisher: Send + Sync {
    fn type_name(&self) -> &str;

    fn publish(&self, request: &PublishRequest) -> anyhow::Result<PublishOutcome>;
}

/// Decodes a plugin's `config` bytes; empty or null input gives the default config.
pub fn decode_plugin_config<T: DeserializeOwned + Default>(config: &[u8]) -> anyhow::Result<T> {
    if config.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: Value = serde_yaml::from_slice(config)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Upgrader for plugin configs whose shape did not change between schemas.
///
/// Legacy input (`legacy-config: true`) loses its marker and is re-encoded.
/// Current input is validated and returned as given.
pub fn upgrade_unchanged_shape<T>(config: &[u8]) -> anyhow::Result<Vec<u8>>
where
    T: DeserializeOwned + Serialize + Default,
{
    let mut value: Value = if config.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_yaml::from_slice(config)?
    };
    let legacy = match value.as_mapping_mut() {
        Some(mapping) => mapping.remove("legacy-config") == Some(Value::Bool(true)),
        None => false,
    };
    let decoded: T = if value.is_null() {
        T::default()
    } else {
        serde_yaml::from_value(value)?
    };
    if legacy {
        Ok(serde_yaml::to_string(&decoded)?.into_bytes())
    } else {
        Ok(config.to_vec())
    }
}

/// File name of `path`, for outcome reporting.
pub fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|value| value.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("path '{}' has no file name", path.display()))
}
