//! Frozen model of the legacy (`legacy-config: true`) configuration.
//!
//! Nothing here is written back out except the per-type payloads, which are
//! re-serialized with `legacy-config: true` and handed to plugin upgraders.

use std::collections::BTreeMap;

use serde::de::{self, DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use super::decode::{OneOrMany, Tagged};
use super::exclude::ExcludeConfig;
use crate::product::OsArch;

fn is_false(value: &bool) -> bool {
    !*value
}

fn payload<T: DeserializeOwned, E: de::Error>(tagged: &Tagged, field: &str) -> Result<T, E> {
    tagged.payload_as(field).map_err(E::custom)
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyProject {
    pub legacy_config: bool,
    pub products: BTreeMap<String, LegacyProduct>,
    pub build_output_dir: String,
    pub dist_output_dir: String,
    pub dist_script_include: String,
    pub group_id: String,
    pub exclude: ExcludeConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LegacyProduct {
    pub build: LegacyBuild,
    pub run: LegacyRun,
    /// `None` when the key is absent. An explicitly empty list fails to decode.
    pub dist: Option<OneOrMany<LegacyDist>>,
    pub docker: Vec<LegacyDockerImage>,
    /// Applies to a dist that declares no publish block of its own.
    pub publish: LegacyPublish,
}

impl LegacyProduct {
    pub fn dists(&self) -> &[LegacyDist] {
        self.dist.as_deref().unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyBuild {
    pub skip: bool,
    pub script: String,
    pub main_pkg: String,
    pub output_dir: String,
    pub build_args_script: String,
    pub version_var: String,
    pub environment: BTreeMap<String, String>,
    pub os_archs: Vec<OsArch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LegacyRun {
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyDist {
    pub output_dir: String,
    /// Directory whose contents were copied into the dist work directory.
    pub input_dir: String,
    pub input_products: Vec<String>,
    pub script: String,
    pub dist_type: LegacyDistInfo,
    pub publish: LegacyPublish,
}

/// The `dist-type` node: a `type` discriminator selecting the shape of `info`.
#[derive(Clone, Debug, PartialEq)]
pub enum LegacyDistInfo {
    OsArchBin(OsArchBinDist),
    Bin(BinDist),
    Manual(ManualDist),
    Sls(SlsDist),
    Rpm(RpmDist),
    /// Accepted at decode time; rejected by the upgrade engine.
    Unknown {
        type_name: String,
        info: Option<Value>,
    },
}

impl Default for LegacyDistInfo {
    fn default() -> Self {
        LegacyDistInfo::OsArchBin(OsArchBinDist::default())
    }
}

impl LegacyDistInfo {
    pub fn type_name(&self) -> &str {
        match self {
            LegacyDistInfo::OsArchBin(_) => "os-arch-bin",
            LegacyDistInfo::Bin(_) => "bin",
            LegacyDistInfo::Manual(_) => "manual",
            LegacyDistInfo::Sls(_) => "sls",
            LegacyDistInfo::Rpm(_) => "rpm",
            LegacyDistInfo::Unknown { type_name, .. } => type_name,
        }
    }
}

impl<'de> Deserialize<'de> for LegacyDistInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const FIELD: &str = "info";
        let value = Value::deserialize(deserializer)?;
        let tagged = Tagged::split(value, FIELD).map_err(D::Error::custom)?;
        let info = match tagged.type_name.as_str() {
            "" | "os-arch-bin" => LegacyDistInfo::OsArchBin(payload::<_, D::Error>(&tagged, FIELD)?),
            "bin" => LegacyDistInfo::Bin(payload::<_, D::Error>(&tagged, FIELD)?),
            "manual" => LegacyDistInfo::Manual(payload::<_, D::Error>(&tagged, FIELD)?),
            "sls" => LegacyDistInfo::Sls(payload::<_, D::Error>(&tagged, FIELD)?),
            "rpm" => LegacyDistInfo::Rpm(payload::<_, D::Error>(&tagged, FIELD)?),
            _ => LegacyDistInfo::Unknown {
                type_name: tagged.type_name,
                info: tagged.payload,
            },
        };
        Ok(info)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct OsArchBinDist {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub os_archs: Vec<OsArch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BinDist {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    /// Absent and `true` both mean no launcher script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omit_init_sh: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub init_sh_template_file: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ManualDist {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extension: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SlsDist {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub init_sh_template_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub manifest_template_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_args: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub manifest_extensions: Mapping,
    #[serde(skip_serializing_if = "is_false")]
    pub reloadable: bool,
    #[serde(skip_serializing_if = "ExcludeConfig::is_empty")]
    pub yml_validation_exclude: ExcludeConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RpmDist {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub release: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub before_install_script: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub after_install_script: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub after_remove_script: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyDockerImage {
    pub repository: String,
    pub tag: String,
    pub context_dir: String,
    pub dependencies: Vec<LegacyDockerDep>,
    pub info: LegacyDockerImageInfo,
    pub build_args_script: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyDockerDep {
    pub product: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub target_file: String,
}

/// The image `info` node: a `type` discriminator selecting the shape of `data`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LegacyDockerImageInfo {
    /// No structured builder; the default builder applies.
    #[default]
    None,
    Sls(SlsDockerImageInfo),
    Unknown {
        type_name: String,
        data: Option<Value>,
    },
}

impl<'de> Deserialize<'de> for LegacyDockerImageInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const FIELD: &str = "data";
        let value = Value::deserialize(deserializer)?;
        let tagged = Tagged::split(value, FIELD).map_err(D::Error::custom)?;
        let info = match tagged.type_name.as_str() {
            "" => LegacyDockerImageInfo::None,
            "sls" => LegacyDockerImageInfo::Sls(payload::<_, D::Error>(&tagged, FIELD)?),
            _ => LegacyDockerImageInfo::Unknown {
                type_name: tagged.type_name,
                data: tagged.payload,
            },
        };
        Ok(info)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SlsDockerImageInfo {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub manifest_extensions: Mapping,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyPublish {
    pub group_id: String,
    pub almanac: LegacyAlmanac,
}

impl LegacyPublish {
    pub fn is_empty(&self) -> bool {
        self.group_id.is_empty() && self.almanac.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LegacyAlmanac {
    #[serde(skip_serializing_if = "is_false")]
    pub legacy_config: bool,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

impl LegacyAlmanac {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.tags.is_empty()
    }
}
