use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Error as _, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

use super::decode::map_or_single;
use super::exclude::ExcludeConfig;
use crate::product::{
    DependencyList, DistId, DockerId, OsArch, ProductDistId, ProductId, PublisherTypeId,
};

/// Version written by the current schema. A config without a `version` key is read as this version.
pub const SCHEMA_VERSION: &str = "0";

/// Dister type used when a dister entry omits `type`.
pub const DEFAULT_DISTER_TYPE: &str = "os-arch-bin";

/// Docker builder type used when a legacy image declares no structured builder.
pub const DEFAULT_DOCKER_BUILDER_TYPE: &str = "default";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProjectConfig {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "version_string"
    )]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub products: BTreeMap<ProductId, ProductConfig>,
    /// Applied to any product that omits a section (or, for build/dist/publish, a field of one).
    #[serde(skip_serializing_if = "ProductConfig::is_empty")]
    pub product_defaults: ProductConfig,
    /// Shell content prepended to every non-empty dist and docker script.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub script_includes: String,
    #[serde(skip_serializing_if = "ExcludeConfig::is_empty")]
    pub exclude: ExcludeConfig,
}

/// Accepts `version: 0` as well as `version: "0"`.
fn version_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(version) => Ok(Some(version)),
        Value::Number(version) => Ok(Some(version.to_string())),
        other => Err(D::Error::custom(format!(
            "version must be a string or number, found {:?}",
            other
        ))),
    }
}

impl ProjectConfig {
    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.products.keys()
    }

    /// Returns the configuration for `id` with `product-defaults` applied, or `None` for an unknown id.
    pub fn product(&self, id: &ProductId) -> Option<ProductConfig> {
        self.products
            .get(id)
            .map(|product| product.with_defaults(&self.product_defaults))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProductConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist: Option<DistConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyList>,
}

impl ProductConfig {
    pub fn is_empty(&self) -> bool {
        self == &ProductConfig::default()
    }

    fn with_defaults(&self, defaults: &ProductConfig) -> ProductConfig {
        ProductConfig {
            build: merge_section(&self.build, &defaults.build, BuildConfig::fill_from),
            run: self.run.clone().or_else(|| defaults.run.clone()),
            dist: merge_section(&self.dist, &defaults.dist, DistConfig::fill_from),
            publish: merge_section(&self.publish, &defaults.publish, PublishConfig::fill_from),
            docker: self.docker.clone().or_else(|| defaults.docker.clone()),
            dependencies: self
                .dependencies
                .clone()
                .or_else(|| defaults.dependencies.clone()),
        }
    }
}

fn merge_section<T: Clone>(
    own: &Option<T>,
    defaults: &Option<T>,
    fill: fn(&mut T, &T),
) -> Option<T> {
    match (own, defaults) {
        (Some(own), Some(defaults)) => {
            let mut merged = own.clone();
            fill(&mut merged, defaults);
            Some(merged)
        }
        (Some(own), None) => Some(own.clone()),
        (None, defaults) => defaults.clone(),
    }
}

fn fill<T: Clone>(field: &mut Option<T>, default: &Option<T>) {
    if field.is_none() {
        field.clone_from(default);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_pkg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_args_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_var: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_archs: Option<Vec<OsArch>>,
}

impl BuildConfig {
    fn fill_from(&mut self, defaults: &BuildConfig) {
        fill(&mut self.main_pkg, &defaults.main_pkg);
        fill(&mut self.output_dir, &defaults.output_dir);
        fill(&mut self.build_args_script, &defaults.build_args_script);
        fill(&mut self.version_var, &defaults.version_var);
        fill(&mut self.environment, &defaults.environment);
        fill(&mut self.os_archs, &defaults.os_archs);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RunConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DistConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disters: Option<DistersConfig>,
}

impl DistConfig {
    fn fill_from(&mut self, defaults: &DistConfig) {
        fill(&mut self.output_dir, &defaults.output_dir);
        fill(&mut self.disters, &defaults.disters);
    }
}

/// Disters of a product keyed by dist id.
///
/// Decodes from either a map of id to dister or a single dister, which is
/// keyed by its type name. A node whose keys are all dister fields (`type`,
/// `config`, `script`) is a single dister, so dist ids cannot use those names.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DistersConfig(pub BTreeMap<DistId, DisterConfig>);

impl DistersConfig {
    pub fn single(id: DistId, dister: DisterConfig) -> Self {
        let mut map = BTreeMap::new();
        map.insert(id, dister);
        Self(map)
    }

    pub fn get(&self, id: &DistId) -> Option<&DisterConfig> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DistId, &DisterConfig)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

const DISTER_FIELDS: &[&str] = &["type", "config", "script"];

impl<'de> Deserialize<'de> for DistersConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        map_or_single(value, DISTER_FIELDS, |dister: &DisterConfig| {
            DistId::from(dister.type_name())
        })
        .map(DistersConfig)
        .map_err(D::Error::custom)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DisterConfig {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PluginConfig>,
    /// Runs after the dist work directory is populated and before artifacts are generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl DisterConfig {
    pub fn type_name(&self) -> &str {
        self.type_.as_deref().unwrap_or(DEFAULT_DISTER_TYPE)
    }
}

/// Plugin-owned configuration block, kept as an opaque YAML node until a
/// plugin of the owning type is constructed from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig(pub Value);

impl PluginConfig {
    /// Parses upgrader output. Empty or null documents mean "no configuration".
    pub fn from_yaml_bytes(bytes: &[u8]) -> Result<Option<Self>, serde_yaml::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: Value = serde_yaml::from_slice(bytes)?;
        Ok(if value.is_null() {
            None
        } else {
            Some(PluginConfig(value))
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_yaml::Error> {
        serde_yaml::to_string(&self.0).map(String::into_bytes)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Raw bytes handed to a plugin constructor; empty when the entry has no `config`.
pub fn plugin_bytes(config: Option<&PluginConfig>) -> Result<Vec<u8>, serde_yaml::Error> {
    config.map_or_else(|| Ok(Vec::new()), PluginConfig::to_bytes)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PublishConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<BTreeMap<PublisherTypeId, PublisherConfig>>,
}

impl PublishConfig {
    fn fill_from(&mut self, defaults: &PublishConfig) {
        fill(&mut self.group_id, &defaults.group_id);
        fill(&mut self.info, &defaults.info);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PublisherConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PluginConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DockerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_builders: Option<BTreeMap<DockerId, DockerBuilderConfig>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DockerBuilderConfig {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PluginConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dists: Option<Vec<ProductDistId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_templates: Option<TagTemplates>,
}

impl DockerBuilderConfig {
    pub fn type_name(&self) -> &str {
        self.type_.as_deref().unwrap_or(DEFAULT_DOCKER_BUILDER_TYPE)
    }
}

/// Tag templates of a docker builder: a plain list, or named templates whose
/// declaration order is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagTemplates {
    List(Vec<String>),
    Named(Vec<(String, String)>),
}

impl TagTemplates {
    pub fn templates(&self) -> Vec<&str> {
        match self {
            TagTemplates::List(items) => items.iter().map(String::as_str).collect(),
            TagTemplates::Named(items) => items.iter().map(|(_, tpl)| tpl.as_str()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TagTemplates::List(items) => items.is_empty(),
            TagTemplates::Named(items) => items.is_empty(),
        }
    }
}

impl Serialize for TagTemplates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TagTemplates::List(items) => items.serialize(serializer),
            TagTemplates::Named(items) => {
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (name, template) in items {
                    map.serialize_entry(name, template)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TagTemplates {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TagTemplatesVisitor;

        impl<'de> Visitor<'de> for TagTemplatesVisitor {
            type Value = TagTemplates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of tag templates or a map of name to tag template")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(TagTemplates::List(items))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut items: Vec<(String, String)> = Vec::new();
                while let Some((name, template)) = map.next_entry::<String, String>()? {
                    if items.iter().any(|(existing, _)| existing == &name) {
                        return Err(A::Error::custom(format!(
                            "duplicate tag template name {:?}",
                            name
                        )));
                    }
                    items.push((name, template));
                }
                Ok(TagTemplates::Named(items))
            }
        }

        deserializer.deserialize_any(TagTemplatesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> ProjectConfig {
        serde_yaml::from_str(input).expect("decode")
    }

    #[test]
    fn single_dister_is_keyed_by_type() {
        let config = decode(
            r#"
products:
  foo:
    dist:
      disters:
        type: manual
        config:
          extension: tar
"#,
        );
        let disters = config.products[&ProductId::from("foo")]
            .dist
            .as_ref()
            .and_then(|dist| dist.disters.as_ref())
            .expect("disters");
        assert_eq!(disters.len(), 1);
        let dister = disters.get(&DistId::from("manual")).expect("manual");
        assert_eq!(dister.type_name(), "manual");
    }

    #[test]
    fn single_dister_without_type_uses_default_key() {
        let config = decode("products:\n  foo:\n    dist:\n      disters:\n        script: echo hi\n");
        let dist = config.products[&ProductId::from("foo")].dist.clone().expect("dist");
        let disters = dist.disters.expect("disters");
        assert!(disters.get(&DistId::from(DEFAULT_DISTER_TYPE)).is_some());
    }

    #[test]
    fn config_only_dister_is_not_a_dist_named_config() {
        let config = decode(
            "products:\n  foo:\n    dist:\n      disters:\n        config:\n          type: manual\n",
        );
        let dist = config.products[&ProductId::from("foo")].dist.clone().expect("dist");
        let disters = dist.disters.expect("disters");
        assert_eq!(disters.len(), 1);
        assert!(disters.get(&DistId::from("config")).is_none());
        let dister = disters
            .get(&DistId::from(DEFAULT_DISTER_TYPE))
            .expect("default dister");
        assert_eq!(dister.type_name(), DEFAULT_DISTER_TYPE);
        assert!(dister.config.is_some());
    }

    #[test]
    fn dister_map_keeps_ids() {
        let config = decode(
            r#"
products:
  foo:
    dist:
      disters:
        primary:
          type: os-arch-bin
        docs:
          type: manual
"#,
        );
        let dist = config.products[&ProductId::from("foo")].dist.clone().expect("dist");
        let ids: Vec<String> = dist
            .disters
            .expect("disters")
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, vec!["docs", "primary"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = serde_yaml::from_str::<ProjectConfig>("products:\n  foo:\n    bogus: 1\n")
            .expect_err("unknown key");
        assert!(error.to_string().contains("bogus"));
    }

    #[test]
    fn named_tag_templates_keep_declaration_order() {
        let templates: TagTemplates =
            serde_yaml::from_str("release: \"{{Version}}\"\nlatest: latest\n").expect("decode");
        assert_eq!(templates.templates(), vec!["{{Version}}", "latest"]);
        let encoded = serde_yaml::to_string(&templates).expect("encode");
        assert!(encoded.find("release").expect("release") < encoded.find("latest").expect("latest"));
    }

    #[test]
    fn product_defaults_fill_missing_sections_and_fields() {
        let config = decode(
            r#"
products:
  foo:
    build:
      main-pkg: ./cmd/foo
  bar: {}
product-defaults:
  build:
    output-dir: out/build
  publish:
    group-id: com.example
"#,
        );
        let foo = config.product(&ProductId::from("foo")).expect("foo");
        let build = foo.build.expect("build");
        assert_eq!(build.main_pkg.as_deref(), Some("./cmd/foo"));
        assert_eq!(build.output_dir.as_deref(), Some("out/build"));
        let bar = config.product(&ProductId::from("bar")).expect("bar");
        assert_eq!(
            bar.publish.and_then(|publish| publish.group_id).as_deref(),
            Some("com.example")
        );
        assert!(config.product(&ProductId::from("missing")).is_none());
    }

    #[test]
    fn empty_plugin_output_means_no_config() {
        assert_eq!(PluginConfig::from_yaml_bytes(b"").expect("empty"), None);
        assert_eq!(PluginConfig::from_yaml_bytes(b"null\n").expect("null"), None);
        let config = PluginConfig::from_yaml_bytes(b"extension: tgz\n")
            .expect("decode")
            .expect("some");
        assert_eq!(config.as_value()["extension"], Value::from("tgz"));
    }
}
