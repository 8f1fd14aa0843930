use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use super::script::{bin_init_sh, input_dir, translate_env_vars, ScriptBuilder};
use crate::config::legacy::{
    LegacyAlmanac, LegacyBuild, LegacyDist, LegacyDistInfo, LegacyDockerImage,
    LegacyDockerImageInfo, LegacyProduct, LegacyProject, LegacyPublish, ManualDist,
    OsArchBinDist, RpmDist, SlsDist, SlsDockerImageInfo,
};
use crate::config::schema::{
    BuildConfig, DistConfig, DistersConfig, DisterConfig, DockerBuilderConfig, DockerConfig,
    PluginConfig, ProductConfig, ProjectConfig, PublishConfig, PublisherConfig, RunConfig,
    TagTemplates, DEFAULT_DOCKER_BUILDER_TYPE, SCHEMA_VERSION,
};
use crate::error::{ConfigError, PluginCategory};
use crate::product::{DependencyList, DistId, DockerId, ProductDistId, ProductId, PublisherTypeId};
use crate::registry::Registries;

/// Publisher type that owns the legacy `publish.almanac` block.
pub const ALMANAC_PUBLISHER_TYPE: &str = "almanac";

/// Result of migrating a legacy project.
#[derive(Clone, Debug, PartialEq)]
pub enum Migration {
    /// The legacy input has no effect; there is nothing to write.
    Unchanged,
    Migrated(ProjectConfig),
}

/// Migrates a decoded legacy project into the current schema.
///
/// Products are processed in sorted id order. The first failing product
/// aborts the migration; no partially migrated config is returned.
pub fn upgrade_legacy_project(
    legacy: &LegacyProject,
    registries: &Registries,
) -> Result<Migration, ConfigError> {
    let mut upgraded = ProjectConfig::default();

    let defaults = &mut upgraded.product_defaults;
    if let Some(output_dir) = non_empty(&legacy.build_output_dir) {
        defaults.build = Some(BuildConfig {
            output_dir: Some(output_dir),
            ..BuildConfig::default()
        });
    }
    if let Some(output_dir) = non_empty(&legacy.dist_output_dir) {
        defaults.dist = Some(DistConfig {
            output_dir: Some(output_dir),
            ..DistConfig::default()
        });
    }
    if let Some(group_id) = non_empty(&legacy.group_id) {
        defaults.publish = Some(PublishConfig {
            group_id: Some(group_id),
            ..PublishConfig::default()
        });
    }
    upgraded.script_includes = translate_env_vars(&legacy.dist_script_include);
    upgraded.exclude = legacy.exclude.clone();

    let defaults_publish = upgraded.product_defaults.publish.is_some();
    // BTreeMap iteration is sorted by product id.
    for (id, product) in &legacy.products {
        let id = ProductId::from(id.as_str());
        debug!(product = %id, "migrating legacy product configuration");
        let mut migrated = ProductMigration::new(&id, registries).run(product)?;
        if defaults_publish && migrated.publish.is_none() {
            migrated.publish = Some(PublishConfig::default());
        }
        upgraded.products.insert(id, migrated);
    }

    if upgraded == ProjectConfig::default() {
        debug!("legacy configuration is equivalent to an empty configuration");
        return Ok(Migration::Unchanged);
    }
    upgraded.version = Some(SCHEMA_VERSION.to_string());
    info!(
        products = upgraded.products.len(),
        "migrated legacy configuration"
    );
    Ok(Migration::Migrated(upgraded))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

struct ProductMigration<'a> {
    id: &'a ProductId,
    registries: &'a Registries,
    dependencies: DependencyList,
}

impl<'a> ProductMigration<'a> {
    fn new(id: &'a ProductId, registries: &'a Registries) -> Self {
        Self {
            id,
            registries,
            dependencies: DependencyList::new(),
        }
    }

    fn run(mut self, legacy: &LegacyProduct) -> Result<ProductConfig, ConfigError> {
        let mut product = ProductConfig {
            build: self.build(&legacy.build)?,
            ..ProductConfig::default()
        };
        if !legacy.run.args.is_empty() {
            product.run = Some(RunConfig {
                args: Some(legacy.run.args.clone()),
            });
        }

        let synthesized;
        let dists = match &legacy.dist {
            None if !legacy.build.os_archs.is_empty() => {
                warn!(
                    product = %self.id,
                    "no dist configured; adding the os-arch-bin dist that legacy builds produced implicitly"
                );
                synthesized = [default_os_arch_bin_dist(&legacy.build)];
                &synthesized[..]
            }
            _ => legacy.dists(),
        };
        match dists {
            [] => {
                if !legacy.publish.is_empty() {
                    warn!(
                        product = %self.id,
                        "product has a publish block but no dist; the publish block is dropped"
                    );
                }
            }
            [dist] => {
                let (dist, publish) = self.dist(dist, &legacy.publish)?;
                product.dist = Some(dist);
                product.publish = publish;
            }
            _ => {
                return Err(ConfigError::unsupported(
                    self.id,
                    "dist",
                    format!(
                        "{} dist configurations are declared, but migration supports at most one",
                        dists.len()
                    ),
                ))
            }
        }

        if !legacy.docker.is_empty() {
            let mut builders = BTreeMap::new();
            for (index, image) in legacy.docker.iter().enumerate() {
                let builder = self.docker_image(index, image)?;
                builders.insert(DockerId::from(format!("docker-image-{}", index)), builder);
            }
            product.docker = Some(DockerConfig {
                repository: None,
                docker_builders: Some(builders),
            });
        }

        if !self.dependencies.is_empty() {
            product.dependencies = Some(self.dependencies);
        }
        Ok(product)
    }

    fn build(&self, legacy: &LegacyBuild) -> Result<Option<BuildConfig>, ConfigError> {
        if !legacy.script.is_empty() {
            return Err(ConfigError::unsupported(
                self.id,
                "build.script",
                "build scripts are no longer supported",
            ));
        }
        if legacy.skip {
            warn!(product = %self.id, "build.skip is set; the migrated product has no build section");
            return Ok(None);
        }
        let build = BuildConfig {
            main_pkg: non_empty(&legacy.main_pkg),
            output_dir: non_empty(&legacy.output_dir),
            build_args_script: non_empty(&legacy.build_args_script),
            version_var: non_empty(&legacy.version_var),
            environment: (!legacy.environment.is_empty()).then(|| legacy.environment.clone()),
            os_archs: (!legacy.os_archs.is_empty()).then(|| legacy.os_archs.clone()),
        };
        Ok((build != BuildConfig::default()).then_some(build))
    }

    fn dist(
        &mut self,
        legacy: &LegacyDist,
        product_publish: &LegacyPublish,
    ) -> Result<(DistConfig, Option<PublishConfig>), ConfigError> {
        let type_name = legacy.dist_type.type_name().to_string();
        let mut script = ScriptBuilder::new();

        let payload = match &legacy.dist_type {
            LegacyDistInfo::OsArchBin(info) => Some(self.encode(&OsArchBinDist {
                legacy_config: true,
                ..info.clone()
            })?),
            LegacyDistInfo::Manual(info) => Some(self.encode(&ManualDist {
                legacy_config: true,
                ..info.clone()
            })?),
            LegacyDistInfo::Sls(info) => Some(self.encode(&SlsDist {
                legacy_config: true,
                ..info.clone()
            })?),
            LegacyDistInfo::Rpm(info) => Some(self.encode(&RpmDist {
                legacy_config: true,
                ..info.clone()
            })?),
            LegacyDistInfo::Bin(info) => {
                if info.omit_init_sh == Some(false) {
                    if !info.init_sh_template_file.is_empty() {
                        return Err(ConfigError::unsupported(
                            self.id,
                            "dist.dist-type.info.init-sh-template-file",
                            "custom init.sh templates for bin dists are no longer supported",
                        ));
                    }
                    script.push(bin_init_sh());
                }
                None
            }
            LegacyDistInfo::Unknown { type_name, .. } => {
                return Err(ConfigError::unsupported(
                    self.id,
                    "dist.dist-type.type",
                    format!("unsupported dist type \"{}\"", type_name),
                ))
            }
        };
        let config = match payload {
            Some(bytes) => self.delegate(PluginCategory::Dister, &type_name, &bytes)?,
            None => None,
        };

        if !legacy.input_dir.is_empty() {
            script.push(input_dir(&legacy.input_dir));
        }
        for input in &legacy.input_products {
            self.depend_on(input);
        }
        if !legacy.script.is_empty() {
            script.push(translate_env_vars(&legacy.script));
        }

        let dister = DisterConfig {
            type_: Some(type_name.clone()),
            config,
            script: script.render(),
        };
        let dist = DistConfig {
            output_dir: non_empty(&legacy.output_dir),
            disters: Some(DistersConfig::single(DistId::from(type_name), dister)),
        };

        let publish = if legacy.publish.is_empty() {
            product_publish
        } else {
            &legacy.publish
        };
        Ok((dist, self.publish(publish)?))
    }

    fn publish(&self, legacy: &LegacyPublish) -> Result<Option<PublishConfig>, ConfigError> {
        if legacy.is_empty() {
            return Ok(None);
        }
        let mut publish = PublishConfig {
            group_id: non_empty(&legacy.group_id),
            info: None,
        };
        if !legacy.almanac.is_empty() {
            let bytes = self.encode(&LegacyAlmanac {
                legacy_config: true,
                ..legacy.almanac.clone()
            })?;
            let config = self.delegate(PluginCategory::Publisher, ALMANAC_PUBLISHER_TYPE, &bytes)?;
            let mut info = BTreeMap::new();
            info.insert(
                PublisherTypeId::from(ALMANAC_PUBLISHER_TYPE),
                PublisherConfig {
                    group_id: None,
                    config,
                },
            );
            publish.info = Some(info);
        }
        Ok(Some(publish))
    }

    fn docker_image(
        &mut self,
        index: usize,
        image: &LegacyDockerImage,
    ) -> Result<DockerBuilderConfig, ConfigError> {
        let mut builder = DockerBuilderConfig {
            tag_templates: tag_template(image).map(|tag| TagTemplates::List(vec![tag])),
            context_dir: non_empty(&image.context_dir),
            ..DockerBuilderConfig::default()
        };

        let mut input_dists: Vec<ProductDistId> = Vec::new();
        for dependency in &image.dependencies {
            let dist = match dependency.type_.as_str() {
                "docker" => None,
                "bin" | "binary" => Some("bin"),
                "sls" => Some("sls"),
                other => {
                    return Err(ConfigError::unsupported(
                        self.id,
                        format!("docker[{}].dependencies", index),
                        format!("docker dependency type \"{}\" is not supported", other),
                    ))
                }
            };
            if let Some(dist) = dist {
                let input = ProductDistId::new(
                    &ProductId::from(dependency.product.as_str()),
                    &DistId::from(dist),
                );
                if !input_dists.contains(&input) {
                    input_dists.push(input);
                }
            }
            self.depend_on(&dependency.product);
        }
        if !input_dists.is_empty() {
            builder.input_dists = Some(input_dists);
        }

        if !image.build_args_script.is_empty() {
            let mut script = ScriptBuilder::new();
            script.push(translate_env_vars(&image.build_args_script));
            builder.script = script.render();
        }

        match &image.info {
            LegacyDockerImageInfo::None => {
                builder.type_ = Some(DEFAULT_DOCKER_BUILDER_TYPE.to_string());
            }
            LegacyDockerImageInfo::Sls(info) => {
                let bytes = self.encode(&SlsDockerImageInfo {
                    legacy_config: true,
                    ..info.clone()
                })?;
                builder.config = self.delegate(PluginCategory::DockerBuilder, "sls", &bytes)?;
                builder.type_ = Some("sls".to_string());
            }
            LegacyDockerImageInfo::Unknown { type_name, data } => {
                let bytes = self.encode(&mark_legacy(data.clone()))?;
                builder.config = self.delegate(PluginCategory::DockerBuilder, type_name, &bytes)?;
                builder.type_ = Some(type_name.clone());
            }
        }
        Ok(builder)
    }

    fn depend_on(&mut self, product: &str) {
        if product != self.id.as_str() {
            self.dependencies.insert(ProductId::from(product));
        }
    }

    fn encode<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, ConfigError> {
        serde_yaml::to_string(payload)
            .map(String::into_bytes)
            .map_err(|source| ConfigError::Serialization {
                context: format!("legacy plugin configuration for product \"{}\"", self.id),
                source,
            })
    }

    fn delegate(
        &self,
        category: PluginCategory,
        type_name: &str,
        legacy: &[u8],
    ) -> Result<Option<PluginConfig>, ConfigError> {
        debug!(product = %self.id, %category, type_name, "delegating legacy plugin configuration");
        let wrap = |source: anyhow::Error| ConfigError::delegation(category, type_name, self.id, source);
        let upgrader = self
            .registries
            .config_upgrader(category, type_name)
            .map_err(|err| wrap(err.into()))?;
        let upgraded = upgrader.upgrade_config(legacy).map_err(wrap)?;
        PluginConfig::from_yaml_bytes(&upgraded).map_err(|err| {
            wrap(anyhow::Error::new(err).context("upgraded configuration is not valid YAML"))
        })
    }
}

fn default_os_arch_bin_dist(build: &LegacyBuild) -> LegacyDist {
    LegacyDist {
        dist_type: LegacyDistInfo::OsArchBin(OsArchBinDist {
            legacy_config: true,
            os_archs: build.os_archs.clone(),
        }),
        ..LegacyDist::default()
    }
}

fn tag_template(image: &LegacyDockerImage) -> Option<String> {
    match (image.repository.as_str(), image.tag.as_str()) {
        ("", "") => None,
        ("", tag) => Some(tag.to_string()),
        (repository, "") => Some(format!("{{{{Repository}}}}{}", repository)),
        (repository, tag) => Some(format!("{{{{Repository}}}}{}:{}", repository, tag)),
    }
}

/// Adds `legacy-config: true` to a mapping payload; other payloads pass through.
fn mark_legacy(data: Option<Value>) -> Value {
    match data.unwrap_or_else(|| Value::Mapping(Mapping::new())) {
        Value::Mapping(mut mapping) => {
            mapping.insert(Value::from("legacy-config"), Value::Bool(true));
            Value::Mapping(mapping)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::legacy::{BinDist, LegacyDockerDep};
    use crate::registry::identity_upgrader;

    fn registries() -> Registries {
        let mut registries = Registries::new();
        for name in ["os-arch-bin", "manual", "sls", "rpm"] {
            registries
                .disters
                .register(
                    name,
                    |_: &[u8]| -> anyhow::Result<Box<dyn crate::plugin::Dister>> {
                        anyhow::bail!("not constructed in engine tests")
                    },
                    identity_upgrader,
                )
                .expect("register dister");
        }
        registries
    }

    fn project(products: Vec<(&str, LegacyProduct)>) -> LegacyProject {
        LegacyProject {
            legacy_config: true,
            products: products
                .into_iter()
                .map(|(id, product)| (id.to_string(), product))
                .collect(),
            ..LegacyProject::default()
        }
    }

    fn migrated(legacy: &LegacyProject) -> ProjectConfig {
        match upgrade_legacy_project(legacy, &registries()).expect("upgrade") {
            Migration::Migrated(config) => config,
            Migration::Unchanged => panic!("expected a migrated config"),
        }
    }

    fn bin_dist(omit_init_sh: Option<bool>) -> LegacyProduct {
        LegacyProduct {
            dist: Some(
                vec![LegacyDist {
                    dist_type: LegacyDistInfo::Bin(BinDist {
                        omit_init_sh,
                        ..BinDist::default()
                    }),
                    ..LegacyDist::default()
                }]
                .into(),
            ),
            ..LegacyProduct::default()
        }
    }

    fn dister_script(config: &ProjectConfig, product: &str) -> Option<String> {
        let dist = config.products[&ProductId::from(product)].dist.clone()?;
        let disters = dist.disters?;
        let (_, dister) = disters.iter().next()?;
        dister.script.clone()
    }

    #[test]
    fn empty_legacy_project_is_unchanged() {
        let migration = upgrade_legacy_project(&project(Vec::new()), &registries()).expect("upgrade");
        assert_eq!(migration, Migration::Unchanged);
    }

    #[test]
    fn launcher_fragment_only_when_omit_init_sh_is_false() {
        let legacy = project(vec![
            ("absent", bin_dist(None)),
            ("omitted", bin_dist(Some(true))),
            ("kept", bin_dist(Some(false))),
        ]);
        let config = migrated(&legacy);
        assert_eq!(dister_script(&config, "absent"), None);
        assert_eq!(dister_script(&config, "omitted"), None);
        let script = dister_script(&config, "kept").expect("script");
        assert!(script.starts_with("#!/bin/bash\n### START: auto-generated back-compat code for \"omit-init-sh: false\""));
    }

    #[test]
    fn custom_init_template_is_unsupported() {
        let mut product = bin_dist(Some(false));
        if let Some(dists) = product.dist.take() {
            let mut dists = dists.into_vec();
            dists[0].dist_type = LegacyDistInfo::Bin(BinDist {
                omit_init_sh: Some(false),
                init_sh_template_file: "init.sh.tpl".to_string(),
                ..BinDist::default()
            });
            product.dist = Some(dists.into());
        }
        let error = upgrade_legacy_project(&project(vec![("foo", product)]), &registries())
            .expect_err("unsupported");
        assert!(matches!(error, ConfigError::UnsupportedFeature { ref product, .. } if product == "foo"));
    }

    #[test]
    fn docker_dependencies_are_deduplicated_without_self() {
        let dependency = |product: &str, kind: &str| LegacyDockerDep {
            product: product.to_string(),
            type_: kind.to_string(),
            target_file: String::new(),
        };
        let product = LegacyProduct {
            docker: vec![LegacyDockerImage {
                dependencies: vec![
                    dependency("b", "docker"),
                    dependency("b", "binary"),
                    dependency("a", "docker"),
                    dependency("c", "docker"),
                ],
                ..LegacyDockerImage::default()
            }],
            ..LegacyProduct::default()
        };
        let config = migrated(&project(vec![("c", product)]));
        let product = &config.products[&ProductId::from("c")];
        let dependencies: Vec<&str> = product
            .dependencies
            .as_ref()
            .expect("dependencies")
            .iter()
            .map(ProductId::as_str)
            .collect();
        assert_eq!(dependencies, vec!["b", "a"]);
        let builders = product
            .docker
            .as_ref()
            .and_then(|docker| docker.docker_builders.as_ref())
            .expect("builders");
        let builder = &builders[&DockerId::from("docker-image-0")];
        assert_eq!(builder.input_dists, Some(vec![ProductDistId::from("b.bin")]));
        assert_eq!(builder.type_name(), DEFAULT_DOCKER_BUILDER_TYPE);
    }

    #[test]
    fn repository_becomes_part_of_tag_template() {
        let image = LegacyDockerImage {
            repository: "registry.example.com/foo".to_string(),
            tag: "snapshot".to_string(),
            ..LegacyDockerImage::default()
        };
        assert_eq!(
            tag_template(&image).as_deref(),
            Some("{{Repository}}registry.example.com/foo:snapshot")
        );
        let tag_only = LegacyDockerImage {
            tag: "foo:latest".to_string(),
            ..LegacyDockerImage::default()
        };
        assert_eq!(tag_template(&tag_only).as_deref(), Some("foo:latest"));
    }

    #[test]
    fn mark_legacy_only_touches_mappings() {
        let marked = mark_legacy(None);
        assert_eq!(marked["legacy-config"], Value::Bool(true));
        assert_eq!(mark_legacy(Some(Value::from("raw"))), Value::from("raw"));
    }
}
