//! The `default` docker builder: plain `docker build` of a context directory.

use distforge_core::plugin::{decode_plugin_config, upgrade_unchanged_shape};
use distforge_core::{DockerBuildRequest, DockerBuilder, DockerId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::template::{render_tag, TagContext};

pub const TYPE_NAME: &str = distforge_core::config::DEFAULT_DOCKER_BUILDER_TYPE;

pub const DOCKERFILE: &str = "Dockerfile";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DefaultBuilderConfig {
    /// Extra arguments passed to `docker build` before the tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_args: Vec<String>,
}

pub fn upgrade_config(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    upgrade_unchanged_shape::<DefaultBuilderConfig>(config)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefaultDockerBuilder {
    config: DefaultBuilderConfig,
}

impl DefaultDockerBuilder {
    pub fn new(config: DefaultBuilderConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::new(decode_plugin_config(config)?))
    }

    /// Tags for `request`, rendered in template order with repeats dropped.
    pub fn tags(&self, request: &DockerBuildRequest) -> anyhow::Result<Vec<String>> {
        let context = TagContext {
            product: &request.product,
            version: &request.version,
            repository: request.repository.as_deref(),
        };
        let mut tags: Vec<String> = Vec::new();
        for template in &request.tag_templates {
            let tag = render_tag(template, &context)?;
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }
}

impl DockerBuilder for DefaultDockerBuilder {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn build_args(&self, docker: &DockerId, request: &DockerBuildRequest) -> anyhow::Result<Vec<String>> {
        let tags = self.tags(request)?;
        if tags.is_empty() {
            anyhow::bail!(
                "docker builder \"{}\" of product \"{}\" has no tag templates",
                docker,
                request.product
            );
        }
        let context_dir = request.context_dir.to_string_lossy().into_owned();
        let dockerfile = request.context_dir.join(DOCKERFILE).to_string_lossy().into_owned();

        let mut args = vec!["build".to_string(), "--file".to_string(), dockerfile];
        args.extend(self.config.build_args.iter().cloned());
        for tag in tags {
            args.push("-t".to_string());
            args.push(tag);
        }
        args.push(context_dir);
        debug!(product = %request.product, %docker, ?args, "planned docker build");
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use distforge_core::ProductId;

    use super::*;

    fn request(tag_templates: &[&str]) -> DockerBuildRequest {
        DockerBuildRequest {
            product: ProductId::from("web"),
            version: "1.2.3".to_string(),
            repository: Some("registry.example.com".to_string()),
            context_dir: PathBuf::from("docker"),
            tag_templates: tag_templates.iter().map(|tag| tag.to_string()).collect(),
            input_dists: Vec::new(),
        }
    }

    #[test]
    fn plans_docker_build_arguments() {
        let builder = DefaultDockerBuilder::from_config(b"build-args: [--pull, --no-cache]\n").expect("builder");
        let args = builder
            .build_args(
                &DockerId::from("docker-image-0"),
                &request(&["{{Repository}}web:{{Version}}", "{{Repository}}web:latest"]),
            )
            .expect("args");
        assert_eq!(
            args,
            vec![
                "build",
                "--file",
                "docker/Dockerfile",
                "--pull",
                "--no-cache",
                "-t",
                "registry.example.com/web:1.2.3",
                "-t",
                "registry.example.com/web:latest",
                "docker",
            ]
        );
    }

    #[test]
    fn duplicate_tags_are_collapsed() {
        let builder = DefaultDockerBuilder::default();
        let tags = builder
            .tags(&request(&["web:{{Version}}", "web:1.2.3"]))
            .expect("tags");
        assert_eq!(tags, vec!["web:1.2.3"]);
    }

    #[test]
    fn missing_tags_are_an_error() {
        let error = DefaultDockerBuilder::default()
            .build_args(&DockerId::from("image"), &request(&[]))
            .expect_err("no tags");
        assert!(error.to_string().contains("no tag templates"));
    }

    #[test]
    fn legacy_config_upgrades() {
        let upgraded = upgrade_config(b"legacy-config: true\nbuild-args: [--pull]\n").expect("upgrade");
        let config: DefaultBuilderConfig = serde_yaml::from_slice(&upgraded).expect("decode");
        assert_eq!(config.build_args, vec!["--pull"]);
        assert!(upgrade_config(b"tags: [x]\n").is_err());
    }
}
