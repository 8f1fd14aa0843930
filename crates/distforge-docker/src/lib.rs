pub mod default_builder;
pub mod template;

use distforge_core::{DockerBuilder, Registry, RegistryError};

pub use default_builder::{DefaultBuilderConfig, DefaultDockerBuilder};
pub use template::{render_tag, TagContext, TemplateError};

/// Registers the built-in docker builders with their config upgraders.
pub fn register_docker_builders(registry: &mut Registry<dyn DockerBuilder>) -> Result<(), RegistryError> {
    registry.register(
        default_builder::TYPE_NAME,
        |config: &[u8]| -> anyhow::Result<Box<dyn DockerBuilder>> {
            Ok(Box::new(DefaultDockerBuilder::from_config(config)?))
        },
        default_builder::upgrade_config,
    )
}

#[cfg(test)]
mod tests {
    use distforge_core::PluginCategory;

    use super::*;

    #[test]
    fn default_builder_is_registered() {
        let mut registry = Registry::new(PluginCategory::DockerBuilder);
        register_docker_builders(&mut registry).expect("register");
        assert_eq!(registry.types(), vec!["default"]);
        let builder = registry.new_plugin("default", b"").expect("construct");
        assert_eq!(builder.type_name(), "default");
    }
}
