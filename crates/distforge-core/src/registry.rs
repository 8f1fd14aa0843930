use std::collections::BTreeMap;

use crate::error::PluginCategory;
use crate::plugin::{ConfigUpgrader, Dister, DockerBuilder, Publisher};

/// Builds a plugin from its raw `config` bytes (empty when the entry has none).
pub type Constructor<P> = Box<dyn Fn(&[u8]) -> anyhow::Result<Box<P>> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{category} type \"{type_name}\" is not registered (registered types: [{}])", .available.join(", "))]
    NotFound {
        category: PluginCategory,
        type_name: String,
        available: Vec<String>,
    },
    #[error("{category} type \"{type_name}\" is already registered")]
    Duplicate {
        category: PluginCategory,
        type_name: String,
    },
    #[error("failed to create {category} of type \"{type_name}\"")]
    Construct {
        category: PluginCategory,
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
}

struct Entry<P: ?Sized> {
    constructor: Constructor<P>,
    upgrader: Box<dyn ConfigUpgrader>,
}

/// Type name to plugin factory and config upgrader, for one plugin category.
///
/// Registries are plain values: build one at startup, then share it by
/// reference for as long as configs are decoded or upgraded.
pub struct Registry<P: ?Sized> {
    category: PluginCategory,
    entries: BTreeMap<String, Entry<P>>,
}

impl<P: ?Sized> Registry<P> {
    pub fn new(category: PluginCategory) -> Self {
        Self {
            category,
            entries: BTreeMap::new(),
        }
    }

    pub fn category(&self) -> PluginCategory {
        self.category
    }

    pub fn register<C, U>(
        &mut self,
        type_name: impl Into<String>,
        constructor: C,
        upgrader: U,
    ) -> Result<(), RegistryError>
    where
        C: Fn(&[u8]) -> anyhow::Result<Box<P>> + Send + Sync + 'static,
        U: ConfigUpgrader + 'static,
    {
        let type_name = type_name.into();
        if self.entries.contains_key(&type_name) {
            return Err(RegistryError::Duplicate {
                category: self.category,
                type_name,
            });
        }
        self.entries.insert(
            type_name,
            Entry {
                constructor: Box::new(constructor),
                upgrader: Box::new(upgrader),
            },
        );
        Ok(())
    }

    /// Registered type names in sorted order.
    pub fn types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn new_plugin(&self, type_name: &str, config: &[u8]) -> Result<Box<P>, RegistryError> {
        let entry = self.entry(type_name)?;
        (entry.constructor)(config).map_err(|source| RegistryError::Construct {
            category: self.category,
            type_name: type_name.to_string(),
            source,
        })
    }

    pub fn config_upgrader(&self, type_name: &str) -> Result<&dyn ConfigUpgrader, RegistryError> {
        self.entry(type_name).map(|entry| entry.upgrader.as_ref())
    }

    fn entry(&self, type_name: &str) -> Result<&Entry<P>, RegistryError> {
        self.entries
            .get(type_name)
            .ok_or_else(|| RegistryError::NotFound {
                category: self.category,
                type_name: type_name.to_string(),
                available: self.types(),
            })
    }
}

/// The three plugin registries the engine consults.
pub struct Registries {
    pub disters: Registry<dyn Dister>,
    pub docker_builders: Registry<dyn DockerBuilder>,
    pub publishers: Registry<dyn Publisher>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            disters: Registry::new(PluginCategory::Dister),
            docker_builders: Registry::new(PluginCategory::DockerBuilder),
            publishers: Registry::new(PluginCategory::Publisher),
        }
    }

    pub fn config_upgrader(
        &self,
        category: PluginCategory,
        type_name: &str,
    ) -> Result<&dyn ConfigUpgrader, RegistryError> {
        match category {
            PluginCategory::Dister => self.disters.config_upgrader(type_name),
            PluginCategory::DockerBuilder => self.docker_builders.config_upgrader(type_name),
            PluginCategory::Publisher => self.publishers.config_upgrader(type_name),
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

/// Upgrader for types whose configuration has not changed shape.
pub fn identity_upgrader(config: &[u8]) -> anyhow::Result<Vec<u8>> {
    Ok(config.to_vec())
}
