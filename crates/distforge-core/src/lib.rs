//! Configuration model, plugin contracts and schema upgrades for distforge.
//!
//! Decoding and upgrading are pure functions over in-memory bytes. The only
//! I/O lives in [`config::file`].

pub mod config;
pub mod error;
pub mod plugin;
pub mod product;
pub mod registry;
pub mod upgrade;

pub use error::{ConfigError, DecodeError, PluginCategory};
pub use plugin::{
    ConfigUpgrader, DockerBuildRequest, DockerBuilder, Dister, ProductOutputInfo, PublishOutcome,
    PublishRequest, Publisher,
};
pub use product::{
    DependencyList, DistId, DockerId, OsArch, ProductDistId, ProductId, PublisherTypeId,
};
pub use registry::{identity_upgrader, Registries, Registry, RegistryError};
pub use upgrade::{upgrade_config, upgrade_legacy_config, UpgradeOutcome};
