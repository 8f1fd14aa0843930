pub mod decode;
pub mod exclude;
pub mod file;
pub mod legacy;
pub mod schema;
pub mod serialize;
pub mod validate;

pub use exclude::{ExcludeConfig, Matcher};
pub use file::{
    load_project_config, locate_config, read_config_bytes, ConfigSource, CONFIG_FILE_NAME,
    LEGACY_CONFIG_FILE_NAME,
};
pub use schema::{
    BuildConfig, DistConfig, DisterConfig, DistersConfig, DockerBuilderConfig, DockerConfig,
    PluginConfig, ProductConfig, ProjectConfig, PublishConfig, PublisherConfig, RunConfig,
    TagTemplates, DEFAULT_DISTER_TYPE, DEFAULT_DOCKER_BUILDER_TYPE, SCHEMA_VERSION,
};
pub use serialize::{deserialize_config, serialize_config};
pub use validate::{validate, ValidationError};
