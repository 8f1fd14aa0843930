use std::path::PathBuf;

use anyhow::Context;
use distforge_core::config::schema::plugin_bytes;
use distforge_core::config::{load_project_config, locate_config, validate, ConfigSource, ProductConfig};
use distforge_core::{ProductId, Registries};
use tracing::debug;

pub struct VerifyArgs {
    pub config_dir: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub products: usize,
    /// Plugin configurations that were successfully constructed.
    pub plugins: usize,
}

/// Decodes and validates the current configuration, then constructs every
/// configured plugin so plugin-owned config is checked too.
pub fn run(args: VerifyArgs, registries: &Registries) -> anyhow::Result<VerifyReport> {
    if let Some(ConfigSource::Legacy(path)) = locate_config(&args.config_dir) {
        anyhow::bail!(
            "'{}' uses the legacy configuration schema; run upgrade-config first",
            path.display()
        );
    }
    let config = load_project_config(&args.config_dir)?;
    validate(&config)?;

    let mut report = VerifyReport::default();
    for id in config.product_ids() {
        let Some(product) = config.product(id) else {
            continue;
        };
        report.products += 1;
        report.plugins += check_plugins(id, &product, registries)
            .with_context(|| format!("invalid plugin configuration for product \"{}\"", id))?;
    }
    Ok(report)
}

fn check_plugins(id: &ProductId, product: &ProductConfig, registries: &Registries) -> anyhow::Result<usize> {
    let mut checked = 0;
    if let Some(disters) = product.dist.as_ref().and_then(|dist| dist.disters.as_ref()) {
        for (dist_id, dister) in disters.iter() {
            let config = plugin_bytes(dister.config.as_ref())?;
            registries.disters.new_plugin(dister.type_name(), &config)?;
            debug!(product = %id, dist = %dist_id, "dister configuration ok");
            checked += 1;
        }
    }
    if let Some(builders) = product.docker.as_ref().and_then(|docker| docker.docker_builders.as_ref()) {
        for (docker_id, builder) in builders {
            let config = plugin_bytes(builder.config.as_ref())?;
            registries.docker_builders.new_plugin(builder.type_name(), &config)?;
            debug!(product = %id, docker = %docker_id, "docker builder configuration ok");
            checked += 1;
        }
    }
    if let Some(publishers) = product.publish.as_ref().and_then(|publish| publish.info.as_ref()) {
        for (type_id, publisher) in publishers {
            let config = plugin_bytes(publisher.config.as_ref())?;
            registries.publishers.new_plugin(type_id.as_str(), &config)?;
            debug!(product = %id, publisher = %type_id, "publisher configuration ok");
            checked += 1;
        }
    }
    Ok(checked)
}
