use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use distforge_core::config::{locate_config, read_config_bytes, ConfigSource, CONFIG_FILE_NAME};
use distforge_core::{upgrade_config, upgrade_legacy_config, Registries, UpgradeOutcome};
use tracing::{debug, info};

pub struct UpgradeConfigArgs {
    pub config_dir: PathBuf,
    pub dry_run: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeConfigResult {
    /// No config file exists in the config directory.
    Missing,
    Unchanged,
    /// The upgraded text; written to `path` unless this was a dry run.
    Upgraded { path: PathBuf, text: String },
}

pub fn run(args: UpgradeConfigArgs, registries: &Registries) -> anyhow::Result<UpgradeConfigResult> {
    let Some(source) = locate_config(&args.config_dir) else {
        debug!(dir = %args.config_dir.display(), "no configuration file found");
        return Ok(UpgradeConfigResult::Missing);
    };
    let bytes = read_config_bytes(source.path())?;
    // dist.yml is always the legacy schema, with or without a `legacy-config` marker.
    let outcome = match &source {
        ConfigSource::Legacy(_) => upgrade_legacy_config(&bytes, registries),
        ConfigSource::Current(_) => upgrade_config(&bytes, registries),
    }
    .with_context(|| format!("failed to upgrade '{}'", source.path().display()))?;
    let text = match outcome {
        UpgradeOutcome::Unchanged => return Ok(UpgradeConfigResult::Unchanged),
        UpgradeOutcome::Upgraded(text) => text,
    };
    let path = args.config_dir.join(CONFIG_FILE_NAME);
    if args.dry_run {
        info!(path = %path.display(), "dry run: upgraded configuration not written");
    } else {
        fs::write(&path, &text)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
    }
    Ok(UpgradeConfigResult::Upgraded { path, text })
}
