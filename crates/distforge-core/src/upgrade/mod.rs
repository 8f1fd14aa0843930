//! Configuration upgrades from any supported schema to the current one.

pub mod engine;
pub mod script;

use serde_yaml::Value;

use crate::config::decode::decode_strict;
use crate::config::legacy::LegacyProject;
use crate::config::schema::{ProjectConfig, SCHEMA_VERSION};
use crate::config::serialize::serialize_config;
use crate::error::{ConfigError, DecodeError};
use crate::registry::Registries;

pub use engine::{upgrade_legacy_project, Migration, ALMANAC_PUBLISHER_TYPE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The input is already current (or empty); leave the file as it is.
    Unchanged,
    /// Serialized current-schema configuration to write in place of the input.
    Upgraded(String),
}

/// Upgrades configuration bytes of any supported version.
///
/// A document with `legacy-config: true` is migrated. A current document
/// (no `version`, or version `0`) is decoded strictly and reported unchanged.
pub fn upgrade_config(bytes: &[u8], registries: &Registries) -> Result<UpgradeOutcome, ConfigError> {
    if is_blank(bytes) {
        return Ok(UpgradeOutcome::Unchanged);
    }
    let document: Value = decode_strict("configuration", bytes)?;
    let mapping = match &document {
        Value::Null => return Ok(UpgradeOutcome::Unchanged),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(DecodeError::new("configuration", "the top level must be a mapping").into())
        }
    };
    if mapping.get("legacy-config") == Some(&Value::Bool(true)) {
        return upgrade_legacy_config(bytes, registries);
    }
    match mapping.get("version") {
        None => {}
        Some(Value::String(version)) if version == SCHEMA_VERSION => {}
        Some(Value::Number(version)) if version.to_string() == SCHEMA_VERSION => {}
        Some(other) => {
            return Err(DecodeError::new(
                "version",
                format!("unsupported configuration version {}", render(other)),
            )
            .into())
        }
    }
    decode_strict::<ProjectConfig>("configuration", bytes)?;
    Ok(UpgradeOutcome::Unchanged)
}

/// Migrates bytes known to hold a legacy configuration, such as the contents
/// of `dist.yml`. The `legacy-config` marker is optional here.
pub fn upgrade_legacy_config(
    bytes: &[u8],
    registries: &Registries,
) -> Result<UpgradeOutcome, ConfigError> {
    if is_blank(bytes) {
        return Ok(UpgradeOutcome::Unchanged);
    }
    let legacy: LegacyProject = decode_strict("legacy configuration", bytes)?;
    match upgrade_legacy_project(&legacy, registries)? {
        Migration::Unchanged => Ok(UpgradeOutcome::Unchanged),
        Migration::Migrated(config) => serialize_config(&config).map(UpgradeOutcome::Upgraded),
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|text| text.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_unchanged() {
        let registries = Registries::new();
        assert_eq!(
            upgrade_config(b"  \n", &registries).expect("upgrade"),
            UpgradeOutcome::Unchanged
        );
    }

    #[test]
    fn current_config_is_unchanged() {
        let registries = Registries::new();
        let input = b"version: 0\nproducts:\n  foo:\n    build:\n      main-pkg: ./cmd/foo\n";
        assert_eq!(
            upgrade_config(input, &registries).expect("upgrade"),
            UpgradeOutcome::Unchanged
        );
    }

    #[test]
    fn current_config_is_still_decoded_strictly() {
        let registries = Registries::new();
        let error = upgrade_config(b"products:\n  foo:\n    bogus: true\n", &registries)
            .expect_err("unknown key");
        assert!(matches!(error, ConfigError::Decode(_)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let registries = Registries::new();
        let error = upgrade_config(b"version: 7\n", &registries).expect_err("version");
        assert!(error.to_string().contains("unsupported configuration version 7"));
    }

    #[test]
    fn legacy_input_without_marker_is_migrated() {
        let registries = Registries::new();
        let input = b"products:\n  foo:\n    build:\n      main-pkg: ./foo\n";
        let text = match upgrade_legacy_config(input, &registries).expect("upgrade") {
            UpgradeOutcome::Upgraded(text) => text,
            other => panic!("expected an upgrade, got {:?}", other),
        };
        assert!(text.contains("main-pkg: ./foo"), "{}", text);
        assert_eq!(
            upgrade_legacy_config(b"\n", &registries).expect("blank"),
            UpgradeOutcome::Unchanged
        );
    }

    #[test]
    fn legacy_marker_routes_to_migration() {
        let registries = Registries::new();
        let outcome = upgrade_config(
            b"legacy-config: true\nproducts:\n  foo:\n    build:\n      main-pkg: ./foo\n",
            &registries,
        )
        .expect("upgrade");
        match outcome {
            UpgradeOutcome::Upgraded(text) => assert!(text.contains("main-pkg: ./foo")),
            UpgradeOutcome::Unchanged => panic!("expected an upgrade"),
        }
    }
}
