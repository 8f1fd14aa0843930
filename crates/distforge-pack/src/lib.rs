pub mod archive;
pub mod bin;
pub mod manual;
pub mod os_arch_bin;

use std::path::PathBuf;

use distforge_core::{Dister, OsArch, Registry, RegistryError};
use serde::{Deserialize, Serialize};

pub use bin::BinDister;
pub use manual::ManualDister;
pub use os_arch_bin::OsArchBinDister;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("io error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk {}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("'{}' is not inside '{}'", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("missing file '{}'", .path.display())]
    MissingFile { path: PathBuf },
}

/// Registers the built-in disters with their config upgraders.
pub fn register_disters(registry: &mut Registry<dyn Dister>) -> Result<(), RegistryError> {
    registry.register(
        os_arch_bin::TYPE_NAME,
        |config: &[u8]| -> anyhow::Result<Box<dyn Dister>> {
            Ok(Box::new(OsArchBinDister::from_config(config)?))
        },
        os_arch_bin::upgrade_config,
    )?;
    registry.register(
        bin::TYPE_NAME,
        |config: &[u8]| -> anyhow::Result<Box<dyn Dister>> {
            Ok(Box::new(BinDister::from_config(config)?))
        },
        bin::upgrade_config,
    )?;
    registry.register(
        manual::TYPE_NAME,
        |config: &[u8]| -> anyhow::Result<Box<dyn Dister>> {
            Ok(Box::new(ManualDister::from_config(config)?))
        },
        manual::upgrade_config,
    )?;
    Ok(())
}

/// Run output shared by the built-in disters: where the work directory is and what was staged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RunOutput {
    pub work_dir: PathBuf,
    pub staged: Vec<String>,
}

impl RunOutput {
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The OS/arch this process runs on, in Go-style naming (`darwin`, `amd64`).
pub fn current_os_arch() -> OsArch {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    OsArch::new(os, arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_builtin_disters() {
        let mut registry = Registry::new(distforge_core::PluginCategory::Dister);
        register_disters(&mut registry).expect("register");
        assert_eq!(registry.types(), vec!["bin", "manual", "os-arch-bin"]);
    }
}
