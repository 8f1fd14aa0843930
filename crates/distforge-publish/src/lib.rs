pub mod almanac;
pub mod local;
pub mod maven;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use distforge_core::{Publisher, Registry, RegistryError};
use sha2::{Digest, Sha256};

pub use almanac::AlmanacPublisher;
pub use local::LocalPublisher;
pub use maven::render_pom;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid {publisher} publisher configuration: {message}")]
    InvalidConfig {
        publisher: &'static str,
        message: String,
    },
    #[error("io error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> PublishError + '_ {
        move |source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Registers the built-in publishers with their config upgraders.
pub fn register_publishers(registry: &mut Registry<dyn Publisher>) -> Result<(), RegistryError> {
    registry.register(
        local::TYPE_NAME,
        |config: &[u8]| -> anyhow::Result<Box<dyn Publisher>> {
            Ok(Box::new(LocalPublisher::from_config(config)?))
        },
        local::upgrade_config,
    )?;
    registry.register(
        almanac::TYPE_NAME,
        |config: &[u8]| -> anyhow::Result<Box<dyn Publisher>> {
            Ok(Box::new(AlmanacPublisher::from_config(config)?))
        },
        almanac::upgrade_config,
    )?;
    Ok(())
}

/// Lowercase hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String, PublishError> {
    let mut file = fs::File::open(path).map_err(PublishError::io(path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer).map_err(PublishError::io(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use distforge_core::PluginCategory;

    #[test]
    fn registers_all_builtin_publishers() {
        let mut registry = Registry::new(PluginCategory::Publisher);
        register_publishers(&mut registry).expect("register");
        assert_eq!(registry.types(), vec!["almanac", "local"]);
    }

    #[test]
    fn sha256_of_known_content() {
        let path = std::env::temp_dir().join(format!("distforge-publish-sha-{}", std::process::id()));
        fs::write(&path, "abc").expect("write");
        let digest = sha256_file(&path).expect("digest");
        fs::remove_file(&path).expect("cleanup");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
