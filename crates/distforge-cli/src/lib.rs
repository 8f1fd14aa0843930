pub mod commands;

use distforge_core::Registries;

/// Registries holding every built-in dister, docker builder and publisher.
pub fn default_registries() -> anyhow::Result<Registries> {
    let mut registries = Registries::new();
    distforge_pack::register_disters(&mut registries.disters)?;
    distforge_docker::register_docker_builders(&mut registries.docker_builders)?;
    distforge_publish::register_publishers(&mut registries.publishers)?;
    Ok(registries)
}
