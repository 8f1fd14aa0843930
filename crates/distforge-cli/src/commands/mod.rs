pub mod pom;
pub mod products;
pub mod upgrade_config;
pub mod verify;
