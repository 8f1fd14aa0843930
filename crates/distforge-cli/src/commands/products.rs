use std::path::PathBuf;

use distforge_core::config::load_project_config;
use distforge_core::ProductId;

pub struct ProductsArgs {
    pub config_dir: PathBuf,
}

/// Product ids of the current configuration in sorted order.
pub fn run(args: ProductsArgs) -> anyhow::Result<Vec<ProductId>> {
    let config = load_project_config(&args.config_dir)?;
    Ok(config.product_ids().cloned().collect())
}
