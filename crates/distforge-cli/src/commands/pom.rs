use distforge_core::ProductId;
use distforge_publish::render_pom;

pub struct PomArgs {
    pub product: String,
    pub version: String,
    pub group_id: String,
    pub packaging: Option<String>,
}

pub fn run(args: PomArgs) -> anyhow::Result<String> {
    if args.product.trim().is_empty() {
        anyhow::bail!("product is required");
    }
    if args.group_id.trim().is_empty() {
        anyhow::bail!("group-id is required");
    }
    Ok(render_pom(
        &ProductId::from(args.product),
        &args.version,
        &args.group_id,
        args.packaging.as_deref().unwrap_or_default(),
    ))
}
