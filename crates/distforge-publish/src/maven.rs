use std::path::PathBuf;

use distforge_core::ProductId;

const POM_HEADER: &str = r#"<project xmlns="http://maven.apache.org/POM/4.0.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>
"#;

/// Renders the POM for one product version. The `<packaging>` element is
/// omitted when `packaging` is empty.
pub fn render_pom(product: &ProductId, version: &str, group_id: &str, packaging: &str) -> String {
    let mut pom = String::from(POM_HEADER);
    pom.push('\n');
    pom.push_str(&format!("  <groupId>{}</groupId>\n", group_id));
    pom.push_str(&format!("  <artifactId>{}</artifactId>\n", product));
    pom.push_str(&format!("  <version>{}</version>\n", version));
    if !packaging.is_empty() {
        pom.push_str(&format!("  <packaging>{}</packaging>\n", packaging));
    }
    pom.push_str("</project>\n");
    pom
}

pub fn pom_file_name(product: &ProductId, version: &str) -> String {
    format!("{}-{}.pom", product, version)
}

/// `<group/as/dirs>/<product>/<version>`, relative to a repository root.
pub fn repository_path(group_id: &str, product: &ProductId, version: &str) -> PathBuf {
    let mut path: PathBuf = group_id.split('.').filter(|part| !part.is_empty()).collect();
    path.push(product.as_str());
    path.push(version);
    path
}
