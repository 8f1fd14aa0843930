use distforge_core::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("tag template \"{template}\" has an unterminated \"{{{{\"")]
    Unterminated { template: String },
    #[error("tag template \"{template}\" uses unknown field \"{field}\" (known fields: Product, Version, Repository)")]
    UnknownField { template: String, field: String },
    #[error("tag template \"{template}\" renders to an empty tag")]
    Empty { template: String },
}

/// Values substituted into tag templates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagContext<'a> {
    pub product: &'a ProductId,
    pub version: &'a str,
    pub repository: Option<&'a str>,
}

impl TagContext<'_> {
    /// `{{Repository}}` is the repository followed by `/`, or nothing when unset.
    fn repository_prefix(&self) -> String {
        match self.repository.map(str::trim) {
            Some(repository) if !repository.is_empty() => {
                if repository.ends_with('/') {
                    repository.to_string()
                } else {
                    format!("{}/", repository)
                }
            }
            _ => String::new(),
        }
    }

    fn field(&self, name: &str) -> Option<String> {
        match name {
            "Product" => Some(self.product.to_string()),
            "Version" => Some(self.version.to_string()),
            "Repository" => Some(self.repository_prefix()),
            _ => None,
        }
    }
}

/// Renders `{{Field}}` placeholders. Whitespace and a leading `.` inside the braces are ignored.
pub fn render_tag(template: &str, context: &TagContext<'_>) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| TemplateError::Unterminated {
            template: template.to_string(),
        })?;
        let name = after[..end].trim();
        let name = name.strip_prefix('.').unwrap_or(name);
        let value = context.field(name).ok_or_else(|| TemplateError::UnknownField {
            template: template.to_string(),
            field: name.to_string(),
        })?;
        rendered.push_str(&value);
        rest = &after[end + 2..];
    }
    rendered.push_str(rest);
    if rendered.trim().is_empty() {
        return Err(TemplateError::Empty {
            template: template.to_string(),
        });
    }
    Ok(rendered)
}
