use std::fmt;
use std::path::PathBuf;

use crate::product::ProductId;

/// The plugin category that owns a type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Dister,
    DockerBuilder,
    Publisher,
}

impl PluginCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginCategory::Dister => "dister",
            PluginCategory::DockerBuilder => "docker builder",
            PluginCategory::Publisher => "publisher",
        }
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structurally invalid configuration input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    /// Dotted path of the node that failed, e.g. `products.foo.dist`.
    pub context: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl DecodeError {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn from_yaml(context: impl Into<String>, error: &serde_yaml::Error) -> Self {
        let location = error.location();
        Self {
            context: context.into(),
            line: location.as_ref().map(|value| value.line()),
            column: location.as_ref().map(|value| value.column()),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode {}", self.context)?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " at line {} column {}", line, column)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("product \"{product}\" sets \"{field}\": {message}")]
    UnsupportedFeature {
        product: ProductId,
        field: String,
        message: String,
    },
    #[error("failed to upgrade {category} \"{type_name}\" configuration for product \"{product}\"")]
    Delegation {
        category: PluginCategory,
        type_name: String,
        product: ProductId,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to serialize {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn unsupported(
        product: &ProductId,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::UnsupportedFeature {
            product: product.clone(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn delegation(
        category: PluginCategory,
        type_name: &str,
        product: &ProductId,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        ConfigError::Delegation {
            category,
            type_name: type_name.to_string(),
            product: product.clone(),
            source: source.into(),
        }
    }

    /// Product named by an engine-level failure, if any.
    pub fn product(&self) -> Option<&ProductId> {
        match self {
            ConfigError::UnsupportedFeature { product, .. }
            | ConfigError::Delegation { product, .. } => Some(product),
            _ => None,
        }
    }
}
