use super::schema::{ProductConfig, ProjectConfig};
use crate::product::ProductId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyProductId,
    EmptyTypeName {
        product: String,
        section: String,
    },
    UnknownDependency {
        product: String,
        dependency: String,
    },
    SelfDependency {
        product: String,
    },
    UnknownInputDist {
        product: String,
        docker: String,
        input: String,
    },
    InvalidExclude {
        pattern: String,
        message: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyProductId => write!(f, "product ids must be non-empty"),
            ValidationError::EmptyTypeName { product, section } => write!(
                f,
                "product '{}' declares an empty type in '{}'",
                product, section
            ),
            ValidationError::UnknownDependency {
                product,
                dependency,
            } => write!(
                f,
                "product '{}' depends on unknown product '{}'",
                product, dependency
            ),
            ValidationError::SelfDependency { product } => {
                write!(f, "product '{}' must not depend on itself", product)
            }
            ValidationError::UnknownInputDist {
                product,
                docker,
                input,
            } => write!(
                f,
                "docker builder '{}' of product '{}' uses input dist '{}' of an unknown product",
                docker, product, input
            ),
            ValidationError::InvalidExclude { pattern, message } => {
                write!(f, "exclude pattern '{}' is invalid: {}", pattern, message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Semantic checks that strict decoding cannot express.
pub fn validate(config: &ProjectConfig) -> Result<(), ValidationError> {
    if let Err(error) = config.exclude.matcher() {
        return Err(ValidationError::InvalidExclude {
            pattern: config.exclude.names.join(", "),
            message: error.to_string(),
        });
    }

    validate_types("product-defaults", &config.product_defaults)?;
    for (id, product) in &config.products {
        if id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyProductId);
        }
        validate_types(id.as_str(), product)?;

        if let Some(dependencies) = &product.dependencies {
            for dependency in dependencies {
                if dependency == id {
                    return Err(ValidationError::SelfDependency {
                        product: id.to_string(),
                    });
                }
                if !config.products.contains_key(dependency) {
                    return Err(ValidationError::UnknownDependency {
                        product: id.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }

        let builders = product
            .docker
            .as_ref()
            .and_then(|docker| docker.docker_builders.as_ref());
        for (docker, builder) in builders.into_iter().flatten() {
            for input in builder.input_dists.iter().flatten() {
                let (input_product, _) = input.parts();
                if !config.products.contains_key(&input_product) {
                    return Err(ValidationError::UnknownInputDist {
                        product: id.to_string(),
                        docker: docker.to_string(),
                        input: input.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_types(owner: &str, product: &ProductConfig) -> Result<(), ValidationError> {
    let empty = |section: String| ValidationError::EmptyTypeName {
        product: owner.to_string(),
        section,
    };
    if let Some(disters) = product.dist.as_ref().and_then(|dist| dist.disters.as_ref()) {
        for (id, dister) in disters.iter() {
            if is_blank(dister.type_.as_deref()) {
                return Err(empty(format!("dist.disters.{}", id)));
            }
        }
    }
    if let Some(builders) = product
        .docker
        .as_ref()
        .and_then(|docker| docker.docker_builders.as_ref())
    {
        for (id, builder) in builders {
            if is_blank(builder.type_.as_deref()) {
                return Err(empty(format!("docker.docker-builders.{}", id)));
            }
        }
    }
    Ok(())
}

/// An explicitly written but empty type; an absent type falls back to the default.
fn is_blank(type_name: Option<&str>) -> bool {
    type_name.map(|name| name.trim().is_empty()).unwrap_or(false)
}

/// Product ids that `id` depends on, for callers ordering builds.
pub fn dependencies_of<'a>(config: &'a ProjectConfig, id: &ProductId) -> Vec<&'a ProductId> {
    config
        .products
        .get(id)
        .and_then(|product| product.dependencies.as_ref())
        .map(|dependencies| dependencies.iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(input: &str) -> ProjectConfig {
        serde_yaml::from_str(input).expect("decode")
    }

    #[test]
    fn accepts_consistent_config() {
        let config = config(
            r#"
products:
  api:
    dependencies: [worker]
    docker:
      docker-builders:
        image:
          type: default
          input-dists: [worker.bin]
  worker: {}
"#,
        );
        validate(&config).expect("valid");
        assert_eq!(
            dependencies_of(&config, &ProductId::from("api")),
            vec![&ProductId::from("worker")]
        );
    }

    #[test]
    fn rejects_unknown_dependency() {
        let error = validate(&config("products:\n  api:\n    dependencies: [ghost]\n"))
            .expect_err("unknown dependency");
        assert!(matches!(error, ValidationError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_self_dependency() {
        let error = validate(&config("products:\n  api:\n    dependencies: [api]\n"))
            .expect_err("self dependency");
        assert_eq!(
            error,
            ValidationError::SelfDependency {
                product: "api".to_string()
            }
        );
    }

    #[test]
    fn rejects_empty_explicit_type() {
        let error = validate(&config(
            "products:\n  api:\n    dist:\n      disters:\n        main:\n          type: \"\"\n",
        ))
        .expect_err("empty type");
        assert!(error.to_string().contains("dist.disters.main"));
    }

    #[test]
    fn rejects_input_dist_of_unknown_product() {
        let error = validate(&config(
            "products:\n  api:\n    docker:\n      docker-builders:\n        image:\n          input-dists: [ghost.sls]\n",
        ))
        .expect_err("unknown input");
        assert!(matches!(error, ValidationError::UnknownInputDist { .. }));
    }

    #[test]
    fn rejects_invalid_exclude_pattern() {
        let error = validate(&config("exclude:\n  names: [\"(\"]\n")).expect_err("bad regex");
        assert!(matches!(error, ValidationError::InvalidExclude { .. }));
    }
}
