use std::path::{Component, Path};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Paths skipped when looking for products, as written under `exclude`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExcludeConfig {
    /// Regular expressions matched against each path component.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    /// Relative paths; a match also excludes everything below it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl ExcludeConfig {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }

    pub fn matcher(&self) -> Result<Matcher, regex::Error> {
        let names = self
            .names
            .iter()
            .map(|pattern| Regex::new(&format!("^(?:{})$", pattern)))
            .collect::<Result<Vec<_>, _>>()?;
        let paths = self
            .paths
            .iter()
            .map(|path| normalize(Path::new(path)))
            .filter(|components| !components.is_empty())
            .collect();
        Ok(Matcher { names, paths })
    }
}

#[derive(Clone, Debug)]
pub struct Matcher {
    names: Vec<Regex>,
    paths: Vec<Vec<String>>,
}

impl Matcher {
    pub fn matches(&self, path: &Path) -> bool {
        let components = normalize(path);
        if components
            .iter()
            .any(|component| self.names.iter().any(|name| name.is_match(component)))
        {
            return true;
        }
        self.paths
            .iter()
            .any(|prefix| components.starts_with(prefix.as_slice()))
    }
}

fn normalize(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
