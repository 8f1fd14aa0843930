use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(
    /// Identifies a product within a project. Case-sensitive.
    ProductId
);
string_id!(
    /// Identifies a dister within a product's `dist.disters` section.
    DistId
);
string_id!(
    /// Identifies a docker builder within a product's `docker.docker-builders` section.
    DockerId
);
string_id!(
    /// Identifies a publisher configuration within a product's `publish.info` section.
    PublisherTypeId
);

/// Reference to a single dist of a product, written as `<product>.<dist>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductDistId(String);

impl ProductDistId {
    pub fn new(product: &ProductId, dist: &DistId) -> Self {
        Self(format!("{}.{}", product, dist))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits on the first `.`; a reference without a dist part names every dist of the product.
    pub fn parts(&self) -> (ProductId, Option<DistId>) {
        match self.0.split_once('.') {
            Some((product, dist)) => (ProductId::from(product), Some(DistId::from(dist))),
            None => (ProductId::from(self.0.as_str()), None),
        }
    }
}

impl fmt::Display for ProductDistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductDistId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An operating system and architecture pair, written as `{os: linux, arch: amd64}` in config.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsArch {
    pub os: String,
    pub arch: String,
}

impl OsArch {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for OsArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OsArchParseError {
    pub value: String,
}

impl fmt::Display for OsArchParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not of the form <os>-<arch>", self.value)
    }
}

impl std::error::Error for OsArchParseError {}

impl FromStr for OsArch {
    type Err = OsArchParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once('-') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() && !arch.contains('-') => {
                Ok(OsArch::new(os, arch))
            }
            _ => Err(OsArchParseError {
                value: value.to_string(),
            }),
        }
    }
}

/// Ordered, duplicate-free list of product ids.
///
/// Insertion order is kept because it drives build ordering. Inserting an id
/// that is already present is a no-op; decoding a list with repeats keeps the
/// first occurrence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyList(Vec<ProductId>);

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id was added.
    pub fn insert(&mut self, id: ProductId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn contains(&self, id: &ProductId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProductId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[ProductId] {
        &self.0
    }
}

impl FromIterator<ProductId> for DependencyList {
    fn from_iter<I: IntoIterator<Item = ProductId>>(iter: I) -> Self {
        let mut list = DependencyList::new();
        for id in iter {
            list.insert(id);
        }
        list
    }
}

impl<'a> IntoIterator for &'a DependencyList {
    type Item = &'a ProductId;
    type IntoIter = std::slice::Iter<'a, ProductId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for DependencyList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ids = Vec::<ProductId>::deserialize(deserializer)?;
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dependency_list_ignores_repeats() {
        let mut deps = DependencyList::new();
        assert!(deps.insert(ProductId::from("b")));
        assert!(deps.insert(ProductId::from("a")));
        assert!(!deps.insert(ProductId::from("b")));
        assert_eq!(deps.as_slice(), &[ProductId::from("b"), ProductId::from("a")]);
    }

    #[test]
    fn dependency_list_decodes_with_first_occurrence_order() {
        let deps: DependencyList = serde_yaml::from_str("[c, a, c, b, a]").expect("decode");
        let ids: Vec<&str> = deps.iter().map(ProductId::as_str).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn product_dist_id_splits_on_first_dot() {
        let id = ProductDistId::new(&ProductId::from("foo"), &DistId::from("bin"));
        assert_eq!(id.as_str(), "foo.bin");
        let (product, dist) = id.parts();
        assert_eq!(product, "foo");
        assert_eq!(dist, Some(DistId::from("bin")));
        assert_eq!(ProductDistId::from("foo").parts().1, None);
    }

    #[test]
    fn os_arch_parses_and_displays() {
        let parsed: OsArch = "linux-amd64".parse().expect("parse");
        assert_eq!(parsed, OsArch::new("linux", "amd64"));
        assert_eq!(parsed.to_string(), "linux-amd64");
        assert!("linux".parse::<OsArch>().is_err());
        assert!("linux-amd64-extra".parse::<OsArch>().is_err());
    }

    #[test]
    fn os_arch_config_form_is_a_mapping() {
        let decoded: OsArch = serde_yaml::from_str("{os: linux, arch: amd64}").expect("decode");
        assert_eq!(decoded, OsArch::new("linux", "amd64"));
        assert!(serde_yaml::from_str::<OsArch>("linux-amd64").is_err());
    }

    proptest! {
        #[test]
        fn dependency_list_has_no_duplicates_and_keeps_first_seen_order(
            ids in proptest::collection::vec("[a-e]", 0..32)
        ) {
            let deps: DependencyList = ids.iter().map(|id| ProductId::from(id.as_str())).collect();
            let mut expected: Vec<String> = Vec::new();
            for id in &ids {
                if !expected.contains(id) {
                    expected.push(id.clone());
                }
            }
            let actual: Vec<String> = deps.iter().map(|id| id.to_string()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
