//! Value model for secrets read from the store.
//!
//! A [`Tree`] mirrors one engine (or a sub-path of it): directory keys end
//! with `/` and hold nested trees, every other key holds a [`SecretLeaf`].

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Result, VkvError};
use crate::utils::path_cmp;

/// Namespace path → ordered engine names.
pub type EngineMap = BTreeMap<String, Vec<String>>;

/// Namespace path → ordered direct child namespace names.
pub type NamespaceMap = BTreeMap<String, Vec<String>>;

/// Engine-relative leaf path → leaf.
pub type FlatSecrets = BTreeMap<String, SecretLeaf>;

/// Scalar secret value. The original type is kept so YAML/JSON output
/// round-trips; everything else stringifies it.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl SecretValue {
    /// Convert an arbitrary JSON value. Nested structures are kept as their
    /// compact JSON text and `null` becomes an empty string.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Number(n) => Self::Number(n.clone()),
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Null => Self::String(String::new()),
            other => Self::String(other.to_string()),
        }
    }

    /// Convert back to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for SecretValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SecretValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => n.serialize(serializer),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// Key/value map stored at one secret path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretLeaf {
    pub data: BTreeMap<String, SecretValue>,
    pub version: Option<u64>,
    pub custom_metadata: BTreeMap<String, String>,
}

impl SecretLeaf {
    pub fn new(data: BTreeMap<String, SecretValue>) -> Self {
        Self { data, version: None, custom_metadata: BTreeMap::new() }
    }

    /// Build a leaf from string pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<SecretValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_metadata.insert(key.into(), value.into());
        self
    }

    /// Copy of this leaf with every value replaced by `f(value)`.
    pub fn map_values(&self, f: impl Fn(&SecretValue) -> SecretValue) -> Self {
        Self {
            data: self.data.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
            version: self.version,
            custom_metadata: self.custom_metadata.clone(),
        }
    }
}

// Only the key/value data is part of the serialized shape.
impl Serialize for SecretLeaf {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

/// A tree entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Dir(Tree),
    Leaf(SecretLeaf),
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Dir(tree) => tree.serialize(serializer),
            Self::Leaf(leaf) => leaf.serialize(serializer),
        }
    }
}

/// Nested map of directories and leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    entries: BTreeMap<String, Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: Node) {
        self.entries.insert(key.into(), node);
    }

    pub fn insert_leaf(&mut self, key: impl Into<String>, leaf: SecretLeaf) {
        self.insert(key, Node::Leaf(leaf));
    }

    pub fn insert_dir(&mut self, key: impl Into<String>, tree: Tree) {
        self.insert(key, Node::Dir(tree));
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.entries.iter()
    }

    /// Entries ordered with [`path_cmp`].
    pub fn sorted(&self) -> Vec<(&String, &Node)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| path_cmp(a.0, b.0));
        entries
    }

    /// Number of leaves anywhere below this tree.
    pub fn leaf_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                Node::Dir(tree) => tree.leaf_count(),
                Node::Leaf(_) => 1,
            })
            .sum()
    }

    /// Build a tree from a parsed JSON document.
    ///
    /// Keys ending in `/` must hold maps and become directories. Other keys
    /// holding a map of scalars become leaves; a map of maps under a key
    /// without the trailing slash is accepted as a directory.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| VkvError::bad_input("expected a map at the top level"))?;
        Self::from_object(map, "")
    }

    fn from_object(map: &serde_json::Map<String, serde_json::Value>, at: &str) -> Result<Self> {
        let mut tree = Tree::new();
        for (key, value) in map {
            let here = format!("{}{}", at, key);
            let object = value.as_object().ok_or_else(|| {
                VkvError::bad_input(format!("expected a map at '{}', found a scalar", here))
            })?;

            if key.ends_with('/') {
                tree.insert_dir(key.clone(), Self::from_object(object, &here)?);
                continue;
            }

            let nested = object.values().filter(|v| v.is_object()).count();
            if nested == 0 {
                let data =
                    object.iter().map(|(k, v)| (k.clone(), SecretValue::from_json(v))).collect();
                tree.insert_leaf(key.clone(), SecretLeaf::new(data));
            } else if nested == object.len() {
                let dir_key = format!("{}/", key);
                let dir_at = format!("{}{}", at, dir_key);
                tree.insert_dir(dir_key, Self::from_object(object, &dir_at)?);
            } else {
                return Err(VkvError::bad_input(format!(
                    "'{}' mixes nested maps and scalar values",
                    here
                )));
            }
        }
        Ok(tree)
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let sorted = self.sorted();
        let mut map = serializer.serialize_map(Some(sorted.len()))?;
        for (key, node) in sorted {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

/// Effective permissions of the token on one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
    pub list: bool,
    pub root: bool,
}

impl Capability {
    /// Capability with `root` set, which implies every other flag.
    pub fn root() -> Self {
        Self { create: true, read: true, update: true, delete: true, list: true, root: true }
    }

    /// Parse the capability names returned by the store.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut cap = Self::default();
        for name in names {
            match name.as_ref() {
                "root" => return Self::root(),
                "deny" => return Self::default(),
                "create" => cap.create = true,
                "read" => cap.read = true,
                "update" => cap.update = true,
                "delete" => cap.delete = true,
                "list" => cap.list = true,
                _ => {}
            }
        }
        cap
    }

    /// Union of two capability sets.
    pub fn union(self, other: Self) -> Self {
        if self.root || other.root {
            return Self::root();
        }
        Self {
            create: self.create || other.create,
            read: self.read || other.read,
            update: self.update || other.update,
            delete: self.delete || other.delete,
            list: self.list || other.list,
            root: false,
        }
    }

    /// Flags in display order: create, read, update, delete, list, root.
    pub fn flags(&self) -> [bool; 6] {
        if self.root {
            return [true; 6];
        }
        [self.create, self.read, self.update, self.delete, self.list, self.root]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secret_value_display() {
        assert_eq!(SecretValue::from("x").to_string(), "x");
        assert_eq!(SecretValue::from(42i64).to_string(), "42");
        assert_eq!(SecretValue::from(true).to_string(), "true");
        assert_eq!(SecretValue::from_json(&json!(1.5)).to_string(), "1.5");
        assert_eq!(SecretValue::from_json(&json!(null)).to_string(), "");
    }

    #[test]
    fn test_secret_value_keeps_type_in_json() {
        let leaf = SecretLeaf::from_pairs([
            ("port", SecretValue::from(5432i64)),
            ("tls", SecretValue::from(true)),
            ("user", SecretValue::from("admin")),
        ]);
        let json = serde_json::to_value(&leaf).unwrap();
        assert_eq!(json, json!({"port": 5432, "tls": true, "user": "admin"}));
    }

    #[test]
    fn test_tree_from_json_shapes() {
        let value = json!({
            "kv/": {
                "app/": { "db": { "user": "admin" } },
                "secret": { "key": "value" },
                "nested": { "inner": { "a": 1 } }
            }
        });
        let tree = Tree::from_json(&value).unwrap();
        let Some(Node::Dir(kv)) = tree.get("kv/") else { panic!("expected kv/ directory") };
        assert!(matches!(kv.get("app/"), Some(Node::Dir(_))));
        assert!(matches!(kv.get("secret"), Some(Node::Leaf(_))));
        assert!(matches!(kv.get("nested/"), Some(Node::Dir(_))));
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn test_tree_from_json_rejects_mixed_and_scalars() {
        assert!(Tree::from_json(&json!({"a": {"b": {"c": "d"}, "e": "f"}})).is_err());
        assert!(Tree::from_json(&json!({"a/": "scalar"})).is_err());
        assert!(Tree::from_json(&json!(["not", "a", "map"])).is_err());
    }

    #[test]
    fn test_tree_serializes_in_path_order() {
        let mut tree = Tree::new();
        tree.insert_leaf("a2", SecretLeaf::default());
        tree.insert_leaf("a-b", SecretLeaf::default());
        tree.insert_dir("a/", Tree::new());
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(json, r#"{"a/":{},"a-b":{},"a2":{}}"#);
    }

    #[test]
    fn test_capability_root_implies_all() {
        let cap = Capability::from_names(&["read", "root"]);
        assert_eq!(cap.flags(), [true; 6]);

        let cap = Capability::from_names(&["read", "list"]);
        assert_eq!(cap.flags(), [false, true, false, false, true, false]);

        let cap = Capability::from_names(&["read", "deny"]);
        assert_eq!(cap, Capability::default());
    }

    #[test]
    fn test_capability_union() {
        let a = Capability::from_names(&["read"]);
        let b = Capability::from_names(&["list"]);
        assert_eq!(a.union(b).flags(), [false, true, false, false, true, false]);
        assert!(a.union(Capability::root()).root);
    }
}
