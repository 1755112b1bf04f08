//! # Projection
//!
//! Pure transformations over [`Tree`]s and flat path maps. Inputs are never
//! mutated; every function returns a fresh value.

use std::collections::BTreeMap;

use regex::Regex;

use crate::errors::{Result, VkvError};
use crate::store::{FlatSecrets, Node, SecretLeaf, SecretValue, Tree};

/// Apply `f` to every leaf, keeping the directory structure.
pub fn map_leaves(tree: &Tree, f: &dyn Fn(&SecretLeaf) -> SecretLeaf) -> Tree {
    let mut out = Tree::new();
    for (key, node) in tree.iter() {
        match node {
            Node::Dir(sub) => out.insert_dir(key.clone(), map_leaves(sub, f)),
            Node::Leaf(leaf) => out.insert_leaf(key.clone(), f(leaf)),
        }
    }
    out
}

/// Replace every value with an empty string.
pub fn only_keys(tree: &Tree) -> Tree {
    map_leaves(tree, &|leaf| leaf.map_values(|_| SecretValue::String(String::new())))
}

/// Replace every leaf with an empty map.
pub fn only_paths(tree: &Tree) -> Tree {
    map_leaves(tree, &|leaf| SecretLeaf { data: BTreeMap::new(), ..leaf.clone() })
}

/// `*` repeated `min(len, cap)` times; `cap < 0` means no cap.
pub fn mask_value(value: &SecretValue, cap: i64) -> String {
    let len = value.to_string().chars().count();
    let len = if cap < 0 { len } else { len.min(cap as usize) };
    "*".repeat(len)
}

/// Mask every value of the tree.
pub fn mask_values(tree: &Tree, cap: i64) -> Tree {
    map_leaves(tree, &|leaf| leaf.map_values(|v| SecretValue::String(mask_value(v, cap))))
}

/// Shorten a shown value to `cap` characters followed by `...`.
pub fn truncate_value(value: &str, cap: i64) -> String {
    if cap < 0 || value.chars().count() <= cap as usize {
        return value.to_string();
    }
    let head: String = value.chars().take(cap as usize).collect();
    format!("{}...", head)
}

/// Truncate every value of the tree, stringifying non-string scalars.
pub fn truncate_values(tree: &Tree, cap: i64) -> Tree {
    if cap < 0 {
        return tree.clone();
    }
    map_leaves(tree, &|leaf| {
        leaf.map_values(|v| match v {
            SecretValue::String(s) => SecretValue::String(truncate_value(s, cap)),
            other => {
                let shown = other.to_string();
                let truncated = truncate_value(&shown, cap);
                if truncated == shown {
                    other.clone()
                } else {
                    SecretValue::String(truncated)
                }
            }
        })
    })
}

/// Collapse the tree into `relative/path → leaf`.
pub fn flatten(tree: &Tree) -> FlatSecrets {
    let mut flat = FlatSecrets::new();
    flatten_into(tree, "", &mut flat);
    flat
}

fn flatten_into(tree: &Tree, prefix: &str, flat: &mut FlatSecrets) {
    for (key, node) in tree.iter() {
        let path = format!("{}{}", prefix, key);
        match node {
            Node::Dir(sub) => flatten_into(sub, &path, flat),
            Node::Leaf(leaf) => {
                flat.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild a tree from `relative/path → leaf`, nested under `prefix` when it
/// is not empty.
pub fn unflatten(flat: &FlatSecrets, prefix: &str) -> Tree {
    let entries = flat.iter().map(|(path, leaf)| (path.clone(), leaf.clone())).collect();
    path_prefix(&nest(entries), prefix)
}

fn nest(entries: Vec<(String, SecretLeaf)>) -> Tree {
    let mut tree = Tree::new();
    let mut groups: BTreeMap<String, Vec<(String, SecretLeaf)>> = BTreeMap::new();

    for (path, leaf) in entries {
        match path.split_once('/') {
            Some((head, rest)) if !rest.is_empty() => {
                groups.entry(format!("{}/", head)).or_default().push((rest.to_string(), leaf));
            }
            _ => tree.insert_leaf(path.trim_end_matches('/'), leaf),
        }
    }

    for (dir, children) in groups {
        tree.insert_dir(dir, nest(children));
    }
    tree
}

/// Recursive union of two trees. On a clash of leaves `a` wins.
pub fn deep_merge(a: &Tree, b: &Tree) -> Tree {
    let mut out = b.clone();
    for (key, node) in a.iter() {
        let merged = match (node, b.get(key)) {
            (Node::Dir(left), Some(Node::Dir(right))) => Node::Dir(deep_merge(left, right)),
            (left, _) => left.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Wrap `tree` under the directory `root/`. An empty root is a no-op.
pub fn path_prefix(tree: &Tree, root: &str) -> Tree {
    let root = root.trim_matches('/');
    if root.is_empty() {
        return tree.clone();
    }
    let mut out = Tree::new();
    out.insert_dir(format!("{}/", root), tree.clone());
    out
}

/// Compile a user pattern, mapping failures to `bad-pattern`.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| VkvError::bad_pattern(pattern, e.to_string()))
}

/// Keep the names matching `pattern`, preserving order.
pub fn regex_filter<S: AsRef<str>>(names: &[S], pattern: &str) -> Result<Vec<String>> {
    let re = compile_pattern(pattern)?;
    Ok(names.iter().map(AsRef::as_ref).filter(|n| re.is_match(n)).map(str::to_string).collect())
}

/// Leaf at `relative/path`, if any.
pub fn lookup<'a>(tree: &'a Tree, path: &str) -> Option<&'a SecretLeaf> {
    match path.split_once('/') {
        Some((head, rest)) if !rest.is_empty() => match tree.get(&format!("{}/", head))? {
            Node::Dir(sub) => lookup(sub, rest),
            Node::Leaf(_) => None,
        },
        _ => match tree.get(path.trim_end_matches('/'))? {
            Node::Leaf(leaf) => Some(leaf),
            Node::Dir(_) => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(pairs: &[(&str, &str)]) -> SecretLeaf {
        SecretLeaf::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)))
    }

    fn sample() -> Tree {
        let mut inner = Tree::new();
        inner.insert_leaf("db", leaf(&[("user", "admin"), ("password", "hunter22")]));
        let mut tree = Tree::new();
        tree.insert_dir("app/", inner);
        tree.insert_leaf("top", leaf(&[("k", "value")]));
        tree
    }

    #[test]
    fn test_only_keys_and_paths() {
        let keys = only_keys(&sample());
        let db = lookup(&keys, "app/db").unwrap();
        assert_eq!(db.data.len(), 2);
        assert!(db.data.values().all(|v| v.to_string().is_empty()));

        let paths = only_paths(&sample());
        assert!(lookup(&paths, "app/db").unwrap().data.is_empty());
        assert_eq!(paths.leaf_count(), 2);
    }

    #[test]
    fn test_mask_value() {
        assert_eq!(mask_value(&"password".into(), 12), "********");
        assert_eq!(mask_value(&"a-very-long-secret-value".into(), 12), "************");
        assert_eq!(mask_value(&"a-very-long-secret-value".into(), -1).len(), 24);
        assert_eq!(mask_value(&SecretValue::from(true), -1), "****");
        assert_eq!(mask_value(&"x".into(), 0), "");
    }

    #[test]
    fn test_truncate_value() {
        assert_eq!(truncate_value("short", 12), "short");
        assert_eq!(truncate_value("exactly-12ch", 12), "exactly-12ch");
        assert_eq!(truncate_value("much-longer-than-twelve", 12), "much-longer-...");
        assert_eq!(truncate_value("much-longer-than-twelve", -1), "much-longer-than-twelve");
    }

    #[test]
    fn test_flatten_unflatten() {
        let flat = flatten(&sample());
        assert_eq!(flat.keys().collect::<Vec<_>>(), vec!["app/db", "top"]);
        assert_eq!(unflatten(&flat, ""), sample());
        assert_eq!(unflatten(&flat, "kv"), path_prefix(&sample(), "kv/"));
    }

    #[test]
    fn test_deep_merge_left_wins() {
        let mut newer = Tree::new();
        let mut app = Tree::new();
        app.insert_leaf("db", leaf(&[("user", "root")]));
        app.insert_leaf("api", leaf(&[("token", "t")]));
        newer.insert_dir("app/", app);

        let merged = deep_merge(&newer, &sample());
        assert_eq!(lookup(&merged, "app/db").unwrap(), &leaf(&[("user", "root")]));
        assert!(lookup(&merged, "app/api").is_some());
        assert!(lookup(&merged, "top").is_some());
    }

    #[test]
    fn test_path_prefix() {
        let wrapped = path_prefix(&sample(), "engine/path");
        assert!(matches!(wrapped.get("engine/path/"), Some(Node::Dir(_))));
        assert_eq!(path_prefix(&sample(), ""), sample());
    }

    #[test]
    fn test_regex_filter() {
        let names = ["kv", "secret", "kv-prod"];
        assert_eq!(regex_filter(&names, "^kv").unwrap(), vec!["kv", "kv-prod"]);
        assert_eq!(regex_filter(&names, "KV").unwrap(), Vec::<String>::new());
        let err = regex_filter(&names, "(").unwrap_err();
        assert_eq!(err.kind(), "bad-pattern");
    }

    #[test]
    fn test_lookup_distinguishes_dirs() {
        let tree = sample();
        assert!(lookup(&tree, "app").is_none());
        assert!(lookup(&tree, "app/").is_none());
        assert!(lookup(&tree, "top/db").is_none());
        assert!(lookup(&tree, "missing").is_none());
    }
}
