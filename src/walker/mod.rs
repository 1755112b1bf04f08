//! # Walker
//!
//! Rebuilds nested trees from a store that only offers "list one level"
//! and "read one leaf", and enumerates namespaces and engines.

use std::collections::VecDeque;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::errors::{Result, VkvError};
use crate::store::{EngineMap, NamespaceMap, StoreClient, Tree};
use crate::utils::{dir_path, join_namespace, last_segment, parent_dir, sort_paths};

/// A walked tree together with the engine-relative directory it hangs off.
///
/// `base` is the walked sub-path in directory form, or the parent directory
/// when the sub-path named a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub tree: Tree,
    pub base: String,
}

/// Walk `engine/sub_path` in `namespace` and return its contents.
///
/// Keys are relative to `sub_path`. When `sub_path` names a leaf the result
/// is the single entry `{last segment → leaf}`.
pub async fn walk_subtree<C>(
    client: &C,
    namespace: &str,
    engine: &str,
    sub_path: &str,
    skip_errors: bool,
) -> Result<Tree>
where
    C: StoreClient + ?Sized,
{
    Ok(walk_subtree_located(client, namespace, engine, sub_path, skip_errors).await?.tree)
}

/// Like [`walk_subtree`], also reporting where the tree is rooted.
pub async fn walk_subtree_located<C>(
    client: &C,
    namespace: &str,
    engine: &str,
    sub_path: &str,
    skip_errors: bool,
) -> Result<Located>
where
    C: StoreClient + ?Sized,
{
    let dir = dir_path(sub_path)?;
    debug!(namespace = %namespace, engine = %engine, path = %dir, "Walking subtree");

    match client.list(namespace, engine, &dir).await {
        Ok(names) => {
            let tree = walk_children(client, namespace, engine, dir.clone(), names, skip_errors)
                .await?;
            Ok(Located { tree, base: dir })
        }
        Err(VkvError::NotFound { .. }) if dir.is_empty() => {
            if engine_exists(client, namespace, engine).await? {
                debug!(engine = %engine, "Engine is empty");
                Ok(Located { tree: Tree::new(), base: dir })
            } else if skip_errors {
                warn!(engine = %engine, "Skipping missing engine");
                Ok(Located { tree: Tree::new(), base: dir })
            } else {
                Err(VkvError::not_found(format!("engine '{}'", engine.trim_matches('/'))))
            }
        }
        Err(VkvError::NotFound { .. }) => {
            let leaf_path = dir.trim_end_matches('/');
            match client.read(namespace, engine, leaf_path).await {
                Ok(leaf) => {
                    let mut tree = Tree::new();
                    tree.insert_leaf(last_segment(leaf_path), leaf);
                    Ok(Located { tree, base: parent_dir(leaf_path) })
                }
                Err(e) if skip_errors && e.is_skippable() => {
                    warn!(path = %leaf_path, error = %e, "Skipping unreadable path");
                    Ok(Located { tree: Tree::new(), base: dir })
                }
                Err(e) => Err(e),
            }
        }
        Err(e) if skip_errors && e.is_skippable() => {
            warn!(path = %dir, error = %e, "Skipping unlistable path");
            Ok(Located { tree: Tree::new(), base: dir })
        }
        Err(e) => Err(e),
    }
}

/// Whether `engine` is mounted in `namespace`.
///
/// A token that may not list mounts cannot tell, so the engine is assumed
/// to exist.
async fn engine_exists<C>(client: &C, namespace: &str, engine: &str) -> Result<bool>
where
    C: StoreClient + ?Sized,
{
    match client.list_engines(namespace).await {
        Ok(engines) => {
            let engine = engine.trim_matches('/');
            Ok(engines.iter().any(|name| name.trim_matches('/') == engine))
        }
        Err(VkvError::Forbidden { .. }) => Ok(true),
        Err(e) => Err(e),
    }
}

fn walk_children<'a, C>(
    client: &'a C,
    namespace: &'a str,
    engine: &'a str,
    dir: String,
    mut names: Vec<String>,
    skip_errors: bool,
) -> BoxFuture<'a, Result<Tree>>
where
    C: StoreClient + ?Sized,
{
    async move {
        sort_paths(&mut names);
        let mut tree = Tree::new();

        for name in names {
            let child = format!("{}{}", dir, name);
            if name.ends_with('/') {
                let listed = match client.list(namespace, engine, &child).await {
                    Ok(listed) => listed,
                    Err(e) if skip_errors && e.is_skippable() => {
                        warn!(path = %child, error = %e, "Skipping directory");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let subtree =
                    walk_children(client, namespace, engine, child, listed, skip_errors).await?;
                tree.insert_dir(name, subtree);
            } else {
                match client.read(namespace, engine, &child).await {
                    Ok(leaf) => tree.insert_leaf(name, leaf),
                    Err(e) if skip_errors && e.is_skippable() => {
                        warn!(path = %child, error = %e, "Skipping leaf");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(tree)
    }
    .boxed()
}

/// Every namespace below `root`, mapped to its direct children.
///
/// Keys are relative to `root`; the root itself is the empty key.
pub async fn walk_namespaces<C>(client: &C, root: &str) -> Result<NamespaceMap>
where
    C: StoreClient + ?Sized,
{
    let mut map = NamespaceMap::new();
    let mut queue = VecDeque::from([String::new()]);

    while let Some(relative) = queue.pop_front() {
        let full = join_namespace(root, &relative);
        let mut children: Vec<String> = client
            .list_namespaces(&full)
            .await?
            .into_iter()
            .map(|name| name.trim_matches('/').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        children.sort();
        children.dedup();

        for child in &children {
            queue.push_back(join_namespace(&relative, child));
        }
        map.insert(relative, children);
    }

    debug!(root = %root, count = map.len(), "Walked namespaces");
    Ok(map)
}

/// Every supported engine in every namespace below `root`.
///
/// Namespaces without engines map to an empty list.
pub async fn walk_engines<C>(client: &C, root: &str) -> Result<EngineMap>
where
    C: StoreClient + ?Sized,
{
    let namespaces = walk_namespaces(client, root).await?;
    let mut engines = EngineMap::new();

    for namespace in namespaces.into_keys() {
        let mut names: Vec<String> = client
            .list_engines(&join_namespace(root, &namespace))
            .await?
            .into_iter()
            .map(|name| name.trim_matches('/').to_string())
            .collect();
        names.sort();
        engines.insert(namespace, names);
    }

    Ok(engines)
}
