//! # Snapshot Engine
//!
//! `save` writes every engine of every namespace below a root into a
//! directory tree mirroring the namespace hierarchy, one file per engine.
//! `restore` walks such a tree and recreates namespaces, engines and
//! secrets.
//!
//! Files are named `<engine>.yaml` but hold the JSON export of the engine,
//! rooted at `<engine>/`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::errors::{Result, VkvError};
use crate::import::{parse_document, writable_entries};
use crate::render::{OutputFormat, RenderOptions, Renderer};
use crate::store::{Node, StoreClient, Tree};
use crate::utils::join_namespace;
use crate::walker::{walk_engines, walk_subtree};

pub const SNAPSHOT_EXTENSION: &str = "yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub namespaces: Vec<String>,
    pub engines: Vec<String>,
    pub leaves: usize,
}

fn io_err(path: &Path, e: std::io::Error) -> VkvError {
    VkvError::io(path.display().to_string(), e)
}

/// Write `contents` to `path`, readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| io_err(path, e))?;
    file.write_all(contents).map_err(|e| io_err(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

/// Snapshot every engine below namespace `root` into `destination`.
pub async fn save<C>(
    client: &C,
    destination: &Path,
    root: &str,
    skip_errors: bool,
    progress: &mut dyn Write,
) -> Result<SaveReport>
where
    C: StoreClient + ?Sized,
{
    let renderer = Renderer::new(RenderOptions::with_format(OutputFormat::Json))?;
    let engines = walk_engines(client, root).await?;
    let mut report = SaveReport::default();

    for (namespace, names) in &engines {
        let dir = destination.join(namespace);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        for engine in names {
            if engine.contains('/') {
                warn!(
                    namespace = %namespace,
                    engine = %engine,
                    "Skipping engine with '/' in its name"
                );
                continue;
            }
            let full_ns = join_namespace(root, namespace);
            let tree = walk_subtree(client, &full_ns, engine, "", skip_errors).await?;
            let rendered = renderer.render(engine, "", &tree)?;

            let file = dir.join(format!("{}.{}", engine, SNAPSHOT_EXTENSION));
            write_private(&file, rendered.as_bytes())?;
            info!(
                namespace = %namespace,
                engine = %engine,
                leaves = tree.leaf_count(),
                "Saved engine"
            );
            writeln!(progress, "created {}", file.display()).map_err(|e| io_err(&file, e))?;
            report.files.push(file);
        }
    }

    Ok(report)
}

/// Unwrap the `<engine>/` root of a snapshot file. Flat `path → leaf`
/// maps and unrooted trees are taken as they are.
fn engine_tree(value: &serde_json::Value, engine: &str) -> Result<Tree> {
    let tree = Tree::from_json(value)?;
    let root = format!("{}/", engine);
    if tree.len() == 1 {
        if let Some(Node::Dir(inner)) = tree.get(&root) {
            return Ok(inner.clone());
        }
    }
    Ok(tree)
}

fn namespace_of(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Hidden files and directories below the snapshot root are not part of it.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Recreate everything found in the snapshot directory `source`.
pub async fn restore<C>(
    client: &C,
    source: &Path,
    progress: &mut dyn Write,
) -> Result<RestoreReport>
where
    C: StoreClient + ?Sized,
{
    if !source.is_dir() {
        return Err(VkvError::bad_input(format!("'{}' is not a directory", source.display())));
    }

    let mut report = RestoreReport::default();
    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|e| {
            VkvError::bad_input(format!("failed to walk '{}': {}", source.display(), e))
        })?;
        let relative = entry.path().strip_prefix(source).map_err(|e| {
            VkvError::internal(format!("'{}' escaped the snapshot: {}", entry.path().display(), e))
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            let namespace = namespace_of(relative);
            let parent = relative.parent().map(namespace_of).unwrap_or_default();
            client.create_namespace(&parent, &file_name, true).await?;
            debug!(namespace = %namespace, "Restored namespace");
            report.namespaces.push(namespace);
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let namespace = relative.parent().map(namespace_of).unwrap_or_default();
        let engine = match entry.path().file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };

        let bytes = fs::read(entry.path()).map_err(|e| io_err(entry.path(), e))?;
        let tree = engine_tree(&parse_document(&bytes)?, &engine)?;
        let entries = writable_entries(&tree)?;

        client.enable_engine(&namespace, &engine, true).await?;
        for (path, leaf) in &entries {
            client.write(&namespace, &engine, path, &leaf.data).await?;
        }

        info!(namespace = %namespace, engine = %engine, leaves = entries.len(), "Restored engine");
        writeln!(progress, "restored {} ({} secrets)", entry.path().display(), entries.len())
            .map_err(|e| io_err(entry.path(), e))?;
        report.engines.push(join_namespace(&namespace, &engine));
        report.leaves += entries.len();
    }

    Ok(report)
}
