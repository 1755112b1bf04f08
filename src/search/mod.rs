//! # Search
//!
//! Walks the whole store below the client's base namespace and reports
//! which namespaces, engines, leaf paths, keys and values match a pattern.

use std::collections::BTreeSet;
use std::fmt;

use owo_colors::OwoColorize;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::errors::Result;
use crate::projection::{compile_pattern, flatten};
use crate::render::table::{align, Cell};
use crate::store::StoreClient;
use crate::utils::join_namespace;
use crate::walker::{walk_engines, walk_namespaces, walk_subtree};

/// What a search record matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Namespace,
    Engine,
    Path,
    Key,
    Value,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Engine => "engine",
            Self::Path => "path",
            Self::Key => "key",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub kind: MatchKind,
    /// Fully qualified path: `namespace/engine/sub/path`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Web UI link for a hit. `engine` and `leaf` are unqualified.
pub fn match_url(address: &str, kind: MatchKind, engine: &str, leaf: &str) -> String {
    let address = address.trim_end_matches('/');
    let engine = format!("{}/", engine.trim_matches('/'));
    match kind {
        MatchKind::Namespace => address.to_string(),
        MatchKind::Engine => format!("{}/ui/vault/secrets/{}kv/list", address, engine),
        MatchKind::Path => format!("{}/ui/vault/secrets/{}kv/list/{}", address, engine, leaf),
        MatchKind::Key | MatchKind::Value => {
            format!("{}/ui/vault/secrets/{}kv/{}", address, engine, leaf)
        }
    }
}

struct Collector<'a> {
    address: Option<&'a str>,
    seen: BTreeSet<(MatchKind, String)>,
    matches: Vec<SearchMatch>,
}

impl Collector<'_> {
    fn push(&mut self, kind: MatchKind, path: String, engine: &str, leaf: &str) {
        if !self.seen.insert((kind, path.clone())) {
            return;
        }
        let url = self.address.map(|address| match_url(address, kind, engine, leaf));
        self.matches.push(SearchMatch { kind, path, url });
    }
}

/// Match `pattern` against every namespace, engine, leaf path, key and
/// value. Unreadable paths are skipped.
pub async fn find_secrets<C>(client: &C, pattern: &str) -> Result<Vec<SearchMatch>>
where
    C: StoreClient + ?Sized,
{
    let re = compile_pattern(pattern)?;
    let engines = walk_engines(client, "").await?;
    let mut collector =
        Collector { address: client.address(), seen: BTreeSet::new(), matches: Vec::new() };

    for (namespace, names) in &engines {
        if !namespace.is_empty() && re.is_match(namespace) {
            collector.push(MatchKind::Namespace, namespace.clone(), "", "");
        }

        for engine in names {
            let engine_path = join_namespace(namespace, engine);
            if re.is_match(engine) {
                collector.push(MatchKind::Engine, engine_path.clone(), engine, "");
            }

            let tree = walk_subtree(client, namespace, engine, "", true).await?;
            for (leaf_path, leaf) in flatten(&tree) {
                let full = format!("{}/{}", engine_path, leaf_path);
                if re.is_match(&leaf_path) {
                    collector.push(MatchKind::Path, full.clone(), engine, &leaf_path);
                }
                if leaf.data.keys().any(|k| re.is_match(k)) {
                    collector.push(MatchKind::Key, full.clone(), engine, &leaf_path);
                }
                if leaf.data.values().any(|v| re.is_match(&v.to_string())) {
                    collector.push(MatchKind::Value, full, engine, &leaf_path);
                }
            }
        }
    }

    debug!(pattern = %pattern, matches = collector.matches.len(), "Search finished");
    Ok(collector.matches)
}

/// Engines (as `namespace/engine`, relative to `root`) whose name
/// matches `pattern`.
pub async fn find_engines<C>(client: &C, root: &str, pattern: &str) -> Result<Vec<String>>
where
    C: StoreClient + ?Sized,
{
    let re = compile_pattern(pattern)?;
    let engines = walk_engines(client, root).await?;
    let mut found: Vec<String> = engines
        .iter()
        .flat_map(|(ns, names)| {
            names.iter().filter(|e| re.is_match(e)).map(move |e| join_namespace(ns, e))
        })
        .collect();
    found.sort();
    Ok(found)
}

/// Namespaces below `root` whose relative path matches `pattern`.
pub async fn find_namespaces<C>(client: &C, root: &str, pattern: &str) -> Result<Vec<String>>
where
    C: StoreClient + ?Sized,
{
    let re: Regex = compile_pattern(pattern)?;
    let namespaces = walk_namespaces(client, root).await?;
    Ok(namespaces.into_keys().filter(|ns| !ns.is_empty() && re.is_match(ns)).collect())
}

/// Columns and styling of the find output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOutput {
    pub header: bool,
    pub match_kind: bool,
    pub print_url: bool,
    pub hyperlinks: bool,
    pub color: bool,
}

impl Default for FindOutput {
    fn default() -> Self {
        Self { header: true, match_kind: true, print_url: false, hyperlinks: false, color: false }
    }
}

fn hyperlink(url: &str) -> String {
    format!("\u{1b}]8;;{}\u{1b}\\{}\u{1b}]8;;\u{1b}\\", url, url)
}

/// Tab-aligned table of matches.
pub fn render_matches(matches: &[SearchMatch], output: &FindOutput) -> String {
    let mut rows = Vec::new();
    if output.header {
        let mut header = Vec::new();
        if output.match_kind {
            header.push(Cell::from("MATCH"));
        }
        header.push(Cell::from("PATH"));
        if output.print_url {
            header.push(Cell::from("URL"));
        }
        rows.push(header);
    }

    for m in matches {
        let mut row = Vec::new();
        if output.match_kind {
            let kind = m.kind.as_str();
            row.push(if output.color {
                Cell::styled(kind.cyan().to_string(), kind.len())
            } else {
                Cell::plain(kind)
            });
        }
        row.push(Cell::plain(m.path.clone()));
        if output.print_url {
            let url = m.url.clone().unwrap_or_default();
            row.push(if output.hyperlinks && !url.is_empty() {
                Cell::styled(hyperlink(&url), url.chars().count())
            } else {
                Cell::plain(url)
            });
        }
        rows.push(row);
    }

    align(&rows)
}
