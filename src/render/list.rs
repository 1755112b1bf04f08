//! Renderers for engine and namespace listings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::{Result, VkvError};
use crate::projection::compile_pattern;
use crate::store::{EngineMap, NamespaceMap};
use crate::utils::join_namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    #[default]
    Base,
    Yaml,
    Json,
}

impl FromStr for ListFormat {
    type Err = VkvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(VkvError::bad_input(format!(
                "unsupported format '{}', use one of: base, yaml, json",
                other
            ))),
        }
    }
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Yaml => "yaml",
            Self::Json => "json",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub format: ListFormat,
    /// Prefix every name with its full namespace path.
    pub include_prefix: bool,
    /// Cover every namespace below the root, not only the root itself.
    pub all: bool,
    /// Keep only names matching this pattern.
    pub regex: Option<String>,
}

/// Render engines found below namespace `root`.
///
/// Without `all` only the root namespace's engines are shown. With `all`
/// and no prefix, structured formats keep the namespace grouping.
pub fn render_engines(engines: &EngineMap, root: &str, options: &ListOptions) -> Result<String> {
    let pattern = options.regex.as_deref().map(compile_pattern).transpose()?;
    let keep = |name: &str| pattern.as_ref().map_or(true, |re| re.is_match(name));

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (namespace, names) in engines {
        if !options.all && !namespace.is_empty() {
            continue;
        }
        let full_ns = join_namespace(root, namespace);
        let shown: Vec<String> = names
            .iter()
            .filter(|name| keep(name.as_str()))
            .map(|name| {
                if options.include_prefix && !full_ns.is_empty() {
                    format!("{}/{}", full_ns, name)
                } else {
                    name.clone()
                }
            })
            .collect();
        grouped.insert(full_ns, shown);
    }

    if options.all && !options.include_prefix && options.format != ListFormat::Base {
        return serialize(&grouped, options.format);
    }
    let mut flat: Vec<String> = grouped.into_values().flatten().collect();
    flat.sort();
    render_names(&flat, options.format)
}

/// Render namespaces found below `root`.
///
/// Without `all` only the direct children of the root are shown; with it,
/// every descendant by its path relative to the root.
pub fn render_namespaces(
    namespaces: &NamespaceMap,
    root: &str,
    options: &ListOptions,
) -> Result<String> {
    let pattern = options.regex.as_deref().map(compile_pattern).transpose()?;
    let keep = |name: &str| pattern.as_ref().map_or(true, |re| re.is_match(name));

    let candidates: Vec<String> = if options.all {
        namespaces.keys().filter(|ns| !ns.is_empty()).cloned().collect()
    } else {
        namespaces.get("").cloned().unwrap_or_default()
    };

    let mut shown: Vec<String> = candidates
        .into_iter()
        .filter(|name| keep(name.as_str()))
        .map(|name| if options.include_prefix { join_namespace(root, &name) } else { name })
        .collect();
    shown.sort();
    render_names(&shown, options.format)
}

/// Render a plain list of names.
pub fn render_names(names: &[String], format: ListFormat) -> Result<String> {
    match format {
        ListFormat::Base => Ok(names.iter().map(|n| format!("{}\n", n)).collect()),
        other => serialize(&names, other),
    }
}

fn serialize<T: Serialize + ?Sized>(value: &T, format: ListFormat) -> Result<String> {
    match format {
        ListFormat::Json => serde_json::to_string_pretty(value)
            .map(|json| format!("{}\n", json))
            .map_err(|e| VkvError::internal(format!("failed to serialize JSON: {}", e))),
        _ => serde_yaml::to_string(value)
            .map_err(|e| VkvError::internal(format!("failed to serialize YAML: {}", e))),
    }
}
