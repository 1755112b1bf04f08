//! Shell `export` backend.

use std::collections::BTreeMap;

use crate::projection::flatten;
use crate::render::RenderOptions;
use crate::store::Tree;
use crate::utils::sort_paths;

/// Quote a value for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Turn an arbitrary key into a valid variable name.
pub fn variable_name(raw: &str) -> String {
    raw.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

/// One `export NAME='value'` line per key. Later paths overwrite earlier
/// ones that produce the same name; lines are sorted by name.
pub fn render(base: &str, tree: &Tree, options: &RenderOptions) -> String {
    let flat = flatten(tree);
    let mut paths: Vec<String> = flat.keys().cloned().collect();
    sort_paths(&mut paths);

    let mut variables = BTreeMap::new();
    for path in paths {
        let Some(leaf) = flat.get(&path) else { continue };
        for (key, value) in &leaf.data {
            let mut name = if options.export_include_path {
                format!("{}{}_{}", base, path, key).replace('/', "_")
            } else {
                key.clone()
            };
            if options.export_upper {
                name = name.to_uppercase();
            }
            variables.insert(variable_name(&name), value.to_string());
        }
    }

    variables
        .into_iter()
        .map(|(name, value)| format!("export {}={}\n", name, shell_quote(&value)))
        .collect()
}
