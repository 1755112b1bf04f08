//! Capability matrix backend.

use std::collections::BTreeMap;

use owo_colors::OwoColorize;

use crate::projection::flatten;
use crate::render::table::{align, Cell};
use crate::store::{Capability, Tree};
use crate::utils::sort_paths;

pub const HEADER: [&str; 7] = ["PATH", "CREATE", "READ", "UPDATE", "DELETE", "LIST", "ROOT"];

const YES: &str = "✔";
const NO: &str = "✖";

fn symbol(allowed: bool, color: bool) -> Cell {
    match (allowed, color) {
        (true, true) => Cell::styled(YES.green().to_string(), 1),
        (false, true) => Cell::styled(NO.red().to_string(), 1),
        (true, false) => Cell::plain(YES),
        (false, false) => Cell::plain(NO),
    }
}

/// One row per leaf below `label`; the root itself when there are none.
/// Paths without a known capability render as all ✖.
pub fn render(
    label: &str,
    tree: &Tree,
    capabilities: &BTreeMap<String, Capability>,
    color: bool,
) -> String {
    let mut paths: Vec<String> = flatten(tree).keys().map(|p| format!("{}{}", label, p)).collect();
    if paths.is_empty() {
        paths.push(label.to_string());
    }
    sort_paths(&mut paths);

    let mut rows = vec![HEADER.iter().map(|h| Cell::from(*h)).collect::<Vec<_>>()];
    for path in paths {
        let capability = capabilities.get(&path).copied().unwrap_or_default();
        let mut row = vec![Cell::plain(path)];
        row.extend(capability.flags().iter().map(|flag| symbol(*flag, color)));
        rows.push(row);
    }
    align(&rows)
}
