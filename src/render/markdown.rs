//! Markdown table backend.
//!
//! The leftmost cells are merged: a path is written once, on the first row
//! of its keys.

use crate::projection::flatten;
use crate::render::RenderOptions;
use crate::store::Tree;
use crate::utils::sort_paths;

pub fn render(label: &str, tree: &Tree, options: &RenderOptions) -> String {
    let header: Vec<&str> = if options.only_paths {
        vec!["PATH"]
    } else if options.only_keys {
        vec!["PATH", "KEY"]
    } else {
        vec!["PATH", "KEY", "VALUE"]
    };

    let flat = flatten(tree);
    let mut paths: Vec<String> = flat.keys().cloned().collect();
    sort_paths(&mut paths);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for path in paths {
        let full = format!("{}{}", label, path);
        let Some(leaf) = flat.get(&path) else { continue };
        if options.only_paths || leaf.data.is_empty() {
            rows.push(pad_row(vec![full], header.len()));
            continue;
        }
        for (i, (key, value)) in leaf.data.iter().enumerate() {
            let path_cell = if i == 0 { full.clone() } else { String::new() };
            let row = if options.only_keys {
                vec![path_cell, key.clone()]
            } else {
                vec![path_cell, key.clone(), value.to_string()]
            };
            rows.push(row);
        }
    }

    table(&header, &rows)
}

fn pad_row(mut row: Vec<String>, len: usize) -> Vec<String> {
    row.resize(len, String::new());
    row
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count().max(3)).collect();
    let rows: Vec<Vec<String>> =
        rows.iter().map(|row| row.iter().map(|c| escape(c)).collect()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                format!("{}{}", cell, " ".repeat(width - cell.chars().count()))
            })
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };

    let mut out = line(header.iter().map(|h| h.to_string()).collect());
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretLeaf;

    fn sample() -> Tree {
        let mut tree = Tree::new();
        tree.insert_leaf("secret", SecretLeaf::from_pairs([("key", "value"), ("user", "pw")]));
        tree.insert_leaf("solo", SecretLeaf::from_pairs([("a", "b|c")]));
        tree
    }

    #[test]
    fn test_markdown_merges_path_cells() {
        let out = render("kv/", &sample(), &RenderOptions::default());
        assert_eq!(
            out,
            "| PATH      | KEY  | VALUE |\n\
             | --------- | ---- | ----- |\n\
             | kv/secret | key  | value |\n\
             |           | user | pw    |\n\
             | kv/solo   | a    | b\\|c  |\n"
        );
    }

    #[test]
    fn test_markdown_column_selection() {
        let keys = RenderOptions { only_keys: true, ..RenderOptions::default() };
        let out = render("kv/", &sample(), &keys);
        assert!(out.starts_with("| PATH      | KEY  |\n"));

        let paths = RenderOptions { only_paths: true, ..RenderOptions::default() };
        let out = render("kv/", &sample(), &paths);
        assert_eq!(out, "| PATH      |\n| --------- |\n| kv/secret |\n| kv/solo   |\n");
    }
}
