//! Indented tree backend.

use crate::render::RenderOptions;
use crate::store::{Node, SecretLeaf, Tree};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// Draw `tree` below a root line showing `label`.
pub fn render(label: &str, tree: &Tree, options: &RenderOptions) -> String {
    let mut out = format!("{}\n", label);
    draw_dir(tree, "", options, &mut out);
    out
}

fn draw_dir(tree: &Tree, indent: &str, options: &RenderOptions, out: &mut String) {
    let entries = tree.sorted();
    let count = entries.len();
    for (i, (key, node)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { LAST_BRANCH } else { BRANCH };
        let child_indent = format!("{}{}", indent, if last { SPACE } else { PIPE });

        match node {
            Node::Dir(sub) => {
                out.push_str(&format!("{}{}{}\n", indent, branch, key));
                draw_dir(sub, &child_indent, options, out);
            }
            Node::Leaf(leaf) => {
                out.push_str(&format!("{}{}{}\n", indent, branch, leaf_label(key, leaf, options)));
                draw_leaf(leaf, &child_indent, options, out);
            }
        }
    }
}

fn leaf_label(key: &str, leaf: &SecretLeaf, options: &RenderOptions) -> String {
    let mut label = String::new();
    if options.show_version {
        if let Some(version) = leaf.version {
            label.push_str(&format!("v{}: ", version));
        }
    }
    label.push_str(key);
    if options.show_metadata && !leaf.custom_metadata.is_empty() {
        let pairs: Vec<String> =
            leaf.custom_metadata.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        label.push_str(&format!(" [{}]", pairs.join(" ")));
    }
    label
}

fn draw_leaf(leaf: &SecretLeaf, indent: &str, options: &RenderOptions, out: &mut String) {
    if options.only_paths {
        return;
    }
    let count = leaf.data.len();
    for (i, (key, value)) in leaf.data.iter().enumerate() {
        let branch = if i + 1 == count { LAST_BRANCH } else { BRANCH };
        if options.only_keys {
            out.push_str(&format!("{}{}{}\n", indent, branch, key));
        } else {
            out.push_str(&format!("{}{}{}={}\n", indent, branch, key, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::mask_values;

    fn sample() -> Tree {
        let mut app = Tree::new();
        app.insert_leaf("db", SecretLeaf::from_pairs([("user", "admin")]).with_version(3));
        let mut tree = Tree::new();
        tree.insert_dir("app/", app);
        tree.insert_leaf(
            "secret",
            SecretLeaf::from_pairs([("key", "value"), ("user", "password")])
                .with_metadata("owner", "ops")
                .with_metadata("team", "a"),
        );
        tree
    }

    #[test]
    fn test_render_masked() {
        let options = RenderOptions::default();
        let out = render("root/", &mask_values(&sample(), 12), &options);
        assert_eq!(
            out,
            "root/\n\
             ├── app/\n\
             │   └── db\n\
             │       └── user=*****\n\
             └── secret\n    \
             ├── key=*****\n    \
             └── user=********\n"
        );
    }

    #[test]
    fn test_render_version_and_metadata() {
        let options =
            RenderOptions { show_version: true, show_metadata: true, ..RenderOptions::default() };
        let out = render("kv/", &sample(), &options);
        assert!(out.contains("│   └── v3: db\n"));
        assert!(out.contains("└── secret [owner=ops team=a]\n"));
    }

    #[test]
    fn test_render_only_keys_and_paths() {
        let keys = RenderOptions { only_keys: true, ..RenderOptions::default() };
        let out = render("kv/", &sample(), &keys);
        assert!(out.contains("├── key\n"));
        assert!(!out.contains('='));

        let paths = RenderOptions { only_paths: true, ..RenderOptions::default() };
        let out = render("kv/", &sample(), &paths);
        assert_eq!(out, "kv/\n├── app/\n│   └── db\n└── secret\n");
    }

    #[test]
    fn test_render_empty_tree() {
        assert_eq!(render("kv/", &Tree::new(), &RenderOptions::default()), "kv/\n");
    }
}
