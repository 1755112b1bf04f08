//! Property tests for the tree projections.

use std::collections::BTreeMap;

use proptest::prelude::*;
use vkv::projection::{deep_merge, flatten, lookup, mask_value, regex_filter, unflatten};
use vkv::render::{OutputFormat, RenderOptions, Renderer};
use vkv::store::{FlatSecrets, SecretLeaf, SecretValue, Tree};

fn value() -> impl Strategy<Value = SecretValue> {
    prop_oneof![
        "[ -~]{0,24}".prop_map(SecretValue::from),
        any::<i64>().prop_map(SecretValue::from),
        any::<bool>().prop_map(SecretValue::from),
    ]
}

fn leaf() -> impl Strategy<Value = SecretLeaf> {
    prop::collection::btree_map("[a-z_]{1,6}", value(), 1..4).prop_map(SecretLeaf::new)
}

fn path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-d]{1,2}", 1..4).prop_map(|segments| segments.join("/"))
}

fn flat() -> impl Strategy<Value = FlatSecrets> {
    prop::collection::btree_map(path(), leaf(), 0..8)
        .prop_map(|map: BTreeMap<String, SecretLeaf>| map.into_iter().collect())
}

fn tree() -> impl Strategy<Value = Tree> {
    flat().prop_map(|flat| unflatten(&flat, ""))
}

proptest! {
    #[test]
    fn flatten_inverts_unflatten(flat in flat()) {
        prop_assert_eq!(flatten(&unflatten(&flat, "")), flat);
    }

    #[test]
    fn deep_merge_left_wins(a in tree(), b in tree()) {
        let merged = deep_merge(&a, &b);
        for (path, leaf) in flatten(&a) {
            prop_assert_eq!(lookup(&merged, &path), Some(&leaf));
        }
    }

    #[test]
    fn mask_respects_cap(v in value(), cap in 0i64..40) {
        let masked = mask_value(&v, cap);
        prop_assert!(masked.chars().count() as i64 <= cap);
        prop_assert!(masked.chars().all(|c| c == '*'));
        prop_assert_eq!(mask_value(&v, -1).chars().count(), v.to_string().chars().count());
    }

    #[test]
    fn regex_filter_is_matching_subset(
        names in prop::collection::vec("[a-z]{0,8}", 0..12),
        pattern in prop::sample::select(vec!["^a", "b$", "c+", "^$", "x|y", "."]),
    ) {
        let re = regex::Regex::new(pattern).unwrap();
        let kept = regex_filter(&names, pattern).unwrap();
        for name in &kept {
            prop_assert!(names.contains(name));
            prop_assert!(re.is_match(name));
        }
        prop_assert_eq!(kept.len(), names.iter().filter(|n| re.is_match(n)).count());
    }

    #[test]
    fn json_render_parses_back(tree in tree()) {
        let renderer = Renderer::new(RenderOptions::with_format(OutputFormat::Json)).unwrap();
        let rendered = renderer.render("kv", "", &tree).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let back = Tree::from_json(&parsed["kv/"]).unwrap();
        prop_assert_eq!(flatten(&back), flatten(&tree));
    }
}
