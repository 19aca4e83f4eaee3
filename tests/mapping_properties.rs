// tests/mapping_properties.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use globmirror::pattern::Pattern;

// Relative source paths: 1..4 components of short lowercase names, ending in
// a `.txt` file.
fn rel_path_strategy() -> impl Strategy<Value = String> {
    (
        proptest::collection::vec("[a-z]{1,4}", 0..3),
        "[a-z]{1,6}",
    )
        .prop_map(|(dirs, file)| {
            let mut parts = dirs;
            parts.push(format!("{file}.txt"));
            parts.join("/")
        })
}

proptest! {
    #[test]
    fn distinct_sources_map_to_distinct_destinations(
        rels in proptest::collection::hash_set(rel_path_strategy(), 1..20),
    ) {
        let pattern = Pattern::new("/project/src/**/*.txt", false, &[]).unwrap();
        let dest_root = Path::new("/project/out");

        let mut seen = HashSet::new();
        for rel in &rels {
            let source = pattern.base().join(rel);
            let dest = pattern.map_to(dest_root, &source);
            prop_assert!(dest.starts_with(dest_root));
            prop_assert!(seen.insert(dest));
        }
    }

    #[test]
    fn mapping_preserves_relative_path(rel in rel_path_strategy()) {
        let pattern = Pattern::new("/project/src/**/*.txt", false, &[]).unwrap();
        let source = pattern.base().join(&rel);

        let dest = pattern.map_to(Path::new("/elsewhere"), &source);

        prop_assert_eq!(dest, PathBuf::from("/elsewhere").join(&rel));
    }
}
