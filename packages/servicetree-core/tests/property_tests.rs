use proptest::prelude::*;
use servicetree_core::{leaf_ids, path, MemoryStore, Node, NodeSpec, TreeStore};

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9-]{1,8}"
}

proptest! {
    #[test]
    fn generated_segments_are_valid(seg in segment()) {
        prop_assert!(path::is_valid_segment(&seg));
    }

    #[test]
    fn joined_paths_decompose_property(segments in prop::collection::vec(segment(), 1..6)) {
        let mut full = segments[0].clone();
        for seg in &segments[1..] {
            full = path::join(&full, seg);
        }

        prop_assert_eq!(path::leaf_name(&full), segments.last().unwrap().as_str());

        let prefixes = path::proper_prefixes(&full);
        prop_assert_eq!(prefixes.len(), segments.len() - 1);
        for prefix in &prefixes {
            prop_assert!(path::is_prefix_of(prefix, &full));
            prop_assert!(!path::is_prefix_of(&full, prefix));
        }

        match path::parent_of(&full) {
            Some(parent) => prop_assert_eq!(Some(&parent), prefixes.last()),
            None => prop_assert_eq!(segments.len(), 1),
        }
    }

    #[test]
    fn leaf_closure_matches_prefix_scan(
        ops in prop::collection::vec((any::<prop::sample::Index>(), segment(), any::<bool>()), 1..20)
    ) {
        let mut store = MemoryStore::new();
        let root = store.create_root("root", "").unwrap();
        let mut parents: Vec<Node> = vec![root];

        for (pick, name, leaf) in ops {
            let parent = pick.get(&parents).clone();
            // Duplicate sibling names conflict; that path is covered elsewhere.
            if let Ok(node) = store.create_child(&parent, &NodeSpec::new(name, leaf)) {
                if !node.leaf {
                    parents.push(node);
                }
            }
        }

        let all = store.query_path("", usize::MAX).unwrap();
        for node in &all {
            let mut expected: Vec<_> = all
                .iter()
                .filter(|n| n.leaf && path::is_prefix_of(&node.path, &n.path))
                .map(|n| n.id)
                .collect();
            expected.sort();
            prop_assert_eq!(leaf_ids(&store, node).unwrap(), expected);
        }
    }
}
