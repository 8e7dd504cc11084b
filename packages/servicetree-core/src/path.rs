//! Materialized-path codec. Paths are dot-joined segment sequences
//! (`infra.db-01`); each segment is restricted to `[a-zA-Z0-9-]` so the dot
//! is unambiguous as a separator. All functions here are pure.

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// True iff `name` is a valid single path segment: non-empty and drawn from
/// `[a-zA-Z0-9-]`.
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Derive a child path from its parent's path and its own name.
pub fn join(parent_path: &str, name: &str) -> String {
    let mut path = String::with_capacity(parent_path.len() + 1 + name.len());
    path.push_str(parent_path);
    path.push(SEPARATOR);
    path.push_str(name);
    path
}

/// True iff `path` denotes `ancestor_path` itself or a node below it.
pub fn is_prefix_of(ancestor_path: &str, path: &str) -> bool {
    if path == ancestor_path {
        return true;
    }
    path.len() > ancestor_path.len()
        && path.starts_with(ancestor_path)
        && path.as_bytes()[ancestor_path.len()] == SEPARATOR as u8
}

/// The parent's path, or `None` if `path` is a root.
pub fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// The final segment of `path`.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit_once(SEPARATOR).map_or(path, |(_, name)| name)
}

/// Proper prefixes of `path` split at separator boundaries, shortest first
/// (root to immediate parent). A root path has none.
pub fn proper_prefixes(path: &str) -> Vec<&str> {
    path.char_indices()
        .filter(|&(_, c)| c == SEPARATOR)
        .map(|(i, _)| &path[..i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_charset() {
        assert!(is_valid_segment("db-01"));
        assert!(is_valid_segment("A9"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("a.b"));
        assert!(!is_valid_segment("a_b"));
        assert!(!is_valid_segment("观测"));
        assert!(!is_valid_segment("a b"));
    }

    #[test]
    fn join_appends_separator() {
        assert_eq!(join("infra", "db-01"), "infra.db-01");
        assert_eq!(join("infra.db-01", "r1"), "infra.db-01.r1");
    }

    #[test]
    fn prefix_requires_segment_boundary() {
        assert!(is_prefix_of("infra", "infra"));
        assert!(is_prefix_of("infra", "infra.db-01"));
        assert!(is_prefix_of("infra.db-01", "infra.db-01.r1"));
        // "infra-x" shares a string prefix but is a sibling, not a descendant.
        assert!(!is_prefix_of("infra", "infra-x"));
        assert!(!is_prefix_of("infra.db-01", "infra"));
    }

    #[test]
    fn parent_and_leaf_name() {
        assert_eq!(parent_of("infra"), None);
        assert_eq!(parent_of("infra.db-01"), Some("infra"));
        assert_eq!(leaf_name("infra"), "infra");
        assert_eq!(leaf_name("infra.db-01.r1"), "r1");
    }

    #[test]
    fn proper_prefixes_root_to_parent() {
        assert!(proper_prefixes("infra").is_empty());
        assert_eq!(proper_prefixes("infra.db-01.r1"), vec!["infra", "infra.db-01"]);
    }
}
