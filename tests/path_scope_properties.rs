//! Property-based tests for path scoping
//!
//! These tests verify invariants that should hold for all inputs:
//! - Every descendant of a root lies within it
//! - A sibling whose name merely extends the root's last segment does not
//! - Exclusion always wins over inclusion
//! - Relativized in-root paths rejoin to the original path

use impactcov::{path_within, relativize_paths, PathScope};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn absolute_path(max_depth: usize) -> impl Strategy<Value = PathBuf> {
    prop::collection::vec(segment(), 1..=max_depth)
        .prop_map(|segments| Path::new("/").join(segments.join("/")))
}

fn relative_path(max_depth: usize) -> impl Strategy<Value = PathBuf> {
    prop::collection::vec(segment(), 1..=max_depth).prop_map(|segments| segments.iter().collect())
}

proptest! {
    #[test]
    fn prop_descendants_are_within_root(root in absolute_path(4), rest in relative_path(4)) {
        prop_assert!(path_within(&root.join(&rest), &root));
        prop_assert!(path_within(&root, &root));
    }

    #[test]
    fn prop_name_extension_is_not_within(root in absolute_path(4), suffix in "[a-z0-9_]{1,6}") {
        let sibling = PathBuf::from(format!("{}{}", root.display(), suffix));
        prop_assert!(!path_within(&sibling, &root));
        prop_assert!(!path_within(&sibling.join("file.rb"), &root));
    }

    #[test]
    fn prop_trailing_separator_is_irrelevant(root in absolute_path(4), rest in relative_path(3)) {
        let with_slash = PathBuf::from(format!("{}/", root.display()));
        let path = root.join(&rest);
        prop_assert_eq!(path_within(&path, &root), path_within(&path, &with_slash));
    }

    #[test]
    fn prop_excluded_paths_are_never_included(
        root in absolute_path(3),
        excluded in relative_path(2),
        rest in relative_path(3),
    ) {
        let scope = PathScope::new(&root, Some(excluded.as_path())).unwrap();
        prop_assert!(!scope.includes(&root.join(&excluded).join(&rest)));
        prop_assert!(!scope.includes(&root.join(&excluded)));
    }

    #[test]
    fn prop_relativize_rejoins(root in absolute_path(3), rest in relative_path(3)) {
        let path = root.join(&rest);
        let relative = relativize_paths(vec![path.clone()], &root);
        prop_assert_eq!(relative.len(), 1);
        let only = relative.into_iter().next().unwrap();
        prop_assert!(only.is_relative());
        prop_assert_eq!(root.join(only), path);
    }
}

#[test]
fn test_application_is_not_within_app() {
    assert!(!path_within(Path::new("/application"), Path::new("/app")));
    assert!(!path_within(Path::new("/application/models/user.rb"), Path::new("/app")));
    assert!(path_within(Path::new("/app/models/user.rb"), Path::new("/app")));
}

#[test]
fn test_outside_paths_stay_absolute() {
    let relative = relativize_paths(
        vec![PathBuf::from("/elsewhere/lib.rb"), PathBuf::from("/app")],
        Path::new("/app"),
    );
    assert!(relative.contains(Path::new("/elsewhere/lib.rb")));
    assert!(relative.contains(Path::new("/app")));
}
