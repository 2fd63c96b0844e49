//! # Path Codec
//!
//! Maps certificate subject names to store paths by reversing their DNS
//! labels, so that `www.example.com` lives at `/com/example/www` and every
//! certificate for a domain sits underneath that domain's subtree.

use crate::errors::{KnoxError, Result};

/// Replacement token for `*` in subject names.
pub const WILDCARD_TOKEN: &str = "wildcard";

/// Root of every store hierarchy.
pub const ROOT_PATH: &str = "/";

/// Stateless name/path conversions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathCodec;

impl PathCodec {
    /// Canonicalizes a subject name.
    ///
    /// Every `*` becomes `wildcard`. Surrounding whitespace and a trailing
    /// root dot are removed. This never fails; structural checks happen in
    /// [`PathCodec::derive`].
    pub fn valid_name(name: &str) -> String {
        let trimmed = name.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        trimmed.replace('*', WILDCARD_TOKEN)
    }

    /// Derives the store path for a subject name.
    ///
    /// ```
    /// use knox::certificate::PathCodec;
    ///
    /// assert_eq!(PathCodec::derive("www.example.com").unwrap(), "/com/example/www");
    /// assert_eq!(PathCodec::derive("*.example.com").unwrap(), "/com/example/wildcard");
    /// ```
    pub fn derive(common_name: &str) -> Result<String> {
        let name = Self::valid_name(common_name);
        if name.is_empty() {
            return Err(KnoxError::invalid_subject_name(common_name, "name is empty"));
        }

        let labels: Vec<&str> = name.split('.').collect();
        for label in &labels {
            if label.is_empty() {
                return Err(KnoxError::invalid_subject_name(common_name, "name contains an empty label"));
            }
            if label.contains('/') {
                return Err(KnoxError::invalid_subject_name(
                    common_name,
                    format!("label '{}' contains '/'", label),
                ));
            }
        }

        let reversed: Vec<&str> = labels.into_iter().rev().collect();
        Ok(format!("/{}", reversed.join("/")))
    }

    /// Recovers a subject name from a derived path.
    ///
    /// Only meaningful for paths derived from well-formed DNS names; stores
    /// persist the name next to the certificate and never depend on this.
    pub fn reverse(path: &str) -> Result<String> {
        let trimmed = path.strip_prefix('/').ok_or_else(|| {
            KnoxError::invalid_subject_name(path, "path must start with '/'")
        })?;
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(KnoxError::invalid_subject_name(path, "path has no labels"));
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(KnoxError::invalid_subject_name(path, "path contains an empty segment"));
        }

        Ok(segments.into_iter().rev().collect::<Vec<_>>().join("."))
    }

    /// Path under which to start a search for `pattern`.
    ///
    /// `*` or an empty pattern searches the whole store. Otherwise a leading
    /// `*.` or trailing `/*` is dropped and the remainder is derived, so
    /// `*.example.com` searches `/com/example`.
    pub fn search_root(pattern: &str) -> Result<String> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" || pattern == ROOT_PATH {
            return Ok(ROOT_PATH.to_string());
        }

        if let Some(rest) = pattern.strip_prefix('/') {
            let rest = rest.strip_suffix("/*").unwrap_or(rest);
            let rest = rest.strip_suffix('/').unwrap_or(rest);
            if rest.is_empty() || rest == "*" {
                return Ok(ROOT_PATH.to_string());
            }
            for segment in rest.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(KnoxError::invalid_subject_name(
                        pattern,
                        format!("path segment '{}' is not allowed", segment),
                    ));
                }
            }
            return Ok(format!("/{}", rest));
        }

        let name = pattern.strip_prefix("*.").unwrap_or(pattern);
        Self::derive(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_reverses_labels() {
        assert_eq!(PathCodec::derive("www.example.com").unwrap(), "/com/example/www");
        assert_eq!(PathCodec::derive("example.com").unwrap(), "/com/example");
        assert_eq!(PathCodec::derive("www.8x8.com").unwrap(), "/com/8x8/www");
        assert_eq!(PathCodec::derive("localhost").unwrap(), "/localhost");
    }

    #[test]
    fn test_valid_name_replaces_wildcards() {
        assert_eq!(PathCodec::valid_name("*.example.com"), "wildcard.example.com");
        assert_eq!(PathCodec::valid_name("  www.example.com. "), "www.example.com");
        assert_eq!(PathCodec::derive("*.example.com").unwrap(), "/com/example/wildcard");
    }

    #[test]
    fn test_derive_rejects_malformed_names() {
        for name in ["", "   ", "a..b", ".example.com", "example..", "a/b.com"] {
            let err = PathCodec::derive(name).unwrap_err();
            assert!(
                matches!(err, KnoxError::InvalidSubjectName { .. }),
                "expected InvalidSubjectName for {:?}, got {:?}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_reverse() {
        assert_eq!(PathCodec::reverse("/com/example/www").unwrap(), "www.example.com");
        assert_eq!(PathCodec::reverse("/com/example/").unwrap(), "example.com");
        assert!(PathCodec::reverse("com/example").is_err());
        assert!(PathCodec::reverse("/").is_err());
        assert!(PathCodec::reverse("/com//www").is_err());
    }

    #[test]
    fn test_search_root() {
        assert_eq!(PathCodec::search_root("*").unwrap(), "/");
        assert_eq!(PathCodec::search_root("").unwrap(), "/");
        assert_eq!(PathCodec::search_root("*.example.com").unwrap(), "/com/example");
        assert_eq!(PathCodec::search_root("www.example.com").unwrap(), "/com/example/www");
        assert_eq!(PathCodec::search_root("/com/example/*").unwrap(), "/com/example");
    }

    #[test]
    fn test_search_root_rejects_relative_segments() {
        for pattern in ["/../outside", "/com/../..", "/com/./example", "/com//example", "/com/example/../../*"] {
            let err = PathCodec::search_root(pattern).unwrap_err();
            assert!(matches!(err, KnoxError::InvalidSubjectName { .. }), "{}", pattern);
        }
        assert_eq!(PathCodec::search_root("/com/example/").unwrap(), "/com/example");
        assert_eq!(PathCodec::search_root("/*").unwrap(), "/");
    }

    proptest! {
        #[test]
        fn prop_derive_then_reverse_is_identity(
            labels in proptest::collection::vec("[a-z0-9][a-z0-9-]{0,12}", 1..6)
        ) {
            let name = labels.join(".");
            let path = PathCodec::derive(&name).unwrap();

            prop_assert!(path.starts_with('/'));
            prop_assert!(!path.contains('.'));
            prop_assert_eq!(path.matches('/').count(), labels.len());
            prop_assert_eq!(PathCodec::reverse(&path).unwrap(), name);
        }

        #[test]
        fn prop_child_paths_nest_under_parent(
            parent in proptest::collection::vec("[a-z]{1,8}", 1..4),
            child in "[a-z]{1,8}"
        ) {
            let parent_name = parent.join(".");
            let child_name = format!("{}.{}", child, parent_name);

            let parent_path = PathCodec::derive(&parent_name).unwrap();
            let child_path = PathCodec::derive(&child_name).unwrap();
            let parent_prefix = format!("{}/", parent_path);
            prop_assert!(child_path.starts_with(&parent_prefix));
        }
    }
}
