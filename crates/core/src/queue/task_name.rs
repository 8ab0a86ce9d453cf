//! Deterministic task names for the external task service.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use sha2::{Digest, Sha256};

/// Longest readable prefix kept in a task name.
const MAX_READABLE_LEN: usize = 400;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("task name pattern"));

/// Names the task for `module_path@version`.
///
/// The same inputs always give the same name, so the task service can
/// reject duplicates. The name is a sanitized, truncated copy of the input
/// for humans followed by a hash of the exact input, which keeps distinct
/// inputs that sanitize identically apart. A non-empty `suffix` asks for a
/// distinct task; it is appended sanitized and is covered by the hash.
pub fn task_name(module_path: &str, version: &str, suffix: Option<&str>) -> String {
    let id = format!("{module_path}@{version}");
    let suffix = suffix.filter(|s| !s.is_empty());
    let mut readable = UNSAFE_CHARS.replace_all(&id, "_").into_owned();
    // Only ASCII survives sanitizing, so byte truncation is safe.
    readable.truncate(MAX_READABLE_LEN);

    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    if let Some(suffix) = suffix {
        // NUL cannot occur in a module path, so it separates unambiguously.
        hasher.update([0u8]);
        hasher.update(suffix.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    let mut name = format!("{readable}-{}", &digest[..16]);

    if let Some(suffix) = suffix {
        name.push('-');
        name.push_str(&UNSAFE_CHARS.replace_all(suffix, "_"));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_stable() {
        let a = task_name("github.com/foo/bar", "v1.2.3", None);
        let b = task_name("github.com/foo/bar", "v1.2.3", None);
        assert_eq!(a, b);
        assert!(a.starts_with("github_com_foo_bar_v1_2_3-"));
    }

    #[test]
    fn test_sanitized_lookalikes_differ() {
        let a = task_name("github.com/foo/bar", "v1.0.0", None);
        let b = task_name("github.com/foo_bar", "v1.0.0", None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_suffix() {
        let plain = task_name("example.com/mod", "v1.0.0", None);
        let forced = task_name("example.com/mod", "v1.0.0", Some("reprocess-2024"));
        assert_ne!(plain, forced);
        assert!(forced.starts_with("example_com_mod_v1_0_0-"));
        assert!(forced.ends_with("-reprocess-2024"));
        assert_eq!(task_name("example.com/mod", "v1.0.0", Some("")), plain);
    }

    #[test]
    fn test_suffixes_that_sanitize_alike_differ() {
        let spaced = task_name("example.com/mod", "v1.0.0", Some("a b"));
        let underscored = task_name("example.com/mod", "v1.0.0", Some("a_b"));
        assert_ne!(spaced, underscored);
        assert_eq!(spaced, task_name("example.com/mod", "v1.0.0", Some("a b")));
    }

    #[test]
    fn test_long_paths_are_truncated() {
        let long = format!("example.com/{}", "a".repeat(1000));
        let name = task_name(&long, "v1.0.0", None);
        assert!(name.len() <= MAX_READABLE_LEN + 17);
        assert!(name.starts_with("example_com_aaaa"));
    }

    #[test]
    fn test_only_safe_characters() {
        let name = task_name("gopkg.in/yaml.v3", "v3.0.0+incompatible", Some("a b"));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_no_collisions_across_random_pairs() {
        let mut names = HashSet::new();
        for _ in 0..10_000 {
            let path = format!("example.com/{}", uuid::Uuid::new_v4());
            let version = format!("v0.0.0-{}", uuid::Uuid::new_v4().simple());
            let name = task_name(&path, &version, None);
            assert!(name.contains(&path.replace(['.', '/'], "_")[..20]));
            assert!(names.insert(name));
        }
    }
}
