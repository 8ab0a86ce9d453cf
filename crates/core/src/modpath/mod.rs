//! Module path helpers.
//!
//! Pure functions that work out where a module boundary may lie inside a
//! package path, and which major-version siblings belong to the same series.

mod check;

pub use check::{check_module_path, check_path_syntax, PathError};

/// Sentinel module path for the standard library.
pub const STDLIB_MODULE_PATH: &str = "std";

/// Sentinel for a package whose owning module has not been determined yet.
///
/// The fetch pipeline refuses to run with this path.
pub const UNKNOWN_MODULE_PATH: &str = "unknownModule";

/// Hosts where a repository is always `host/owner/repo`, so no module can
/// live at fewer than three path elements.
const MULTI_TENANT_HOSTS: &[&str] = &["github.com", "bitbucket.org", "gitlab.com"];

/// Returns the candidate module paths for a package path, longest first.
///
/// Each prefix is checked independently, so an invalid deep element only
/// removes the prefixes that contain it. A host on its own is never a
/// candidate. Structurally invalid input yields an empty list.
pub fn candidate_module_paths(full_path: &str) -> Vec<String> {
    if full_path == STDLIB_MODULE_PATH {
        return vec![STDLIB_MODULE_PATH.to_string()];
    }
    if check_path_syntax(full_path).is_err() {
        return Vec::new();
    }

    let elements: Vec<&str> = full_path.split('/').collect();
    let min_elements = if MULTI_TENANT_HOSTS.contains(&elements[0]) {
        3
    } else {
        2
    };

    (min_elements..=elements.len())
        .rev()
        .map(|n| elements[..n].join("/"))
        .filter(|candidate| check_module_path(candidate).is_ok())
        .collect()
}

/// Returns the series path of a module: the module path without its
/// major-version suffix (`/vN` with N >= 2, or `.vN` for gopkg.in).
pub fn series_path(module_path: &str) -> &str {
    if let Some(prefix) = module_path.strip_prefix("gopkg.in/") {
        if let Some(dot) = prefix.rfind(".v") {
            if is_major_number(&prefix[dot + 2..], true) {
                return &module_path[.."gopkg.in/".len() + dot];
            }
        }
        return module_path;
    }

    match module_path.rsplit_once('/') {
        Some((prefix, last)) => match last.strip_prefix('v') {
            Some(digits) if is_major_number(digits, false) => prefix,
            _ => module_path,
        },
        None => module_path,
    }
}

/// Reports whether `digits` is a major version usable as a path suffix.
/// gopkg.in accepts v0 and v1; plain paths only v2 and above.
fn is_major_number(digits: &str, allow_low: bool) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return false;
    }
    allow_low || !matches!(digits, "0" | "1")
}
