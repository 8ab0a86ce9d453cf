//! Structural validity checks for module paths.

use thiserror::Error;

/// Why a path was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("malformed path {path:?}: {reason}")]
    Malformed { path: String, reason: &'static str },

    #[error("invalid element {element:?} in {path:?}: {reason}")]
    InvalidElement {
        path: String,
        element: String,
        reason: &'static str,
    },
}

/// Device names that cannot appear as a path element on some filesystems.
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Checks the shape of a slash-separated path without looking at which
/// characters its elements use.
pub fn check_path_syntax(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let malformed = |reason| {
        Err(PathError::Malformed {
            path: path.to_string(),
            reason,
        })
    };
    if path.starts_with('/') {
        return malformed("leading slash");
    }
    if path.ends_with('/') {
        return malformed("trailing slash");
    }
    if path.chars().any(char::is_whitespace) {
        return malformed("contains whitespace");
    }
    for element in path.split('/') {
        match element {
            "" => return malformed("empty path element"),
            "." | ".." => return malformed("relative path element"),
            _ => {}
        }
    }
    Ok(())
}

/// Checks that `path` could be a module path: a dotted lower-case host
/// followed by elements from the allowed alphabet, not ending in a reserved
/// major-version suffix (`/v0`, `/v1`, or a number with a leading zero).
pub fn check_module_path(path: &str) -> Result<(), PathError> {
    check_path_syntax(path)?;

    let mut elements = path.split('/');
    let host = elements.next().unwrap_or_default();
    check_host(path, host)?;

    let rest: Vec<&str> = elements.collect();
    for element in &rest {
        check_element(path, element)?;
    }

    if let Some(last) = rest.last() {
        if let Some(digits) = last.strip_prefix('v') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                let reserved =
                    digits == "0" || digits == "1" || (digits.len() > 1 && digits.starts_with('0'));
                if reserved {
                    return Err(invalid(path, last, "reserved major version suffix"));
                }
            }
        }
    }

    Ok(())
}

fn check_host(path: &str, host: &str) -> Result<(), PathError> {
    if !host.contains('.') {
        return Err(invalid(path, host, "host has no dot"));
    }
    if host.starts_with('-') || host.starts_with('.') || host.ends_with('.') {
        return Err(invalid(path, host, "host has a leading or trailing separator"));
    }
    if !host
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return Err(invalid(path, host, "host has a disallowed character"));
    }
    Ok(())
}

fn check_element(path: &str, element: &str) -> Result<(), PathError> {
    if !element
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    {
        return Err(invalid(path, element, "disallowed character"));
    }
    if element.starts_with('.') || element.ends_with('.') {
        return Err(invalid(path, element, "leading or trailing dot"));
    }
    let stem = element.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.contains(&stem.to_ascii_lowercase().as_str()) {
        return Err(invalid(path, element, "reserved file name"));
    }
    Ok(())
}

fn invalid(path: &str, element: &str, reason: &'static str) -> PathError {
    PathError::InvalidElement {
        path: path.to_string(),
        element: element.to_string(),
        reason,
    }
}
