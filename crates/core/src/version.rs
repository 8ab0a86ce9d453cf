//! Module version helpers.
//!
//! Module versions are semantic versions with a mandatory `v` prefix
//! (`v1.2.3`, `v2.0.0-rc.1`). Anything else (`latest`, `master`, a short
//! `v1.2`) is an alias the origin resolves to a concrete version.

use std::cmp::Ordering;

use semver::Version;

/// The alias that asks the origin for the newest version of a module.
pub const LATEST: &str = "latest";

/// Branch aliases looked up on every fetch. Each may later point elsewhere.
pub const FLOATING_POINTERS: &[&str] = &["master", "main"];

/// Parses a `v`-prefixed semantic version.
pub fn parse(version: &str) -> Option<Version> {
    let rest = version.strip_prefix('v')?;
    Version::parse(rest).ok()
}

/// Reports whether `version` is a complete semantic version.
pub fn is_valid(version: &str) -> bool {
    parse(version).is_some()
}

/// Longest alias accepted in a fetch request.
const MAX_ALIAS_LEN: usize = 256;

/// Reports whether `version` could name something the origin resolves:
/// a semantic version, or an alias (a branch, a tag, `latest`) spelled the
/// way a ref name may be spelled.
pub fn is_plausible(version: &str) -> bool {
    if is_valid(version) {
        return true;
    }
    !version.is_empty()
        && version.len() <= MAX_ALIAS_LEN
        && !version.starts_with(['.', '/', '-'])
        && !version.ends_with(['.', '/'])
        && !version.contains("..")
        && !version.contains("//")
        && version.bytes().all(|b| {
            b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'/' | b'+' | b'~')
        })
}

/// Reports whether `version` carries a pre-release component.
pub fn is_prerelease(version: &str) -> bool {
    parse(version).is_some_and(|v| !v.pre.is_empty())
}

/// Semantic-version precedence, ignoring build metadata.
///
/// Invalid versions sort below every valid one and compare equal to each other.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| a.pre.cmp(&b.pre)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Reports whether `a` should be preferred over `b` as a module's latest
/// version: any release beats any pre-release, otherwise higher precedence
/// wins.
pub fn later(a: &str, b: &str) -> bool {
    match (is_prerelease(a), is_prerelease(b)) {
        (false, true) => is_valid(a),
        (true, false) => !is_valid(b),
        _ => compare(a, b) == Ordering::Greater,
    }
}

/// Picks the preferred version out of `versions`, skipping invalid ones.
pub fn latest_of<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter(|v| is_valid(v))
        .fold(None, |best, v| match best {
            Some(b) if !later(v, b) => Some(b),
            _ => Some(v),
        })
}

/// Sorts versions from most to least preferred.
pub fn sort_by_preference(versions: &mut [String]) {
    versions.sort_by(|a, b| {
        if later(a, b) {
            Ordering::Less
        } else if later(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
}
