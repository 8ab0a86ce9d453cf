//! Reader for the parts of a module definition file the resolver needs:
//! the module directive, its deprecation notice and `retract` directives.
//!
//! Parsing is lenient. Malformed directives are skipped rather than
//! failing the whole file, since the origin already validated it.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::Retraction;
use crate::version;

static DEPRECATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(?:^|\n\n)Deprecated: *(.*?)(?:$|\n\n)").expect("deprecation pattern")
});

/// Directives extracted from a module definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModFile {
    pub module_path: Option<String>,
    pub deprecation: Option<String>,
    pub retractions: Vec<Retraction>,
}

struct Block {
    verb: String,
    comments: Vec<String>,
}

/// Parses `contents`. Never fails; unknown or malformed lines are ignored.
pub fn parse(contents: &str) -> ModFile {
    let mut file = ModFile::default();
    // Comment lines directly above the current line.
    let mut pending: Vec<String> = Vec::new();
    let mut block: Option<Block> = None;

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() {
            pending.clear();
            continue;
        }

        let (code, suffix) = split_comment(line);
        if code.is_empty() {
            pending.push(suffix.unwrap_or_default());
            continue;
        }

        if let Some(b) = &block {
            if code == ")" {
                block = None;
            } else if b.verb == "retract" {
                let rationale = rationale(&pending, suffix.as_deref(), &b.comments);
                if let Some(r) = parse_retract_args(code, rationale) {
                    file.retractions.push(r);
                }
            }
            pending.clear();
            continue;
        }

        let (verb, args) = match code.split_once(char::is_whitespace) {
            Some((verb, args)) => (verb, args.trim()),
            None => (code, ""),
        };

        match verb {
            "module" => {
                file.module_path = Some(unquote(args).to_string());
                let mut comments = pending.clone();
                comments.extend(suffix);
                file.deprecation = parse_deprecation(&comments.join("\n"));
            }
            "retract" if args == "(" => {
                let mut comments = pending.clone();
                comments.extend(suffix);
                block = Some(Block {
                    verb: verb.to_string(),
                    comments,
                });
            }
            "retract" => {
                let rationale = rationale(&pending, suffix.as_deref(), &[]);
                if let Some(r) = parse_retract_args(args, rationale) {
                    file.retractions.push(r);
                }
            }
            _ if args == "(" => {
                block = Some(Block {
                    verb: verb.to_string(),
                    comments: Vec::new(),
                });
            }
            _ => {}
        }
        pending.clear();
    }

    file
}

/// Extracts the text after `Deprecated:` in a comment paragraph.
pub fn parse_deprecation(comment: &str) -> Option<String> {
    DEPRECATED
        .captures(comment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn split_comment(line: &str) -> (&str, Option<String>) {
    match line.find("//") {
        Some(idx) => (
            line[..idx].trim(),
            Some(line[idx + 2..].trim().to_string()),
        ),
        None => (line, None),
    }
}

fn rationale(before: &[String], suffix: Option<&str>, block: &[String]) -> String {
    let mut lines: Vec<&str> = before.iter().map(String::as_str).collect();
    lines.extend(suffix);
    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        block.join("\n").trim().to_string()
    } else {
        text
    }
}

fn parse_retract_args(args: &str, rationale: String) -> Option<Retraction> {
    let args = args.trim();
    if let Some(inner) = args.strip_prefix('[').and_then(|a| a.strip_suffix(']')) {
        let (low, high) = inner.split_once(',')?;
        let (low, high) = (unquote(low.trim()), unquote(high.trim()));
        if !version::is_valid(low) || !version::is_valid(high) {
            return None;
        }
        return Some(Retraction {
            low: low.to_string(),
            high: high.to_string(),
            rationale,
        });
    }

    let v = unquote(args);
    version::is_valid(v).then(|| Retraction::single(v, rationale))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
