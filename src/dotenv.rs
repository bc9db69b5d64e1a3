//! Reading and rewriting `.env` files.
//!
//! Parsing goes through `dotenvy` and never exports into the process
//! environment. Rewriting keeps unrelated lines untouched and quotes values so
//! that the parser reads back exactly what was written.

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_.]*)\s*=").expect("valid assignment pattern")
});

static VALID_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid key pattern"));

/// Parse `.env` content.
///
/// `${VAR}` and `$VAR` resolve through the process environment first, then
/// through keys defined earlier in the content. Lines that do not parse are
/// skipped with a warning.
pub fn parse(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        match item {
            Ok((key, value)) => {
                values.insert(key, value);
            }
            Err(err) => warn!(error = %err, "Skipping unparsable .env line"),
        }
    }
    values
}

/// Whether `key` can be written as a `.env` variable name.
pub fn is_valid_key(key: &str) -> bool {
    VALID_KEY.is_match(key)
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./:,@+%~".contains(c)
}

/// Render a value for the right-hand side of `KEY=VALUE`.
///
/// Plain values are written bare. Anything else is single-quoted, which
/// keeps `$` and `\` literal, unless the value holds a quote or a line
/// break; those are double-quoted with `\`, `"` and `$` escaped.
pub fn format_value(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_bare_char) {
        return value.to_string();
    }
    if !value.contains(['\'', '\n']) {
        return format!("'{}'", value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn assigned_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }
    Some(ASSIGNMENT.captures(line)?.get(1)?.as_str())
}

/// Apply changes to `.env` content, keeping unrelated lines untouched.
///
/// `Some(value)` replaces the first line assigning the key or appends a new
/// line; `None` removes every line assigning the key.
pub fn rewrite(content: &str, changes: &[(String, Option<String>)]) -> String {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    for (key, value) in changes {
        let assigns = |line: &String| assigned_key(line) == Some(key.as_str());
        match value {
            Some(value) => {
                let new_line = format!("{}={}", key, format_value(value));
                match lines.iter().position(assigns) {
                    Some(index) => lines[index] = new_line,
                    None => lines.push(new_line),
                }
            }
            None => lines.retain(|line| !assigns(line)),
        }
    }

    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
