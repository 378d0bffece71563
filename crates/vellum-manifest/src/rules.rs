//! Lexical grammars shared by the validator.

use std::sync::OnceLock;

use regex::Regex;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static validation pattern"))
}

/// Lowercase/uppercase hex SHA-256 digest.
pub fn sha256_hex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^[a-fA-F0-9]{64}$")
}

/// Permissive MIME type grammar (`type/subtype` with RFC 6838 token
/// characters).
pub fn mime_type() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"^[a-zA-Z0-9][a-zA-Z0-9!#$&\-\^_]*/[a-zA-Z0-9][a-zA-Z0-9!#$&\-\^_.+]*$",
    )
}

/// Module names: leading letter, then letters, digits, underscore, dash.
pub fn module_name() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^[a-zA-Z][a-zA-Z0-9_-]*$")
}

/// Hostname grammar for trusted-domain entries.
pub fn domain() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$",
    )
}

/// ISO 639-1 two-letter language code.
pub fn language() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^[a-z]{2}$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_grammar() {
        assert!(sha256_hex().is_match(&"a".repeat(64)));
        assert!(sha256_hex().is_match(&"A0".repeat(32)));
        assert!(!sha256_hex().is_match(&"g".repeat(64)));
        assert!(!sha256_hex().is_match(&"a".repeat(63)));
    }

    #[test]
    fn mime_grammar() {
        assert!(mime_type().is_match("text/html"));
        assert!(mime_type().is_match("image/svg+xml"));
        assert!(!mime_type().is_match("nonsense"));
        assert!(!mime_type().is_match("/subtype"));
    }

    #[test]
    fn module_name_grammar() {
        assert!(module_name().is_match("chart_engine-2"));
        assert!(!module_name().is_match("2fast"));
        assert!(!module_name().is_match(""));
    }

    #[test]
    fn domain_grammar() {
        assert!(domain().is_match("cdn.example.org"));
        assert!(!domain().is_match("localhost"));
        assert!(!domain().is_match("-bad.example.com"));
    }
}
