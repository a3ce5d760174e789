//! Filter expression escaping
//!
//! Filters follow the portal grammar `field<op>"value"` joined with `,` (and)
//! or `|` (or). Only the literal between the quotes is percent-encoded; field
//! names, operators, quotes and joiners are sent as written.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Prefix some callers copy from raw URLs
const FILTER_PREFIX: &str = "?Filter=";

/// Operators recognised in front of a quoted literal. Two-character
/// operators come first so `!~` is not read as `~`.
const QUOTED_VALUE_PATTERN: &str = r#"(!:|!~|>:|<:|:|~|>|<)"([^"]*)""#;

fn quoted_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(QUOTED_VALUE_PATTERN).expect("quoted value pattern is valid"))
}

/// Whether the filter holds anything other than letters, digits and whitespace
pub fn needs_escaping(raw: &str) -> bool {
    raw.chars().any(|c| !(c.is_ascii_alphanumeric() || c.is_whitespace()))
}

/// Percent-encode every quoted literal in `raw`
///
/// A leading `?Filter=` is stripped. Input without a recognisable
/// `<op>"value"` segment is returned unchanged (minus the prefix).
pub fn escape_filter(raw: &str) -> String {
    let filter = raw.strip_prefix(FILTER_PREFIX).unwrap_or(raw);

    if !needs_escaping(filter) {
        return filter.to_string();
    }

    quoted_value_regex()
        .replace_all(filter, |caps: &Captures<'_>| {
            format!("{}\"{}\"", &caps[1], urlencoding::encode(&caps[2]))
        })
        .into_owned()
}
