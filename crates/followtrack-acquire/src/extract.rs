//! Pure extraction helpers that turn markup, script bodies or JSON into a
//! follower count.
//!
//! Every helper takes an ordered candidate list and returns the first
//! candidate that both matches and parses. Order encodes confidence, so
//! callers list their most structured candidates first.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

/// Compile an ordered pattern list. Patterns are static literals.
///
/// # Panics
///
/// Panics if a pattern is not a valid regex.
#[must_use]
pub fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// Parse a captured count, stripping thousands separators.
///
/// Only plain digit runs are accepted; abbreviated forms such as `1.2K`
/// are rejected.
#[must_use]
pub fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Return the count captured by the first pattern that matches `text` and
/// whose first capture group parses.
///
/// Only the first match of each pattern is considered. A match that does not
/// parse moves on to the next pattern, not to the next match.
#[must_use]
pub fn first_count(text: &str, patterns: &[Regex]) -> Option<u64> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse_count(m.as_str()))
    })
}

/// A way to reach a count inside a JSON object: a flat key, or a dotted path
/// resolved one key at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    Key(String),
    Path(Vec<String>),
}

impl Accessor {
    /// `"followers"` becomes a flat key, `"data.user.count"` a path.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        if spec.contains('.') {
            Accessor::Path(spec.split('.').map(str::to_string).collect())
        } else {
            Accessor::Key(spec.to_string())
        }
    }

    /// Resolve against `value`. A missing key, a step into a non-object, or a
    /// final value that is not a count all resolve to `None`.
    #[must_use]
    pub fn resolve(&self, value: &Value) -> Option<u64> {
        let leaf = match self {
            Accessor::Key(key) => value.get(key)?,
            Accessor::Path(keys) => keys
                .iter()
                .try_fold(value, |current, key| current.as_object()?.get(key))?,
        };
        scalar_count(leaf)
    }
}

/// Try each accessor in order and return the first resolved count.
#[must_use]
pub fn extract_by_accessors(value: &Value, accessors: &[Accessor]) -> Option<u64> {
    accessors.iter().find_map(|a| a.resolve(value))
}

/// Depth-first search for the first key in `keys` whose value is a count, or
/// an object exposing a numeric `count` field.
///
/// Objects are walked in key declaration order and arrays in index order. A
/// matching key whose value is unusable is still descended into.
#[must_use]
pub fn deep_find_count(value: &Value, keys: &[&str]) -> Option<u64> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            if keys.contains(&key.as_str()) {
                if let Some(n) = child.as_u64() {
                    return Some(n);
                }
                if let Some(n) = child.get("count").and_then(Value::as_u64) {
                    return Some(n);
                }
            }
            deep_find_count(child, keys)
        }),
        Value::Array(items) => items.iter().find_map(|item| deep_find_count(item, keys)),
        _ => None,
    }
}

/// Bodies of the `<script>` elements of `html` that contain `needle`.
#[must_use]
pub fn script_bodies(html: &str, needle: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .filter(|body| body.contains(needle))
        .collect()
}

/// Scan the text of elements matching each selector, in order, for a count
/// next to `keyword`.
///
/// The first element whose lowercased text contains `keyword` and whose
/// first `number` capture parses wins. Selectors that fail to parse are
/// skipped.
#[must_use]
pub fn element_text_count(
    html: &str,
    selectors: &[&str],
    keyword: &str,
    number: &Regex,
) -> Option<u64> {
    let document = Html::parse_document(html);
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document.select(&selector).find_map(|el| {
                let text = el.text().collect::<Vec<_>>().join(" ");
                if !text.to_lowercase().contains(keyword) {
                    return None;
                }
                number
                    .captures(&text)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| parse_count(m.as_str()))
            })
        })
}

fn scalar_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_thousands_separators() {
        let patterns = compile(&[r"(\d{1,3}(?:,\d{3})+|\d+)\s+followers"]);
        assert_eq!(first_count("12,345 followers", &patterns), Some(12_345));
        assert_eq!(first_count("1,234,567 followers", &patterns), Some(1_234_567));
        assert_eq!(first_count("987 followers", &patterns), Some(987));
    }

    #[test]
    fn no_digits_is_not_found() {
        let patterns = compile(&[r"([\d,]+)\s+followers", r"(\w+)\s+followers"]);
        assert_eq!(first_count("abc followers", &patterns), None);
    }

    #[test]
    fn second_pattern_wins_when_first_does_not_match() {
        let patterns = compile(&[r#""followerCount":(\d+)"#, r"(\d+,?\d*)\s+followers"]);
        assert_eq!(first_count("<span>8,100 followers</span>", &patterns), Some(8_100));
    }

    #[test]
    fn first_matching_pattern_wins_over_later_ones() {
        let patterns = compile(&[r#""followerCount":(\d+)"#, r"(\d+,?\d*)\s+followers"]);
        let text = r#"{"followerCount":999} and 12 followers"#;
        assert_eq!(first_count(text, &patterns), Some(999));
    }

    #[test]
    fn unparsable_capture_moves_to_next_pattern_not_next_match() {
        // First pattern matches "1.2K" first; its later "500" match is never used.
        let patterns = compile(&[r"([\w.]+) followers", r"count=(\d+)"]);
        let text = "1.2K followers, 500 followers, count=77";
        assert_eq!(first_count(text, &patterns), Some(77));
    }

    #[test]
    fn abbreviated_counts_are_rejected() {
        assert_eq!(parse_count("1.2K"), None);
        assert_eq!(parse_count("+12"), None);
        assert_eq!(parse_count(" 1,024 "), Some(1_024));
    }

    #[test]
    fn accessors_try_next_candidate_on_missing_or_invalid() {
        let value = json!({
            "user_followers": null,
            "followers": "n/a",
            "data": {"user": {"edge_followed_by": {"count": 4321}}}
        });
        let accessors: Vec<Accessor> = [
            "user_followers",
            "followers",
            "follower_count",
            "data.user.edge_followed_by.count",
        ]
        .iter()
        .map(|s| Accessor::parse(s))
        .collect();
        assert_eq!(extract_by_accessors(&value, &accessors), Some(4_321));
    }

    #[test]
    fn path_through_scalar_is_soft_failure() {
        let value = json!({"data": 5});
        assert_eq!(Accessor::parse("data.user.count").resolve(&value), None);
    }

    #[test]
    fn numeric_strings_resolve() {
        let value = json!({"followers": "12,000"});
        assert_eq!(Accessor::parse("followers").resolve(&value), Some(12_000));
    }

    #[test]
    fn deep_find_returns_first_in_declaration_order() {
        let value = json!({
            "a": {"b": [{"x": 1}, {"follower_count": 10}]},
            "follower_count": 20
        });
        assert_eq!(deep_find_count(&value, &["follower_count"]), Some(10));
    }

    #[test]
    fn deep_find_reads_nested_count_object() {
        let value = json!({"graphql": {"user": {"edge_followed_by": {"count": 77}}}});
        assert_eq!(
            deep_find_count(&value, &["follower_count", "edge_followed_by"]),
            Some(77)
        );
    }

    #[test]
    fn deep_find_descends_into_unusable_match() {
        let value = json!({"edge_followed_by": {"inner": {"follower_count": 3}}});
        assert_eq!(
            deep_find_count(&value, &["follower_count", "edge_followed_by"]),
            Some(3)
        );
    }

    #[test]
    fn deep_find_none_for_scalars() {
        assert_eq!(deep_find_count(&json!(42), &["follower_count"]), None);
    }

    #[test]
    fn script_bodies_filter_on_needle() {
        let html = r#"<html><head>
            <script>var a = 1;</script>
            <script>{"followerCount":314}</script>
        </head></html>"#;
        let bodies = script_bodies(html, "followerCount");
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("314"));
    }

    #[test]
    fn element_text_requires_keyword() {
        let html = r#"<ul class="bullets">
            <li>500+ connections</li>
            <li>12,400 followers</li>
        </ul>"#;
        let number = Regex::new(r"(\d+[,\.]?\d*)").unwrap();
        let count = element_text_count(html, &["ul.bullets li"], "follower", &number);
        assert_eq!(count, Some(12_400));
    }
}
