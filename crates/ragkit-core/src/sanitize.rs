//! Storage key sanitization
//!
//! Vector stores only accept a restricted id alphabet, while document ids
//! come straight from file names.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ASCII_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").expect("valid regex"));
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"));
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

/// Reduce an arbitrary string to `[a-zA-Z0-9_-]*`.
///
/// Runs of non-ASCII characters become one underscore, any other character
/// outside the alphabet becomes an underscore, underscore runs collapse and
/// the result is trimmed of underscores. May return an empty string.
pub fn sanitize_id(input: &str) -> String {
    let ascii_only = NON_ASCII_RUN.replace_all(input, "_");
    let clean = DISALLOWED.replace_all(&ascii_only, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&clean, "_");
    collapsed.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mixed_name() {
        assert_eq!(sanitize_id("Lv.50 Pokémon!"), "Lv_50_Pok_mon");
    }

    #[test]
    fn test_non_ascii_run_is_single_underscore() {
        assert_eq!(sanitize_id("a日本語b"), "a_b");
        assert_eq!(sanitize_id("포켓몬 도감"), "");
    }

    #[test]
    fn test_keeps_allowed_characters() {
        assert_eq!(sanitize_id("gen-1_kanto"), "gen-1_kanto");
        assert_eq!(sanitize_id("--edge--"), "--edge--");
    }

    #[test]
    fn test_trims_and_collapses() {
        assert_eq!(sanitize_id("__a  b__"), "a_b");
        assert_eq!(sanitize_id("  spaced out  "), "spaced_out");
    }

    #[test]
    fn test_no_valid_characters() {
        assert_eq!(sanitize_id(""), "");
        assert_eq!(sanitize_id("!!!"), "");
        assert_eq!(sanitize_id("___"), "");
    }

    proptest! {
        #[test]
        fn sanitized_ids_are_storage_safe(input in "\\PC*") {
            let id = sanitize_id(&input);
            prop_assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
            prop_assert!(!id.contains("__"));
            prop_assert!(!id.starts_with('_'));
            prop_assert!(!id.ends_with('_'));
        }

        #[test]
        fn sanitizing_is_idempotent(input in "\\PC*") {
            let once = sanitize_id(&input);
            prop_assert_eq!(sanitize_id(&once), once);
        }
    }
}
