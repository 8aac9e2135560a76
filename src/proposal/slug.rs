//! Branch/file-safe slugs derived from proposal titles

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid slug pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid slug pattern"));
static HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid slug pattern"));

/// Lowercase, drop anything outside `[a-z0-9 space -]`, turn whitespace runs
/// and hyphen runs into single hyphens, trim hyphens at both ends
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let kept = DISALLOWED.replace_all(&lower, "");
    let hyphenated = WHITESPACE.replace_all(&kept, "-");
    let collapsed = HYPHENS.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}
