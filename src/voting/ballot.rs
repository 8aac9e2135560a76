//! Reading and writing individual vote entries

use super::markers::{SIGNED_BY_PREFIX, UPDATED_MARKER};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static CHOICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(yes|no)\b").expect("valid choice pattern"));

static SIGNER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i){}[ \t]*(\S+)", regex::escape(SIGNED_BY_PREFIX)))
        .expect("valid signer pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Choice {
    Yes,
    No,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Yes => write!(f, "YES"),
            Choice::No => write!(f, "NO"),
        }
    }
}

/// First standalone YES or NO in `text`, case-insensitive
pub fn parse_choice(text: &str) -> Option<Choice> {
    let found = CHOICE_RE.captures(text)?.get(1)?.as_str();
    if found.eq_ignore_ascii_case("yes") {
        Some(Choice::Yes)
    } else {
        Some(Choice::No)
    }
}

/// Token following the first `signed-by:` in `text`
pub fn extract_signer(text: &str) -> Option<&str> {
    SIGNER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Body of a new vote entry. The declared choice comes first so it is what
/// [`parse_choice`] finds, whatever the free text says.
pub fn render_vote(
    choice: Choice,
    voter: &str,
    signer: &str,
    text: &str,
    resubmission: bool,
) -> String {
    let mut body = String::new();
    if resubmission {
        body.push_str(UPDATED_MARKER);
        body.push('\n');
    }
    body.push_str(&format!("**Vote:** {}\n", choice));
    body.push_str(&format!("**Voter:** {}\n", voter));
    body.push_str(&format!("{} {}\n\n", SIGNED_BY_PREFIX, signer.trim()));
    body.push_str(text);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_choice_wins() {
        assert_eq!(parse_choice("I say yes, not no"), Some(Choice::Yes));
        assert_eq!(parse_choice("NO. Definitely not YES."), Some(Choice::No));
    }

    #[test]
    fn test_choice_must_be_standalone() {
        assert_eq!(parse_choice("eyes on the nominee"), None);
        assert_eq!(parse_choice("yesterday"), None);
        assert_eq!(parse_choice("(Yes)"), Some(Choice::Yes));
    }

    #[test]
    fn test_extract_signer() {
        assert_eq!(extract_signer("hello\nsigned-by: abc+/=\nmore"), Some("abc+/="));
        assert_eq!(extract_signer("Signed-By:\txyz"), Some("xyz"));
        assert_eq!(extract_signer("signed-by:\nabc"), None);
        assert_eq!(extract_signer("no signer here"), None);
    }

    #[test]
    fn test_rendered_vote_reads_back() {
        let body = render_vote(Choice::No, "Nora Yes", " sig-1 ", "no wait, yes!", true);
        assert!(body.starts_with(UPDATED_MARKER));
        assert_eq!(parse_choice(&body), Some(Choice::No));
        assert_eq!(extract_signer(&body), Some("sig-1"));
    }

    #[test]
    fn test_vote_text_is_kept_verbatim() {
        let text = "  I vote YES on #4\n\n";
        let body = render_vote(Choice::Yes, "Alice", "sig-1", text, false);
        assert!(body.ends_with(text));
    }
}
