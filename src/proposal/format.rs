//! Text written to the store on behalf of a proposal

use super::models::Outcome;
use crate::voting::markers::COMMENT_HEADER;
use crate::voting::Tally;
use chrono::{DateTime, Utc};

/// Committed proposal file: header, body, generation footer
pub fn proposal_file(
    title: &str,
    body: &str,
    author: &str,
    voting_window_days: i64,
    at: DateTime<Utc>,
) -> String {
    format!(
        "# {title}\n\n**Proposed by:** {author}\n**Voting window:** {voting_window_days} days\n\n---\n\n{body}\n\n---\n\n_Generated {generated}_\n",
        title = title.trim(),
        author = author,
        voting_window_days = voting_window_days,
        body = body.trim(),
        generated = at.to_rfc3339(),
    )
}

pub fn comment(text: &str, author: &str) -> String {
    format!("{}\n**From:** {}\n\n{}", COMMENT_HEADER, author, text)
}

/// Final human-readable entry posted after merge/close
pub fn closure_summary(outcome: Outcome, tally: &Tally, at: DateTime<Utc>) -> String {
    let headline = match outcome {
        Outcome::Merged => "✅ **Proposal accepted and merged.**",
        Outcome::Closed => "❌ **Proposal rejected and closed without merging.**",
    };
    format!(
        "{}\n\nFinal count: {} YES / {} NO ({} votes).\n\n_Voting closed {}_",
        headline,
        tally.yes,
        tally.no,
        tally.total,
        at.to_rfc3339()
    )
}

pub fn merge_commit_title(id: u64, title: &str) -> String {
    format!("Accept proposal #{}: {}", id, title.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::markers::is_comment;
    use crate::voting::{extract_signer, parse_choice};

    #[test]
    fn test_proposal_file_layout() {
        let at = Utc::now();
        let file = proposal_file(" Fund X ", "Spend 10 on X.\n", "Alice", 7, at);
        assert!(file.starts_with("# Fund X\n"));
        assert!(file.contains("**Proposed by:** Alice"));
        assert!(file.contains("Spend 10 on X."));
        assert!(file.contains(&at.to_rfc3339()));
    }

    #[test]
    fn test_comment_is_marked_and_never_reads_as_signed_vote_header() {
        let body = comment("yes, signed-by: mallory", "Bob");
        assert!(is_comment(&body));
        // The text itself still parses; only the comment marker keeps it out of the tally
        assert_eq!(parse_choice(&body).map(|c| c.to_string()).as_deref(), Some("YES"));
        assert_eq!(extract_signer(&body), Some("mallory"));
    }

    #[test]
    fn test_summary_mentions_outcome_and_counts() {
        let tally = Tally {
            yes: 2,
            no: 1,
            total: 3,
        };
        let text = closure_summary(Outcome::Merged, &tally, Utc::now());
        assert!(text.contains("merged"));
        assert!(text.contains("2 YES / 1 NO (3 votes)"));
    }
}
