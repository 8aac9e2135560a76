//! Text markers carried inside entry bodies
//!
//! The store only supports editing an entry's body, so entry roles and the
//! superseded flag are encoded as text. Keep every encoding in this file.

/// First line of the tally entry
pub const TALLY_HEADER: &str = "### 🗳️ Vote Tally";

/// Appended to a vote that a newer vote from the same signer replaced
pub const SUPERSEDED_MARKER: &str = "~~SUPERSEDED~~";

/// First line of a vote that replaces an earlier one
pub const UPDATED_MARKER: &str = "**UPDATED**";

/// First line of a discussion comment
pub const COMMENT_HEADER: &str = "💬 **Comment**";

/// Prefix of the line naming the signer of a vote
pub const SIGNED_BY_PREFIX: &str = "signed-by:";

pub fn is_tally(body: &str) -> bool {
    body.trim_start().starts_with(TALLY_HEADER)
}

pub fn is_comment(body: &str) -> bool {
    body.trim_start().starts_with(COMMENT_HEADER)
}

pub fn is_superseded(body: &str) -> bool {
    body.contains(SUPERSEDED_MARKER)
}

/// Body with the superseded marker appended; unchanged if already marked
pub fn mark_superseded(body: &str) -> String {
    if is_superseded(body) {
        return body.to_string();
    }
    format!("{}\n\n{}", body.trim_end(), SUPERSEDED_MARKER)
}
