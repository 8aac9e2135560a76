//! Proposal data models
//!
//! Views of a proposal record returned by the service. Lifecycle state is
//! never stored here; it is copied from the store's own flag on every read.

use crate::store::{ChangeRequest, ChangeRequestState, ProposalId};
use crate::voting::{Choice, Tally};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of `list_open_proposals`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: ProposalId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub branch: String,
}

impl From<ChangeRequest> for ProposalSummary {
    fn from(request: ChangeRequest) -> Self {
        Self {
            id: request.id,
            title: request.title,
            body: request.body,
            created_at: request.created_at,
            updated_at: request.updated_at,
            branch: request.branch,
        }
    }
}

/// Tally as seen by readers, with the majority and time left to vote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTally {
    pub yes: u32,
    pub no: u32,
    pub total: u32,
    pub majority: Choice,
    /// Whole days until the voting deadline, never negative
    pub days_remaining: i64,
}

impl LiveTally {
    pub fn new(tally: Tally, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let left = deadline - now;
        let mut days = left.num_days();
        if left > chrono::Duration::days(days) {
            days += 1;
        }
        Self {
            yes: tally.yes,
            no: tally.no,
            total: tally.total,
            majority: tally.majority(),
            days_remaining: days.max(0),
        }
    }
}

/// Result of `fetch_proposal`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDetail {
    #[serde(flatten)]
    pub summary: ProposalSummary,
    pub status: ChangeRequestState,
    pub deadline: DateTime<Utc>,
    pub entry_count: usize,
    pub tally: LiveTally,
}

/// Result of a successful `submit_vote`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub proposal_id: ProposalId,
    pub choice: Choice,
    pub signature: String,
    pub voter: String,
    /// An earlier vote by the same signer was replaced
    pub resubmission: bool,
    pub tally: Option<Tally>,
}

/// How a proposal was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Merged,
    Closed,
}

impl Outcome {
    pub fn for_tally(tally: &Tally) -> Self {
        match tally.majority() {
            Choice::Yes => Outcome::Merged,
            Choice::No => Outcome::Closed,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Merged => write!(f, "merged"),
            Outcome::Closed => write!(f, "closed"),
        }
    }
}

/// Result of `close_voting`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub proposal_id: ProposalId,
    pub outcome: Outcome,
    pub tally: Tally,
}
