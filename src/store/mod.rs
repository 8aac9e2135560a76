//! Change-request store
//!
//! The hosted change-request object is the system of record for a proposal:
//! its title/body/branch, its open/merged/closed flag, and an ordered list of
//! timestamped entries (votes, comments, the tally). This module only moves
//! data in and out of the host; all voting rules live elsewhere.

mod github;
mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Store-assigned proposal (change-request) number
pub type ProposalId = u64;

/// Store-assigned entry identifier, only used to address an entry for update
pub type EntryId = u64;

/// Lifecycle flag kept authoritative by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeRequestState {
    Open,
    Merged,
    Closed,
}

impl ChangeRequestState {
    pub fn is_open(self) -> bool {
        self == ChangeRequestState::Open
    }
}

impl fmt::Display for ChangeRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeRequestState::Open => write!(f, "open"),
            ChangeRequestState::Merged => write!(f, "merged"),
            ChangeRequestState::Closed => write!(f, "closed"),
        }
    }
}

/// A proposal record as the host reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub id: ProposalId,
    pub title: String,
    pub body: String,
    /// Source branch the proposal file lives on
    pub branch: String,
    pub state: ChangeRequestState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A timestamped note attached to a proposal record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Failure talking to the change-request host
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{operation} returned HTTP {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} response could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Raw HTTP status, when the host answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            StoreError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

/// Primitive operations the proposal workflow needs from the host.
///
/// Implementations carry no business logic and never panic on host
/// failures: every non-success answer becomes a [`StoreError`].
#[async_trait]
pub trait ChangeRequestStore: Send + Sync {
    /// Create `branch` pointing at the current head of `from`
    async fn create_branch(&self, branch: &str, from: &str) -> Result<(), StoreError>;

    /// Commit a file with `content` to `branch`
    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Open a change-request from `head` into `base`
    async fn open_change_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<ChangeRequest, StoreError>;

    /// All change-requests that are still open
    async fn list_open(&self) -> Result<Vec<ChangeRequest>, StoreError>;

    async fn get(&self, id: ProposalId) -> Result<ChangeRequest, StoreError>;

    /// Entries in store order (oldest first)
    async fn list_entries(&self, id: ProposalId) -> Result<Vec<Entry>, StoreError>;

    async fn append_entry(&self, id: ProposalId, body: &str) -> Result<Entry, StoreError>;

    /// Overwrite the full body of an existing entry
    async fn update_entry(
        &self,
        id: ProposalId,
        entry_id: EntryId,
        body: &str,
    ) -> Result<Entry, StoreError>;

    async fn merge(&self, id: ProposalId, commit_title: &str) -> Result<(), StoreError>;

    async fn close_without_merge(&self, id: ProposalId) -> Result<(), StoreError>;
}
