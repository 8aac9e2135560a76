//! Proposal service errors

use crate::identity::RegistryError;
use crate::store::{ChangeRequestState, ProposalId, StoreError};
use thiserror::Error;

/// Which store interaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateBranch,
    PutFile,
    OpenChangeRequest,
    ReadProposal,
    ListOpen,
    ReadEntries,
    AppendVote,
    AppendComment,
    Merge,
    Close,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::CreateBranch => "branch creation",
            Step::PutFile => "proposal file commit",
            Step::OpenChangeRequest => "opening the change-request",
            Step::ReadProposal => "reading the proposal",
            Step::ListOpen => "listing open proposals",
            Step::ReadEntries => "reading entries",
            Step::AppendVote => "recording the vote",
            Step::AppendComment => "recording the comment",
            Step::Merge => "merging",
            Step::Close => "closing without merge",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Signature is not registered")]
    UnknownSignature,

    #[error("Signature belongs to {name}, whose status is {status} (not ACTIVE)")]
    InactiveSignature { name: String, status: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid submission: {0}")]
    Invalid(String),

    #[error("Proposal #{id} is {state}, not open")]
    NotOpen {
        id: ProposalId,
        state: ChangeRequestState,
    },

    #[error("{step} failed for {target}: {source}")]
    Store {
        step: Step,
        /// `proposal #N`, or the branch for steps before a number exists
        target: String,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    pub fn store(step: Step, id: ProposalId) -> impl FnOnce(StoreError) -> ServiceError {
        move |source| ServiceError::Store {
            step,
            target: format!("proposal #{}", id),
            source,
        }
    }

    pub fn store_for(step: Step, target: &str) -> impl FnOnce(StoreError) -> ServiceError + '_ {
        move |source| ServiceError::Store {
            step,
            target: target.to_string(),
            source,
        }
    }
}
