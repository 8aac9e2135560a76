//! Proposal module - the proposal lifecycle and voting state machine
//!
//! Creates proposals, records votes and comments, and resolves proposals by
//! merging or closing their change-request.

mod error;
mod format;
mod models;
mod service;
mod slug;

pub use error::{ServiceError, Step};
pub use models::*;
pub use service::ProposalService;
