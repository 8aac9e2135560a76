//! Read-only route handlers

use crate::error::{validation_error, ApiResult};
use crate::identity::IdentityLookup;
use crate::models::SuccessResponse;
use crate::proposal::{ProposalDetail, ProposalSummary};
use crate::state::SharedState;
use crate::store::ProposalId;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

/// List all open proposals
pub async fn list_proposals(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<ProposalSummary>>>> {
    let proposals = state.proposal_service().list_open_proposals().await?;

    Ok(Json(SuccessResponse::with_data(
        format!("{} open proposal(s).", proposals.len()),
        proposals,
    )))
}

/// Proposal detail with a live tally
pub async fn get_proposal(
    State(state): State<SharedState>,
    Path(id): Path<ProposalId>,
) -> ApiResult<Json<SuccessResponse<ProposalDetail>>> {
    let detail = state
        .proposal_service()
        .fetch_proposal(id, Utc::now())
        .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Proposal #{} is {}.", id, detail.status),
        detail,
    )))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureRequest {
    #[validate(length(min = 1, message = "Signature is required"))]
    pub signature: String,
}

/// Resolve a signature against the identity registry
pub async fn verify_signature(
    State(state): State<SharedState>,
    Json(payload): Json<VerifySignatureRequest>,
) -> ApiResult<Json<SuccessResponse<IdentityLookup>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let lookup = state
        .proposal_service()
        .resolve_identity(&payload.signature)
        .await?;
    debug!(?lookup, "Signature lookup");

    let message = match &lookup {
        IdentityLookup::Active { name } => format!("Signature belongs to {}.", name),
        IdentityLookup::Inactive { name, .. } => format!("Signature belongs to {}, who is not active.", name),
        IdentityLookup::NotFound => "Signature is not registered.".to_string(),
    };
    Ok(Json(SuccessResponse::with_data(message, lookup)))
}
