//! Signed command route handlers
//!
//! Every command carries the member's `digitalSignature`, the exact text the
//! member signed and a `requestSignature` over it. The signature is checked
//! before the registry or the store is touched.

use crate::error::{validation_error, ApiResult};
use crate::identity::verify_signed_text;
use crate::models::SuccessResponse;
use crate::proposal::{Resolution, VoteReceipt};
use crate::state::SharedState;
use crate::store::{EntryId, ProposalId};
use crate::voting::parse_choice;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

/// Verify the request signature, then require an ACTIVE member behind it
async fn authenticate(
    state: &SharedState,
    digital_signature: &str,
    signed_text: &str,
    request_signature: &str,
) -> ApiResult<String> {
    verify_signed_text(digital_signature, signed_text, request_signature)?;
    let member = state
        .proposal_service()
        .require_member(digital_signature)
        .await?;
    debug!(member = %member, "Command signature verified");
    Ok(member)
}

/// Whether `signed_text` names proposal `id` as `#<id>`
fn names_proposal(signed_text: &str, id: ProposalId) -> bool {
    let tag = format!("#{}", id);
    signed_text
        .match_indices(&tag)
        .any(|(at, _)| !signed_text[at + tag.len()..].starts_with(|c: char| c.is_ascii_digit()))
}

fn require_names_proposal(signed_text: &str, id: ProposalId) -> ApiResult<()> {
    if names_proposal(signed_text, id) {
        Ok(())
    } else {
        Err(validation_error(format!(
            "Signed text must name proposal #{}",
            id
        )))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,

    #[validate(length(min = 1, message = "Digital signature is required"))]
    pub digital_signature: String,

    /// Must contain the title
    #[validate(length(min = 1, message = "Signed text is required"))]
    pub signed_text: String,

    #[validate(length(min = 1, message = "Request signature is required"))]
    pub request_signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProposal {
    pub proposal_id: ProposalId,
    pub author: String,
}

pub async fn create_proposal(
    State(state): State<SharedState>,
    Json(payload): Json<CreateProposalRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<CreatedProposal>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    if !payload.signed_text.contains(payload.title.trim()) {
        return Err(validation_error("Signed text must contain the proposal title"));
    }

    let author = authenticate(
        &state,
        &payload.digital_signature,
        &payload.signed_text,
        &payload.request_signature,
    )
    .await?;

    let proposal_id = state
        .proposal_service()
        .create_proposal(&payload.title, &payload.body, &author)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Proposal #{} opened for voting.", proposal_id),
            CreatedProposal {
                proposal_id,
                author,
            },
        )),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    #[validate(length(min = 1, message = "Digital signature is required"))]
    pub digital_signature: String,

    /// Signed verbatim; the first standalone YES or NO is the choice
    #[validate(length(min = 1, message = "Vote text is required"))]
    pub vote_text: String,

    #[validate(length(min = 1, message = "Request signature is required"))]
    pub request_signature: String,
}

pub async fn submit_vote(
    State(state): State<SharedState>,
    Path(id): Path<ProposalId>,
    Json(payload): Json<SubmitVoteRequest>,
) -> ApiResult<Json<SuccessResponse<VoteReceipt>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    verify_signed_text(
        &payload.digital_signature,
        &payload.vote_text,
        &payload.request_signature,
    )?;

    let choice = parse_choice(&payload.vote_text)
        .ok_or_else(|| validation_error("Vote text must contain YES or NO"))?;

    let receipt = state
        .proposal_service()
        .submit_vote(id, &payload.digital_signature, choice, &payload.vote_text)
        .await?;

    let message = if receipt.resubmission {
        format!("Vote on proposal #{} updated to {}.", id, receipt.choice)
    } else {
        format!("Vote {} recorded on proposal #{}.", receipt.choice, id)
    };
    Ok(Json(SuccessResponse::with_data(message, receipt)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommentRequest {
    #[validate(length(min = 1, message = "Comment text is required"))]
    pub text: String,

    #[validate(length(min = 1, message = "Digital signature is required"))]
    pub digital_signature: String,

    /// Must contain the comment text and name the proposal as `#<id>`
    #[validate(length(min = 1, message = "Signed text is required"))]
    pub signed_text: String,

    #[validate(length(min = 1, message = "Request signature is required"))]
    pub request_signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedComment {
    pub proposal_id: ProposalId,
    pub entry_id: EntryId,
    pub author: String,
}

pub async fn submit_comment(
    State(state): State<SharedState>,
    Path(id): Path<ProposalId>,
    Json(payload): Json<SubmitCommentRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<RecordedComment>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    if !payload.signed_text.contains(payload.text.as_str()) {
        return Err(validation_error("Signed text must contain the comment"));
    }
    require_names_proposal(&payload.signed_text, id)?;

    let author = authenticate(
        &state,
        &payload.digital_signature,
        &payload.signed_text,
        &payload.request_signature,
    )
    .await?;

    let entry_id = state
        .proposal_service()
        .submit_comment(id, &payload.text, &author)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Comment added to proposal #{}.", id),
            RecordedComment {
                proposal_id: id,
                entry_id,
                author,
            },
        )),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CloseVotingRequest {
    #[validate(length(min = 1, message = "Digital signature is required"))]
    pub digital_signature: String,

    /// Must name the proposal as `#<id>`
    #[validate(length(min = 1, message = "Signed text is required"))]
    pub signed_text: String,

    #[validate(length(min = 1, message = "Request signature is required"))]
    pub request_signature: String,
}

/// Resolve a proposal now, ahead of its deadline
pub async fn close_voting(
    State(state): State<SharedState>,
    Path(id): Path<ProposalId>,
    Json(payload): Json<CloseVotingRequest>,
) -> ApiResult<Json<SuccessResponse<Resolution>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    require_names_proposal(&payload.signed_text, id)?;

    let member = authenticate(
        &state,
        &payload.digital_signature,
        &payload.signed_text,
        &payload.request_signature,
    )
    .await?;

    let resolution = state
        .proposal_service()
        .close_voting(id)
        .await?;
    info!(proposal = id, member = %member, "Proposal closed on request");

    Ok(Json(SuccessResponse::with_data(
        format!("Proposal #{} {}.", id, resolution.outcome),
        resolution,
    )))
}
