//! Proposal service
//!
//! Orchestrates the proposal lifecycle over a [`ChangeRequestStore`]:
//!
//! - `Draft` exists only inside [`ProposalService::create_proposal`]
//! - `Open` while the change-request is open and accepting votes
//! - `Merged` / `Closed` once [`ProposalService::close_voting`] resolves it
//!
//! State is never stored here. Reads of the store are fatal to the current
//! operation; secondary writes (seed tally, supersede marks, tally refresh,
//! closing summary) are logged and do not fail an operation whose primary
//! effect already happened.

use super::error::{ServiceError, Step};
use super::format;
use super::models::{LiveTally, Outcome, ProposalDetail, ProposalSummary, Resolution, VoteReceipt};
use super::slug::slugify;
use crate::config::VotingConfig;
use crate::identity::{IdentityLookup, IdentityRegistry};
use crate::store::{ChangeRequest, ChangeRequestStore, Entry, EntryId, ProposalId, StoreError};
use crate::voting::markers::mark_superseded;
use crate::voting::{ballot, find_tally_entry, latest_live_vote, tabulate, Choice, Tally};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ProposalService {
    store: Arc<dyn ChangeRequestStore>,
    identities: Arc<dyn IdentityRegistry>,
    config: VotingConfig,
    /// Pause between store-mutating calls
    pause: std::time::Duration,
}

impl ProposalService {
    pub fn new(
        store: Arc<dyn ChangeRequestStore>,
        identities: Arc<dyn IdentityRegistry>,
        config: VotingConfig,
    ) -> Self {
        Self {
            store,
            identities,
            config,
            pause: std::time::Duration::ZERO,
        }
    }

    /// Space out store-mutating calls to stay under host rate limits
    pub fn with_pause(mut self, pause: std::time::Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    async fn pace(&self) {
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
    }

    /// Voting deadline of a proposal created at `created_at`
    pub fn deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(self.config.voting_window_days)
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    pub async fn resolve_identity(&self, signature: &str) -> Result<IdentityLookup, ServiceError> {
        Ok(self.identities.resolve(signature).await?)
    }

    /// Name of the ACTIVE member behind `signature`, or a distinct error for
    /// unknown and inactive signatures
    pub async fn require_member(&self, signature: &str) -> Result<String, ServiceError> {
        match self.resolve_identity(signature).await? {
            IdentityLookup::Active { name } => Ok(name),
            IdentityLookup::Inactive {
                name,
                recorded_status,
            } => {
                warn!(
                    member = %name,
                    status = %recorded_status,
                    "Rejected submission from inactive member"
                );
                Err(ServiceError::InactiveSignature {
                    name,
                    status: recorded_status,
                })
            }
            IdentityLookup::NotFound => {
                warn!("Rejected submission from unregistered signature");
                Err(ServiceError::UnknownSignature)
            }
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Create branch, commit the proposal file, open the change-request and
    /// seed a zero tally. Fails fast without cleanup; re-running with the
    /// same title fails at branch creation.
    pub async fn create_proposal(
        &self,
        title: &str,
        body: &str,
        author: &str,
    ) -> Result<ProposalId, ServiceError> {
        if title.trim().is_empty() {
            return Err(ServiceError::Invalid("Proposal title is required".to_string()));
        }
        if body.trim().is_empty() {
            return Err(ServiceError::Invalid("Proposal body is required".to_string()));
        }
        let slug = slugify(title.trim());
        if slug.is_empty() {
            return Err(ServiceError::Invalid(format!(
                "Title '{}' has no characters usable in a branch name",
                title.trim()
            )));
        }

        let branch = format!("{}{}", self.config.branch_prefix, slug);
        let path = format!("{}{}", slug, self.config.file_extension);
        let now = Utc::now();

        self.store
            .create_branch(&branch, &self.config.target_branch)
            .await
            .map_err(ServiceError::store_for(Step::CreateBranch, &branch))?;
        self.pace().await;

        let content =
            format::proposal_file(title, body, author, self.config.voting_window_days, now);
        self.store
            .put_file(&branch, &path, &content, &format!("Add proposal: {}", title))
            .await
            .map_err(ServiceError::store_for(Step::PutFile, &branch))?;
        self.pace().await;

        let request = self
            .store
            .open_change_request(&branch, &self.config.target_branch, title, body)
            .await
            .map_err(ServiceError::store_for(Step::OpenChangeRequest, &branch))?;
        self.pace().await;

        if let Err(e) = self
            .store
            .append_entry(request.id, &Tally::default().render(now, false))
            .await
        {
            warn!(proposal = request.id, error = %e, "Failed to seed tally entry");
        }

        info!(
            proposal = request.id,
            branch = %branch,
            author = %author,
            "📝 Proposal created: {}",
            title
        );
        Ok(request.id)
    }

    /// Record a vote, superseding the signer's previous live vote
    pub async fn submit_vote(
        &self,
        id: ProposalId,
        signature: &str,
        choice: Choice,
        text: &str,
    ) -> Result<VoteReceipt, ServiceError> {
        let signature = signature.trim();
        let voter = self.require_member(signature).await?;
        self.require_open(id).await?;

        let entries = self
            .store
            .list_entries(id)
            .await
            .map_err(ServiceError::store(Step::ReadEntries, id))?;

        let previous = latest_live_vote(&entries, signature).map(|e| (e.id, e.body.clone()));
        let resubmission = previous.is_some();
        if let Some((entry_id, body)) = previous {
            match self
                .store
                .update_entry(id, entry_id, &mark_superseded(&body))
                .await
            {
                Ok(_) => debug!(proposal = id, entry = entry_id, "Marked previous vote superseded"),
                Err(e) => warn!(
                    proposal = id,
                    entry = entry_id,
                    error = %e,
                    "Failed to mark previous vote superseded"
                ),
            }
            self.pace().await;
        }

        let body = ballot::render_vote(choice, &voter, signature, text, resubmission);
        self.store
            .append_entry(id, &body)
            .await
            .map_err(ServiceError::store(Step::AppendVote, id))?;
        self.pace().await;

        info!(
            proposal = id,
            voter = %voter,
            choice = %choice,
            resubmission,
            "🗳️ Vote recorded"
        );

        let tally = self.refresh_tally(id).await;
        Ok(VoteReceipt {
            proposal_id: id,
            choice,
            signature: signature.to_string(),
            voter,
            resubmission,
            tally,
        })
    }

    /// Append a discussion entry; never counted, no tally side effect
    pub async fn submit_comment(
        &self,
        id: ProposalId,
        text: &str,
        author: &str,
    ) -> Result<EntryId, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::Invalid("Comment text is required".to_string()));
        }
        self.require_open(id).await?;
        let entry = self
            .store
            .append_entry(id, &format::comment(text, author))
            .await
            .map_err(ServiceError::store(Step::AppendComment, id))?;
        info!(proposal = id, author = %author, "💬 Comment recorded");
        Ok(entry.id)
    }

    /// Tabulate, merge on a strict YES majority or close otherwise, then post
    /// the final tally and a summary. A failed merge/close returns before
    /// anything claims an outcome.
    pub async fn close_voting(&self, id: ProposalId) -> Result<Resolution, ServiceError> {
        let request = self.require_open(id).await?;
        let entries = self
            .store
            .list_entries(id)
            .await
            .map_err(ServiceError::store(Step::ReadEntries, id))?;
        let tally = tabulate(&entries);
        let outcome = Outcome::for_tally(&tally);

        match outcome {
            Outcome::Merged => self
                .store
                .merge(id, &format::merge_commit_title(id, &request.title))
                .await
                .map_err(ServiceError::store(Step::Merge, id))?,
            Outcome::Closed => self
                .store
                .close_without_merge(id)
                .await
                .map_err(ServiceError::store(Step::Close, id))?,
        }
        self.pace().await;

        let now = Utc::now();
        if let Err(e) = self.write_tally(id, &entries, &tally, now, true).await {
            warn!(proposal = id, error = %e, "Failed to write final tally");
        }
        self.pace().await;

        if let Err(e) = self
            .store
            .append_entry(id, &format::closure_summary(outcome, &tally, now))
            .await
        {
            warn!(proposal = id, error = %e, "Failed to post closing summary");
        }

        info!(
            proposal = id,
            yes = tally.yes,
            no = tally.no,
            outcome = %outcome,
            "🏁 Voting closed"
        );
        Ok(Resolution {
            proposal_id: id,
            outcome,
            tally,
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub async fn list_open_proposals(&self) -> Result<Vec<ProposalSummary>, ServiceError> {
        let open = self
            .store
            .list_open()
            .await
            .map_err(|source| ServiceError::Store {
                step: Step::ListOpen,
                target: "open proposals".to_string(),
                source,
            })?;
        Ok(open
            .into_iter()
            .filter(|request| self.is_proposal(request))
            .map(ProposalSummary::from)
            .collect())
    }

    /// Proposal with its status and a live tally as of `now`
    pub async fn fetch_proposal(
        &self,
        id: ProposalId,
        now: DateTime<Utc>,
    ) -> Result<ProposalDetail, ServiceError> {
        let request = self.require_proposal(id).await?;
        let entries = self
            .store
            .list_entries(id)
            .await
            .map_err(ServiceError::store(Step::ReadEntries, id))?;
        let deadline = self.deadline(request.created_at);
        let status = request.state;
        Ok(ProposalDetail {
            tally: LiveTally::new(tabulate(&entries), deadline, now),
            entry_count: entries.len(),
            deadline,
            status,
            summary: request.into(),
        })
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Only change-requests opened from a proposal branch are proposals
    fn is_proposal(&self, request: &ChangeRequest) -> bool {
        request.branch.starts_with(&self.config.branch_prefix)
    }

    /// The change-request behind `id`; any other change-request is reported
    /// as not found
    async fn require_proposal(&self, id: ProposalId) -> Result<ChangeRequest, ServiceError> {
        let request = self
            .store
            .get(id)
            .await
            .map_err(ServiceError::store(Step::ReadProposal, id))?;
        if !self.is_proposal(&request) {
            debug!(proposal = id, branch = %request.branch, "Change-request is not a proposal");
            let missing = StoreError::NotFound(format!("change-request #{} is not a proposal", id));
            return Err(ServiceError::store(Step::ReadProposal, id)(missing));
        }
        Ok(request)
    }

    async fn require_open(&self, id: ProposalId) -> Result<ChangeRequest, ServiceError> {
        let request = self.require_proposal(id).await?;
        if !request.state.is_open() {
            return Err(ServiceError::NotOpen {
                id,
                state: request.state,
            });
        }
        Ok(request)
    }

    /// Re-read entries and overwrite the tally entry; failures are logged
    async fn refresh_tally(&self, id: ProposalId) -> Option<Tally> {
        let entries = match self.store.list_entries(id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(proposal = id, error = %e, "Failed to re-read entries for tally");
                return None;
            }
        };
        let tally = tabulate(&entries);
        if let Err(e) = self
            .write_tally(id, &entries, &tally, Utc::now(), false)
            .await
        {
            warn!(proposal = id, error = %e, "Failed to update tally entry");
        }
        Some(tally)
    }

    /// Overwrite the tally entry, creating it if it went missing
    async fn write_tally(
        &self,
        id: ProposalId,
        entries: &[Entry],
        tally: &Tally,
        at: DateTime<Utc>,
        is_final: bool,
    ) -> Result<(), StoreError> {
        let body = tally.render(at, is_final);
        match find_tally_entry(entries) {
            Some(existing) => {
                self.store.update_entry(id, existing.id, &body).await?;
            }
            None => {
                debug!(proposal = id, "Tally entry missing, recreating it");
                self.store.append_entry(id, &body).await?;
            }
        }
        Ok(())
    }
}
