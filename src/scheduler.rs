//! Deadline sweep
//!
//! Walks every open proposal once per run: proposals still inside their voting
//! window are skipped, proposals past the deadline with fewer than
//! `minimum_votes` live votes stay open, and the rest are resolved through
//! [`ProposalService::close_voting`], the same path as a manual close.
//! Proposals are handled one at a time and a failure on one never stops the
//! run.

use crate::notify::Notifier;
use crate::proposal::{ProposalService, ProposalSummary, Resolution, ServiceError, Step};
use crate::store::{ChangeRequestStore, ProposalId};
use crate::voting::{tabulate, Tally};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A proposal the sweep could not finish
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub proposal_id: ProposalId,
    pub message: String,
}

/// What one sweep run did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub examined: usize,
    pub closed: Vec<Resolution>,
    pub not_due: usize,
    pub below_quorum: usize,
    pub errors: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            examined: 0,
            closed: Vec::new(),
            not_due: 0,
            below_quorum: 0,
            errors: Vec::new(),
        }
    }
}

enum Verdict {
    NotDue,
    BelowQuorum(Tally),
    Closed(Resolution),
}

pub struct Sweep {
    service: ProposalService,
    store: Arc<dyn ChangeRequestStore>,
    notifier: Option<Notifier>,
}

impl Sweep {
    pub fn new(
        service: ProposalService,
        store: Arc<dyn ChangeRequestStore>,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            service,
            store,
            notifier,
        }
    }

    /// Run one sweep as of `now`. Only the initial listing is fatal.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport, ServiceError> {
        let mut report = SweepReport::new(now);
        let open = self.service.list_open_proposals().await?;
        info!(run_id = %report.run_id, open = open.len(), "🧹 Sweep started");

        for proposal in &open {
            report.examined += 1;
            match self.examine(proposal, now).await {
                Ok(Verdict::NotDue) => report.not_due += 1,
                Ok(Verdict::BelowQuorum(tally)) => {
                    info!(
                        proposal = proposal.id,
                        votes = tally.total,
                        minimum = self.service.config().minimum_votes,
                        "Deadline passed below quorum, leaving open"
                    );
                    report.below_quorum += 1;
                }
                Ok(Verdict::Closed(resolution)) => report.closed.push(resolution),
                Err(e) => {
                    error!(proposal = proposal.id, error = %e, "Sweep failed for proposal");
                    report.errors.push(SweepFailure {
                        proposal_id: proposal.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %report.run_id,
            examined = report.examined,
            closed = report.closed.len(),
            not_due = report.not_due,
            below_quorum = report.below_quorum,
            errors = report.errors.len(),
            "🧹 Sweep finished"
        );

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send(&report).await {
                warn!(run_id = %report.run_id, error = %e, "Failed to deliver sweep summary");
            }
        }
        Ok(report)
    }

    async fn examine(
        &self,
        proposal: &ProposalSummary,
        now: DateTime<Utc>,
    ) -> Result<Verdict, ServiceError> {
        let deadline = self.service.deadline(proposal.created_at);
        if now < deadline {
            debug!(proposal = proposal.id, %deadline, "Voting still open");
            return Ok(Verdict::NotDue);
        }

        let entries = self
            .store
            .list_entries(proposal.id)
            .await
            .map_err(ServiceError::store(Step::ReadEntries, proposal.id))?;
        let tally = tabulate(&entries);
        if tally.total < self.service.config().minimum_votes {
            return Ok(Verdict::BelowQuorum(tally));
        }

        Ok(Verdict::Closed(self.service.close_voting(proposal.id).await?))
    }
}

/// Run `sweep` every `period` until the task is aborted. The immediate first
/// tick is consumed so a restart never resolves anything on its own.
pub fn spawn(sweep: Sweep, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = sweep.run(Utc::now()).await {
                error!(error = %e, "Sweep aborted");
            }
        }
    })
}
