//! Sweep summary notifications
//!
//! Posts a finished [`SweepReport`] as JSON to a webhook. Delivery is best
//! effort: callers log a failure and move on.

use crate::scheduler::SweepReport;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification destination is not a URL: {0}")]
    InvalidDestination(String),

    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification destination answered HTTP {0}")]
    Rejected(u16),
}

#[derive(Clone)]
pub struct Notifier {
    client: Client,
    destination: Url,
}

impl Notifier {
    pub fn new(destination: &str) -> Result<Self, NotifyError> {
        let destination = Url::parse(destination)
            .map_err(|_| NotifyError::InvalidDestination(destination.to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("dao-ballot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            destination,
        })
    }

    /// Only runs that changed something or hit errors are worth a message
    pub fn should_notify(report: &SweepReport) -> bool {
        !report.closed.is_empty() || !report.errors.is_empty()
    }

    pub async fn send(&self, report: &SweepReport) -> Result<(), NotifyError> {
        if !Self::should_notify(report) {
            debug!(run_id = %report.run_id, "Nothing to report, notification skipped");
            return Ok(());
        }
        let response = self
            .client
            .post(self.destination.clone())
            .json(report)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        info!(run_id = %report.run_id, "📣 Sweep summary delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{Outcome, Resolution};
    use crate::voting::Tally;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn report() -> SweepReport {
        SweepReport::new(chrono::Utc::now())
    }

    async fn capture_server(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(seen): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                          Json(body): Json<serde_json::Value>| async move {
                        seen.lock().await.push(body);
                        status
                    },
                ),
            )
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), seen)
    }

    #[test]
    fn test_quiet_run_is_not_reported() {
        let mut quiet = report();
        quiet.examined = 4;
        quiet.not_due = 3;
        quiet.below_quorum = 1;
        assert!(!Notifier::should_notify(&quiet));
    }

    #[test]
    fn test_bad_destination_is_rejected() {
        assert!(matches!(
            Notifier::new("not a url"),
            Err(NotifyError::InvalidDestination(_))
        ));
    }

    #[tokio::test]
    async fn test_report_is_posted_as_json() {
        let (url, seen) = capture_server(StatusCode::OK).await;
        let notifier = Notifier::new(&url).unwrap();

        let mut closed = report();
        closed.examined = 1;
        closed.closed.push(Resolution {
            proposal_id: 4,
            outcome: Outcome::Merged,
            tally: Tally {
                yes: 2,
                no: 1,
                total: 3,
            },
        });
        notifier.send(&closed).await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["closed"][0]["proposalId"], 4);
        assert_eq!(seen[0]["closed"][0]["outcome"], "merged");
        assert_eq!(seen[0]["examined"], 1);
    }

    #[tokio::test]
    async fn test_non_success_answer_is_an_error() {
        let (url, _seen) = capture_server(StatusCode::BAD_GATEWAY).await;
        let notifier = Notifier::new(&url).unwrap();

        let mut failed = report();
        failed.errors.push(crate::scheduler::SweepFailure {
            proposal_id: 9,
            message: "boom".to_string(),
        });
        assert!(matches!(
            notifier.send(&failed).await,
            Err(NotifyError::Rejected(502))
        ));
    }
}
