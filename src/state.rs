//! Application state management
//!
//! Contains shared state accessible across all handlers and the sweep task.

use crate::config::{Settings, StoreBackend};
use crate::error::AppError;
use crate::identity::{FileIdentityRegistry, IdentityRegistry, MemoryIdentityRegistry};
use crate::notify::Notifier;
use crate::proposal::ProposalService;
use crate::scheduler::Sweep;
use crate::store::{ChangeRequestStore, GitHubStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,

    /// Backing change-request host
    pub store: Arc<dyn ChangeRequestStore>,

    /// Member registry used by every signed command
    pub identities: Arc<dyn IdentityRegistry>,

    /// Sweep summary webhook, when enabled
    pub notifier: Option<Notifier>,
}

impl AppState {
    /// Build the backends named by `settings`
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        let store: Arc<dyn ChangeRequestStore> = match settings.store {
            StoreBackend::GitHub => {
                let github = settings.github.as_ref().ok_or_else(|| {
                    AppError::Config("GitHub backend selected without GitHub settings".to_string())
                })?;
                info!("📦 Using GitHub store for {}/{}", github.owner, github.repo);
                Arc::new(GitHubStore::new(github).map_err(|e| AppError::Config(e.to_string()))?)
            }
            StoreBackend::Memory => {
                warn!("⚠️  Using in-memory store, proposals are lost on restart");
                Arc::new(MemoryStore::new(&settings.voting.target_branch))
            }
        };

        let identities: Arc<dyn IdentityRegistry> = match &settings.identity.registry_path {
            Some(path) => {
                info!("🪪 Identity registry: {:?}", path);
                Arc::new(FileIdentityRegistry::new(path))
            }
            None => {
                warn!("⚠️  IDENTITY_REGISTRY_PATH not set, every signed command will be rejected");
                Arc::new(MemoryIdentityRegistry::default())
            }
        };

        let notifier = match (settings.notify.enabled, &settings.notify.destination) {
            (true, Some(destination)) => {
                Some(Notifier::new(destination).map_err(|e| AppError::Config(e.to_string()))?)
            }
            _ => None,
        };

        Ok(Self::with_backends(settings, store, identities, notifier))
    }

    pub fn with_backends(
        settings: Settings,
        store: Arc<dyn ChangeRequestStore>,
        identities: Arc<dyn IdentityRegistry>,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            settings,
            store,
            identities,
            notifier,
        }
    }

    /// Service for request handlers; no pacing between calls
    pub fn proposal_service(&self) -> ProposalService {
        ProposalService::new(
            self.store.clone(),
            self.identities.clone(),
            self.settings.voting.clone(),
        )
    }

    /// Sweep paced by `SWEEP_PAUSE_MS`
    pub fn sweep(&self) -> Sweep {
        let service = self
            .proposal_service()
            .with_pause(Duration::from_millis(self.settings.sweep.pause_ms));
        Sweep::new(service, self.store.clone(), self.notifier.clone())
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
