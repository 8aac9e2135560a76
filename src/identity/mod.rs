//! Identity registry
//!
//! Maps a member's signature token to a display name. Only records whose
//! status is ACTIVE authorize votes or proposal authorship; a record that
//! exists but is not active is reported distinctly so operators can see who
//! was blocked.

mod registry;
mod signature;

pub use registry::{FileIdentityRegistry, MemoryIdentityRegistry};
pub use signature::{verify_signed_text, SignatureError};

#[cfg(test)]
pub(crate) use signature::tests::{member_key, sign};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const ACTIVE_STATUS: &str = "ACTIVE";

/// A row of the external registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub signature: String,
    pub name: String,
    pub status: String,
}

impl IdentityRecord {
    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(ACTIVE_STATUS)
    }
}

/// Outcome of resolving a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum IdentityLookup {
    Active { name: String },
    Inactive { name: String, recorded_status: String },
    NotFound,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read identity registry {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse identity registry {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only lookup table of member identities
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Current registry contents
    async fn records(&self) -> Result<Vec<IdentityRecord>, RegistryError>;

    /// Resolve a signature, compared by exact value after trimming
    async fn resolve(&self, signature: &str) -> Result<IdentityLookup, RegistryError> {
        Ok(resolve_in(&self.records().await?, signature))
    }
}

/// An active record wins over inactive duplicates of the same signature
pub fn resolve_in(records: &[IdentityRecord], signature: &str) -> IdentityLookup {
    let wanted = signature.trim();
    if wanted.is_empty() {
        return IdentityLookup::NotFound;
    }
    let mut inactive = None;
    for record in records.iter().filter(|r| r.signature.trim() == wanted) {
        if record.is_active() {
            return IdentityLookup::Active {
                name: record.name.clone(),
            };
        }
        inactive.get_or_insert(record);
    }
    match inactive {
        Some(record) => IdentityLookup::Inactive {
            name: record.name.clone(),
            recorded_status: record.status.clone(),
        },
        None => IdentityLookup::NotFound,
    }
}
