//! In-memory change-request store
//!
//! Behaves like the hosted store closely enough to run the whole workflow
//! locally (`STORE_BACKEND=memory`) and to test the service without a network.

use super::{
    ChangeRequest, ChangeRequestState, ChangeRequestStore, Entry, EntryId, ProposalId, StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Record {
    request: ChangeRequest,
    base: String,
    entries: Vec<Entry>,
}

#[derive(Default)]
struct Inner {
    branches: HashSet<String>,
    /// (branch, path) -> content
    files: HashMap<(String, String), String>,
    records: BTreeMap<ProposalId, Record>,
    next_id: ProposalId,
    next_entry_id: EntryId,
    /// Operations forced to fail, keyed by operation name
    failing: HashSet<&'static str>,
}

/// Thread-safe in-memory store
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// New store whose only branch is `default_branch`
    pub fn new(default_branch: &str) -> Self {
        let mut inner = Inner {
            next_id: 1,
            next_entry_id: 1,
            ..Default::default()
        };
        inner.branches.insert(default_branch.to_string());
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Content committed to `path` on `branch`, if any
    #[cfg(test)]
    pub async fn file(&self, branch: &str, path: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
    }

    /// Make every future call of `operation` fail with HTTP 500
    #[cfg(test)]
    pub async fn fail(&self, operation: &'static str) {
        self.inner.write().await.failing.insert(operation);
    }

    #[cfg(test)]
    pub async fn recover(&self, operation: &'static str) {
        self.inner.write().await.failing.remove(operation);
    }

    fn check(inner: &Inner, operation: &'static str) -> Result<(), StoreError> {
        if inner.failing.contains(operation) {
            return Err(StoreError::Status {
                operation,
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn record<'a>(inner: &'a Inner, id: ProposalId) -> Result<&'a Record, StoreError> {
        inner
            .records
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("proposal #{}", id)))
    }

    fn record_mut<'a>(inner: &'a mut Inner, id: ProposalId) -> Result<&'a mut Record, StoreError> {
        inner
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("proposal #{}", id)))
    }

    fn finish(
        inner: &mut Inner,
        id: ProposalId,
        operation: &'static str,
        state: ChangeRequestState,
    ) -> Result<(), StoreError> {
        Self::check(inner, operation)?;
        let record = Self::record_mut(inner, id)?;
        if !record.request.state.is_open() {
            return Err(StoreError::Status {
                operation,
                status: 405,
                message: format!("Proposal #{} is already {}", id, record.request.state),
            });
        }
        record.request.state = state;
        record.request.updated_at = Utc::now();
        if state == ChangeRequestState::Merged {
            let head = record.request.branch.clone();
            let base = record.base.clone();
            let merged: Vec<_> = inner
                .files
                .iter()
                .filter(|((branch, _), _)| *branch == head)
                .map(|((_, path), content)| ((base.clone(), path.clone()), content.clone()))
                .collect();
            inner.files.extend(merged);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("main")
    }
}

#[async_trait]
impl ChangeRequestStore for MemoryStore {
    async fn create_branch(&self, branch: &str, from: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, "create_branch")?;
        if !inner.branches.contains(from) {
            return Err(StoreError::NotFound(format!("branch {}", from)));
        }
        if inner.branches.contains(branch) {
            return Err(StoreError::Status {
                operation: "create_branch",
                status: 422,
                message: "Reference already exists".to_string(),
            });
        }
        let copied: Vec<_> = inner
            .files
            .iter()
            .filter(|((b, _), _)| b == from)
            .map(|((_, path), content)| ((branch.to_string(), path.clone()), content.clone()))
            .collect();
        inner.files.extend(copied);
        inner.branches.insert(branch.to_string());
        Ok(())
    }

    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        _message: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, "put_file")?;
        if !inner.branches.contains(branch) {
            return Err(StoreError::NotFound(format!("branch {}", branch)));
        }
        inner
            .files
            .insert((branch.to_string(), path.to_string()), content.to_string());
        Ok(())
    }

    async fn open_change_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<ChangeRequest, StoreError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, "open_change_request")?;
        if !inner.branches.contains(head) || !inner.branches.contains(base) {
            return Err(StoreError::Status {
                operation: "open_change_request",
                status: 422,
                message: format!("Unknown branch in {} -> {}", head, base),
            });
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let now = Utc::now();
        let request = ChangeRequest {
            id,
            title: title.to_string(),
            body: body.to_string(),
            branch: head.to_string(),
            state: ChangeRequestState::Open,
            created_at: now,
            updated_at: now,
        };
        inner.records.insert(
            id,
            Record {
                request: request.clone(),
                base: base.to_string(),
                entries: Vec::new(),
            },
        );
        Ok(request)
    }

    async fn list_open(&self) -> Result<Vec<ChangeRequest>, StoreError> {
        let inner = self.inner.read().await;
        Self::check(&inner, "list_open")?;
        Ok(inner
            .records
            .values()
            .filter(|r| r.request.state.is_open())
            .map(|r| r.request.clone())
            .collect())
    }

    async fn get(&self, id: ProposalId) -> Result<ChangeRequest, StoreError> {
        let inner = self.inner.read().await;
        Self::check(&inner, "get")?;
        Ok(Self::record(&inner, id)?.request.clone())
    }

    async fn list_entries(&self, id: ProposalId) -> Result<Vec<Entry>, StoreError> {
        let inner = self.inner.read().await;
        Self::check(&inner, "list_entries")?;
        Ok(Self::record(&inner, id)?.entries.clone())
    }

    async fn append_entry(&self, id: ProposalId, body: &str) -> Result<Entry, StoreError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, "append_entry")?;
        let entry_id = inner.next_entry_id;
        let record = Self::record_mut(&mut inner, id)?;
        let now = Utc::now();
        let entry = Entry {
            id: entry_id,
            body: body.to_string(),
            created_at: now,
        };
        record.entries.push(entry.clone());
        record.request.updated_at = now;
        inner.next_entry_id += 1;
        Ok(entry)
    }

    async fn update_entry(
        &self,
        id: ProposalId,
        entry_id: EntryId,
        body: &str,
    ) -> Result<Entry, StoreError> {
        let mut inner = self.inner.write().await;
        Self::check(&inner, "update_entry")?;
        let record = Self::record_mut(&mut inner, id)?;
        let entry = record
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| StoreError::NotFound(format!("entry {} on proposal #{}", entry_id, id)))?;
        entry.body = body.to_string();
        Ok(entry.clone())
    }

    async fn merge(&self, id: ProposalId, _commit_title: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        Self::finish(&mut inner, id, "merge", ChangeRequestState::Merged)
    }

    async fn close_without_merge(&self, id: ProposalId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        Self::finish(&mut inner, id, "close_without_merge", ChangeRequestState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn open_one(store: &MemoryStore) -> ChangeRequest {
        store.create_branch("proposal-a", "main").await.unwrap();
        store
            .put_file("proposal-a", "a.md", "# A", "add a")
            .await
            .unwrap();
        store
            .open_change_request("proposal-a", "main", "A", "body")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_branch_is_rejected() {
        let store = MemoryStore::new("main");
        store.create_branch("proposal-a", "main").await.unwrap();

        let err = store.create_branch("proposal-a", "main").await.unwrap_err();
        assert_eq!(err.status(), Some(422));
    }

    #[tokio::test]
    async fn test_entries_keep_append_order_and_update_in_place() {
        let store = MemoryStore::new("main");
        let request = open_one(&store).await;

        let first = store.append_entry(request.id, "one").await.unwrap();
        store.append_entry(request.id, "two").await.unwrap();
        store
            .update_entry(request.id, first.id, "one (edited)")
            .await
            .unwrap();

        let bodies: Vec<_> = store
            .list_entries(request.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.body)
            .collect();
        assert_eq!(bodies, vec!["one (edited)".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_merge_moves_file_to_base_and_leaves_open_list() {
        let store = MemoryStore::new("main");
        let request = open_one(&store).await;

        store.merge(request.id, "Merge A").await.unwrap();

        assert_eq!(store.file("main", "a.md").await.as_deref(), Some("# A"));
        assert!(store.list_open().await.unwrap().is_empty());
        assert_eq!(
            store.get(request.id).await.unwrap().state,
            ChangeRequestState::Merged
        );
        assert!(store.close_without_merge(request.id).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_carries_operation_and_status() {
        let store = MemoryStore::new("main");
        let request = open_one(&store).await;
        store.fail("append_entry").await;

        match store.append_entry(request.id, "x").await {
            Err(StoreError::Status {
                operation, status, ..
            }) => {
                assert_eq!(operation, "append_entry");
                assert_eq!(status, 500);
            }
            other => panic!("expected injected failure, got {:?}", other),
        }

        store.recover("append_entry").await;
        tokio_test::assert_ok!(store.append_entry(request.id, "x").await);
    }

    #[tokio::test]
    async fn test_unknown_proposal_is_not_found() {
        let store = MemoryStore::new("main");
        let err = tokio_test::assert_err!(store.list_entries(42).await);
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
