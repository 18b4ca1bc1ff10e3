//! In-memory transactional store.
//!
//! Transactions stage their writes and apply them in one step on commit, so
//! a rolled back or dropped transaction leaves nothing behind. Ids come from
//! sequences that never rewind, like database sequences. A [`FaultPlan`]
//! lets tests force each failure branch of the provisioning flow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use station_core::{
    ApiKeyRecord, EntityType, Logbook, LogbookId, NewLogbook, Qso, StationError, StationResult,
    StorageError, Timestamp, User,
};

use crate::store::{LogbookStore, StoreTransaction};

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Failures to inject. All flags are off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_logbook_insert: bool,
    /// Report success on logbook insert but hand back id 0.
    pub zero_logbook_id: bool,
    pub fail_key_insert: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    /// Every call fails with `Unavailable`.
    pub unavailable: bool,
    /// Sleep before serving each call.
    pub latency: Option<Duration>,
}

impl FaultPlan {
    pub fn none() -> Self {
        Self::default()
    }
}

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Default)]
struct Tables {
    /// Keyed by uppercase callsign.
    users: HashMap<String, User>,
    logbooks: HashMap<LogbookId, Logbook>,
    api_keys: HashMap<String, ApiKeyRecord>,
    qsos: Vec<Qso>,
}

impl Tables {
    fn logbook_name_taken(&self, name: &str) -> bool {
        self.logbooks.values().any(|l| l.name == name)
    }
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    faults: RwLock<FaultPlan>,
    logbook_seq: AtomicI64,
    user_seq: AtomicI64,
    qso_seq: AtomicI64,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Shared handle; clones see the same data.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable() -> StationError {
    StationError::Storage(StorageError::Unavailable {
        reason: "injected outage".to_string(),
    })
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                faults: RwLock::new(FaultPlan::default()),
                logbook_seq: AtomicI64::new(1),
                user_seq: AtomicI64::new(1),
                qso_seq: AtomicI64::new(1),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            }),
        }
    }

    // Batches are applied only after every check passes, so a poisoned
    // lock still guards whole rows.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.shared.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.shared.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> FaultPlan {
        self.shared
            .faults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the active fault plan.
    pub fn set_faults(&self, plan: FaultPlan) {
        *self.shared.faults.write().unwrap_or_else(|e| e.into_inner()) = plan;
    }

    pub fn clear_faults(&self) {
        self.set_faults(FaultPlan::none());
    }

    async fn enter(&self) -> StationResult<FaultPlan> {
        let plan = self.faults();
        if let Some(latency) = plan.latency {
            tokio::time::sleep(latency).await;
        }
        if plan.unavailable {
            return Err(unavailable());
        }
        Ok(plan)
    }

    // === Seeding ===

    /// Insert a user directly. The id is assigned from the user sequence.
    pub fn seed_user(
        &self,
        callsign: &str,
        email: &str,
        pass_hash: &str,
        email_confirmed: bool,
    ) -> User {
        let user = User {
            id: self.shared.user_seq.fetch_add(1, Ordering::SeqCst),
            callsign: callsign.to_ascii_uppercase(),
            email: email.to_string(),
            pass_hash: pass_hash.to_string(),
            email_confirmed,
        };
        self.write()
            .users
            .insert(user.callsign.clone(), user.clone());
        user
    }

    /// Insert a key record directly, bypassing the transactional path.
    pub fn seed_api_key(&self, record: ApiKeyRecord) {
        self.write().api_keys.insert(record.prefix.clone(), record);
    }

    /// Insert a committed logbook directly.
    pub fn seed_logbook(&self, logbook: NewLogbook) -> Logbook {
        let id = self.shared.logbook_seq.fetch_add(1, Ordering::SeqCst);
        let logbook = logbook.into_logbook(id);
        self.write().logbooks.insert(id, logbook.clone());
        logbook
    }

    // === Introspection ===

    pub fn logbook_count(&self) -> usize {
        self.read().logbooks.len()
    }

    pub fn api_key_count(&self) -> usize {
        self.read().api_keys.len()
    }

    pub fn qso_count(&self) -> usize {
        self.read().qsos.len()
    }

    pub fn find_logbook_by_name(&self, name: &str) -> Option<Logbook> {
        self.read().logbooks.values().find(|l| l.name == name).cloned()
    }

    pub fn api_keys_for_logbook(&self, logbook_id: LogbookId) -> Vec<ApiKeyRecord> {
        self.read()
            .api_keys
            .values()
            .filter(|k| k.logbook_id == logbook_id)
            .cloned()
            .collect()
    }

    pub fn qsos_for_logbook(&self, logbook_id: LogbookId) -> Vec<Qso> {
        self.read()
            .qsos
            .iter()
            .filter(|q| q.logbook_id == logbook_id)
            .cloned()
            .collect()
    }

    /// Transactions committed so far.
    pub fn commit_count(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Rollbacks requested so far, including failed ones.
    pub fn rollback_count(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogbookStore for InMemoryStore {
    async fn fetch_user_by_callsign(&self, callsign: &str) -> StationResult<Option<User>> {
        self.enter().await?;
        Ok(self
            .read()
            .users
            .get(&callsign.to_ascii_uppercase())
            .cloned())
    }

    async fn fetch_api_key_by_prefix(&self, prefix: &str) -> StationResult<Option<ApiKeyRecord>> {
        self.enter().await?;
        Ok(self.read().api_keys.get(prefix).cloned())
    }

    async fn fetch_logbook_by_id(&self, id: LogbookId) -> StationResult<Option<Logbook>> {
        self.enter().await?;
        Ok(self.read().logbooks.get(&id).cloned())
    }

    async fn begin(&self) -> StationResult<Box<dyn StoreTransaction>> {
        self.enter().await?;
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            staged_logbooks: Vec::new(),
            staged_keys: Vec::new(),
        }))
    }

    async fn insert_qso(&self, qso: &Qso) -> StationResult<Qso> {
        self.enter().await?;
        let mut tables = self.write();
        if !tables.logbooks.contains_key(&qso.logbook_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Qso,
                reason: format!("logbook {} does not exist", qso.logbook_id),
            }
            .into());
        }
        let mut stored = qso.clone();
        stored.id = self.shared.qso_seq.fetch_add(1, Ordering::SeqCst);
        tables.qsos.push(stored.clone());
        Ok(stored)
    }

    async fn revoke_api_key(&self, prefix: &str, at: Timestamp) -> StationResult<bool> {
        self.enter().await?;
        let mut tables = self.write();
        match tables.api_keys.get_mut(prefix) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> StationResult<()> {
        self.enter().await?;
        Ok(())
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

struct InMemoryTransaction {
    store: InMemoryStore,
    staged_logbooks: Vec<Logbook>,
    staged_keys: Vec<ApiKeyRecord>,
}

impl InMemoryTransaction {
    fn logbook_visible(&self, tables: &Tables, id: LogbookId) -> bool {
        tables.logbooks.contains_key(&id) || self.staged_logbooks.iter().any(|l| l.id == id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert_logbook(&mut self, logbook: &NewLogbook) -> StationResult<Logbook> {
        let plan = self.store.enter().await?;
        if plan.fail_logbook_insert {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Logbook,
                reason: "injected failure".to_string(),
            }
            .into());
        }

        let name_taken = self.store.read().logbook_name_taken(&logbook.name)
            || self.staged_logbooks.iter().any(|l| l.name == logbook.name);
        if name_taken {
            return Err(StorageError::UniqueViolation {
                entity_type: EntityType::Logbook,
                field: "name".to_string(),
                value: logbook.name.clone(),
            }
            .into());
        }

        let id = if plan.zero_logbook_id {
            0
        } else {
            self.store.shared.logbook_seq.fetch_add(1, Ordering::SeqCst)
        };
        let row = logbook.clone().into_logbook(id);
        self.staged_logbooks.push(row.clone());
        Ok(row)
    }

    async fn insert_api_key(
        &mut self,
        prefix: &str,
        digest_hex: &str,
        logbook_id: LogbookId,
    ) -> StationResult<()> {
        let plan = self.store.enter().await?;
        if plan.fail_key_insert {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::ApiKey,
                reason: "injected failure".to_string(),
            }
            .into());
        }

        {
            let tables = self.store.read();
            if tables.api_keys.contains_key(prefix)
                || self.staged_keys.iter().any(|k| k.prefix == prefix)
            {
                return Err(StorageError::UniqueViolation {
                    entity_type: EntityType::ApiKey,
                    field: "prefix".to_string(),
                    value: prefix.to_string(),
                }
                .into());
            }
            if !self.logbook_visible(&tables, logbook_id) {
                return Err(StorageError::InsertFailed {
                    entity_type: EntityType::ApiKey,
                    reason: format!("logbook {} does not exist", logbook_id),
                }
                .into());
            }
        }

        self.staged_keys.push(ApiKeyRecord {
            prefix: prefix.to_string(),
            digest: digest_hex.to_string(),
            logbook_id,
            created_at: Utc::now(),
            revoked_at: None,
            expires_at: None,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StationResult<()> {
        let plan = self.store.enter().await?;
        if plan.fail_commit {
            return Err(StorageError::TransactionFailed {
                reason: "injected commit failure".to_string(),
            }
            .into());
        }

        let InMemoryTransaction {
            store,
            staged_logbooks,
            staged_keys,
        } = *self;

        let mut tables = store.write();
        // Another transaction may have committed the same values meanwhile.
        for logbook in &staged_logbooks {
            if tables.logbook_name_taken(&logbook.name) {
                return Err(StorageError::UniqueViolation {
                    entity_type: EntityType::Logbook,
                    field: "name".to_string(),
                    value: logbook.name.clone(),
                }
                .into());
            }
        }
        for key in &staged_keys {
            if tables.api_keys.contains_key(&key.prefix) {
                return Err(StorageError::UniqueViolation {
                    entity_type: EntityType::ApiKey,
                    field: "prefix".to_string(),
                    value: key.prefix.clone(),
                }
                .into());
            }
        }

        for logbook in staged_logbooks {
            tables.logbooks.insert(logbook.id, logbook);
        }
        for key in staged_keys {
            tables.api_keys.insert(key.prefix.clone(), key);
        }
        drop(tables);

        store.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StationResult<()> {
        self.store.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        let plan = self.store.faults();
        if plan.fail_rollback || plan.unavailable {
            return Err(StorageError::TransactionFailed {
                reason: "injected rollback failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
