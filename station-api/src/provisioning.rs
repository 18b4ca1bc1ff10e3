//! Logbook provisioning.
//!
//! Creates a logbook and its first API key in one store transaction. Either
//! both rows exist afterwards or neither does: every failure before commit
//! rolls back, and a commit failure is reported without retrying.

use secrecy::{ExposeSecret, SecretString};
use station_core::{
    generate_api_key, AuthError, GeneratedKey, KeyDigester, KeyError, Logbook, LogbookDraft,
    NewLogbook, UserId,
};
use station_storage::{LogbookStore, StoreTransaction};
use std::fmt;
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

/// A committed logbook and the one copy of its full API key.
pub struct ProvisionedLogbook {
    pub logbook: Logbook,
    pub prefix: String,
    full_key: SecretString,
}

impl ProvisionedLogbook {
    /// The full `prefix.secret` key. Hand it to the client once; it cannot
    /// be recovered later.
    pub fn expose_full_key(&self) -> &str {
        self.full_key.expose_secret()
    }
}

impl fmt::Debug for ProvisionedLogbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedLogbook")
            .field("logbook", &self.logbook)
            .field("prefix", &self.prefix)
            .field("full_key", &"[REDACTED]")
            .finish()
    }
}

fn record_outcome(outcome: &str) {
    if let Some(m) = metrics() {
        m.record_provisioning(outcome);
    }
}

/// Roll back and hand back `cause`. A failed rollback is logged; the
/// caller still sees the original error.
async fn abort(
    tx: Box<dyn StoreTransaction>,
    stage: &'static str,
    cause: ApiError,
) -> ApiError {
    if let Err(e) = tx.rollback().await {
        error!(stage, error = %e, "rollback failed");
    }
    record_outcome(stage);
    cause
}

/// Provision `draft` for `owner`.
///
/// The logbook owner is always `owner`; nothing in the draft can change it.
/// The returned key is never logged, only its prefix.
pub async fn provision_logbook(
    store: &dyn LogbookStore,
    prefix_len: usize,
    digester: &KeyDigester,
    owner: UserId,
    draft: LogbookDraft,
) -> ApiResult<ProvisionedLogbook> {
    provision_logbook_with(store, digester, owner, draft, || generate_api_key(prefix_len)).await
}

/// [`provision_logbook`] with the key source supplied by the caller.
pub async fn provision_logbook_with<F>(
    store: &dyn LogbookStore,
    digester: &KeyDigester,
    owner: UserId,
    draft: LogbookDraft,
    mint_key: F,
) -> ApiResult<ProvisionedLogbook>
where
    F: FnOnce() -> Result<GeneratedKey, KeyError> + Send,
{
    let new_logbook = NewLogbook::from_draft(draft, owner);

    let mut tx = store.begin().await.map_err(|e| {
        record_outcome("begin_failed");
        ApiError::from(e)
    })?;

    let logbook = match tx.insert_logbook(&new_logbook).await {
        Ok(logbook) => logbook,
        Err(e) => {
            warn!(name = %new_logbook.name, error = %e, "logbook insert failed");
            return Err(abort(tx, "logbook_insert_failed", ApiError::from(e)).await);
        }
    };

    if logbook.id == 0 {
        let cause = ApiError::from(AuthError::TransactionIntegrityViolation {
            reason: format!("store returned id 0 for logbook '{}'", logbook.name),
        });
        return Err(abort(tx, "integrity_violation", cause).await);
    }

    let key = match mint_key() {
        Ok(key) => key,
        Err(e) => return Err(abort(tx, "key_generation_failed", ApiError::from(e)).await),
    };

    let digest_hex = digester.digest_hex(key.secret.expose_secret());
    if let Err(e) = tx
        .insert_api_key(&key.prefix, &digest_hex, logbook.id)
        .await
    {
        warn!(prefix = %key.prefix, logbook_id = logbook.id, error = %e, "api key insert failed");
        return Err(abort(tx, "key_insert_failed", ApiError::from(e)).await);
    }

    if let Err(e) = tx.commit().await {
        // The outcome is unknown to us; no retry, no second rollback.
        error!(prefix = %key.prefix, logbook_id = logbook.id, error = %e, "commit failed");
        record_outcome("commit_failed");
        return Err(e.into());
    }

    record_outcome("committed");
    info!(
        logbook_id = logbook.id,
        logbook_uid = %logbook.uid,
        prefix = %key.prefix,
        owner,
        "logbook provisioned"
    );

    Ok(ProvisionedLogbook {
        logbook,
        prefix: key.prefix,
        full_key: key.full_key,
    })
}
