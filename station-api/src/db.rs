//! Database Connection Pool Module
//!
//! PostgreSQL implementation of [`LogbookStore`] on a deadpool-postgres pool.
//! Tables are defined in `sql/schema.sql`.
//!
//! A [`PgTransaction`] owns one pooled connection on which `BEGIN` was
//! issued, so every step of a provisioning transaction runs on the same
//! connection. If it is dropped unfinished, or its BEGIN, COMMIT or ROLLBACK
//! fails, the connection is detached from the pool and closed, which makes
//! the server abort the transaction.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime};
use secrecy::{ExposeSecret, SecretString};
use station_core::{
    ApiKeyRecord, EntityType, Logbook, LogbookId, NewLogbook, Qso, StationError, StationResult,
    StorageError, Timestamp, User,
};
use station_storage::{LogbookStore, StoreTransaction};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: SecretString,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "station".to_string(),
            user: "postgres".to_string(),
            password: SecretString::new("".into()),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("STATION_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("STATION_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("STATION_DB_NAME").unwrap_or_else(|_| "station".to_string()),
            user: std::env::var("STATION_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: SecretString::new(
                std::env::var("STATION_DB_PASSWORD")
                    .unwrap_or_default()
                    .into(),
            ),
            max_size: std::env::var("STATION_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("STATION_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StationResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.expose_secret().to_string());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            StorageError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            }
            .into()
        })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: PoolError) -> StationError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Unavailable {
        reason: format!("Failed to acquire database connection: {}", err),
    }
    .into()
}

/// Map a driver error. Unique and foreign key violations keep their meaning;
/// a closed connection is unavailability; anything else fails the operation.
fn pg_error(entity_type: EntityType, operation: &str, err: tokio_postgres::Error) -> StationError {
    tracing::error!(operation, "Database error: {:?}", err);

    if let Some(db) = err.as_db_error() {
        if *db.code() == SqlState::UNIQUE_VIOLATION {
            return StorageError::UniqueViolation {
                entity_type,
                field: db.constraint().unwrap_or("unknown").to_string(),
                value: db.detail().unwrap_or_default().to_string(),
            }
            .into();
        }
        if *db.code() == SqlState::FOREIGN_KEY_VIOLATION {
            return StorageError::InsertFailed {
                entity_type,
                reason: format!("foreign key violation: {}", db.message()),
            }
            .into();
        }
    }

    if err.is_closed() {
        return StorageError::Unavailable {
            reason: format!("{}: connection closed", operation),
        }
        .into();
    }

    StorageError::TransactionFailed {
        reason: format!("{}: {}", operation, err),
    }
    .into()
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn user_from_row(row: &Row) -> Result<User, tokio_postgres::Error> {
    Ok(User {
        id: row.try_get("id")?,
        callsign: row.try_get("callsign")?,
        email: row.try_get("email")?,
        pass_hash: row.try_get("pass_hash")?,
        email_confirmed: row.try_get("email_confirmed")?,
    })
}

fn api_key_from_row(row: &Row) -> Result<ApiKeyRecord, tokio_postgres::Error> {
    Ok(ApiKeyRecord {
        prefix: row.try_get("prefix")?,
        digest: row.try_get("digest")?,
        logbook_id: row.try_get("logbook_id")?,
        created_at: row.try_get("created_at")?,
        revoked_at: row.try_get("revoked_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn logbook_from_row(row: &Row) -> Result<Logbook, tokio_postgres::Error> {
    Ok(Logbook {
        id: row.try_get("id")?,
        uid: row.try_get("uid")?,
        callsign: row.try_get("callsign")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        user_id: row.try_get("user_id")?,
    })
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// [`LogbookStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> StationResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> StationResult<Object> {
        self.pool.get().await.map_err(pool_error)
    }
}

#[async_trait]
impl LogbookStore for PgStore {
    async fn fetch_user_by_callsign(&self, callsign: &str) -> StationResult<Option<User>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, callsign, email, pass_hash, email_confirmed \
                 FROM users WHERE upper(callsign) = upper($1)",
                &[&callsign],
            )
            .await
            .map_err(|e| pg_error(EntityType::User, "fetch_user_by_callsign", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| pg_error(EntityType::User, "decode user", e))
    }

    async fn fetch_api_key_by_prefix(&self, prefix: &str) -> StationResult<Option<ApiKeyRecord>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT prefix, digest, logbook_id, created_at, revoked_at, expires_at \
                 FROM api_keys WHERE prefix = $1",
                &[&prefix],
            )
            .await
            .map_err(|e| pg_error(EntityType::ApiKey, "fetch_api_key_by_prefix", e))?;

        row.as_ref()
            .map(api_key_from_row)
            .transpose()
            .map_err(|e| pg_error(EntityType::ApiKey, "decode api key", e))
    }

    async fn fetch_logbook_by_id(&self, id: LogbookId) -> StationResult<Option<Logbook>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, uid, callsign, name, description, user_id \
                 FROM logbooks WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| pg_error(EntityType::Logbook, "fetch_logbook_by_id", e))?;

        row.as_ref()
            .map(logbook_from_row)
            .transpose()
            .map_err(|e| pg_error(EntityType::Logbook, "decode logbook", e))
    }

    async fn begin(&self) -> StationResult<Box<dyn StoreTransaction>> {
        // Wrap first so a failed or cancelled BEGIN detaches the connection.
        let tx = PgTransaction {
            conn: Some(self.get_conn().await?),
        };
        tx.conn()?
            .batch_execute("BEGIN")
            .await
            .map_err(|e| pg_error(EntityType::Logbook, "begin", e))?;
        Ok(Box::new(tx))
    }

    async fn insert_qso(&self, qso: &Qso) -> StationResult<Qso> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO qsos (logbook_id, call, station_callsign, band, mode, freq_mhz, \
                 qso_date, time_on, rst_sent, rst_rcvd) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
                &[
                    &qso.logbook_id,
                    &qso.call,
                    &qso.station_callsign,
                    &qso.band,
                    &qso.mode,
                    &qso.freq_mhz,
                    &qso.qso_date,
                    &qso.time_on,
                    &qso.rst_sent,
                    &qso.rst_rcvd,
                ],
            )
            .await
            .map_err(|e| pg_error(EntityType::Qso, "insert_qso", e))?;

        let id: i64 = row
            .try_get(0)
            .map_err(|e| pg_error(EntityType::Qso, "decode qso id", e))?;
        Ok(Qso { id, ..qso.clone() })
    }

    async fn revoke_api_key(&self, prefix: &str, at: Timestamp) -> StationResult<bool> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE api_keys SET revoked_at = $2 WHERE prefix = $1 AND revoked_at IS NULL",
                &[&prefix, &at],
            )
            .await
            .map_err(|e| pg_error(EntityType::ApiKey, "revoke_api_key", e))?;
        Ok(updated > 0)
    }

    async fn health_check(&self) -> StationResult<()> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1")
            .await
            .map_err(|e| pg_error(EntityType::Logbook, "health_check", e))?;
        Ok(())
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// An open transaction holding its pooled connection.
pub struct PgTransaction {
    conn: Option<Object>,
}

impl PgTransaction {
    fn conn(&self) -> StationResult<&Object> {
        self.conn.as_ref().ok_or_else(|| {
            StorageError::TransactionFailed {
                reason: "transaction already finished".to_string(),
            }
            .into()
        })
    }

    /// Finish with `statement`. The connection goes back to the pool only
    /// once the statement succeeded; otherwise `Drop` discards it.
    async fn finish(mut self: Box<Self>, statement: &str) -> StationResult<()> {
        let result = self.conn()?.batch_execute(statement).await;
        match result {
            Ok(()) => {
                drop(self.conn.take());
                Ok(())
            }
            Err(e) => Err(StorageError::TransactionFailed {
                reason: format!("{}: {}", statement, e),
            }
            .into()),
        }
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("transaction abandoned; closing its connection");
            drop(Object::take(conn));
        }
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert_logbook(&mut self, logbook: &NewLogbook) -> StationResult<Logbook> {
        let row = self
            .conn()?
            .query_one(
                "INSERT INTO logbooks (uid, user_id, name, callsign, description) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &logbook.uid,
                    &logbook.user_id,
                    &logbook.name,
                    &logbook.callsign,
                    &logbook.description,
                ],
            )
            .await
            .map_err(|e| pg_error(EntityType::Logbook, "insert_logbook", e))?;

        let id: LogbookId = row
            .try_get(0)
            .map_err(|e| pg_error(EntityType::Logbook, "decode logbook id", e))?;
        Ok(logbook.clone().into_logbook(id))
    }

    async fn insert_api_key(
        &mut self,
        prefix: &str,
        digest_hex: &str,
        logbook_id: LogbookId,
    ) -> StationResult<()> {
        self.conn()?
            .execute(
                "INSERT INTO api_keys (prefix, digest, logbook_id) VALUES ($1, $2, $3)",
                &[&prefix, &digest_hex, &logbook_id],
            )
            .await
            .map_err(|e| pg_error(EntityType::ApiKey, "insert_api_key", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StationResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> StationResult<()> {
        self.finish("ROLLBACK").await
    }
}
