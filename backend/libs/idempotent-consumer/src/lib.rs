//! # Idempotent Consumer: Dedup Store Client
//!
//! Durable dedup records for an at-least-once Kafka consumer. A consumer that
//! must produce each side effect once per logical event checks the store
//! before doing work and records the event ID after the work succeeded.
//!
//! ## Two signals
//!
//! ```text
//! delivery → exists(event_id)? ──yes──→ Duplicate
//!                 │ no
//!                 ▼
//!           side effects (downstream call, publish)
//!                 │
//!                 ▼
//!        record_if_absent(event_id) ──AlreadyExists──→ Duplicate
//!                 │ Ok
//!                 ▼
//!              Recorded
//! ```
//!
//! - `exists` is a cheap point lookup that short-circuits plain redeliveries.
//! - `record_if_absent` is a single conditional insert
//!   (`INSERT ... ON CONFLICT DO NOTHING`) and is the actual correctness
//!   boundary. When two consumers both pass `exists` for the same event ID,
//!   exactly one insert wins and the other gets [`DedupError::AlreadyExists`].
//!
//! Nothing is cached in process: every check goes to PostgreSQL.
//!
//! ## Usage
//!
//! ```ignore
//! use idempotent_consumer::{DedupStore, PgDedupStore};
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let store = PgDedupStore::new(pool);
//! store.migrate().await?;
//!
//! if store.exists("event-123").await? {
//!     return Ok(());
//! }
//!
//! do_work().await?;
//!
//! match store.record_if_absent("event-123").await {
//!     Ok(()) => {}
//!     Err(e) if e.is_already_exists() => { /* lost the race */ }
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! # async fn do_work() -> Result<(), Box<dyn std::error::Error>> { Ok(()) }
//! ```
//!
//! ## Retention
//!
//! Records are never updated or deleted.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

mod error;

pub use error::{DedupError, DedupResult};

/// Maximum accepted event ID length in characters (matches the `processed_events.id` column)
pub const MAX_EVENT_ID_LEN: usize = 255;

/// Persistent marker that an event has been fully processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    /// Primary key, equal to the inbound event ID
    pub id: String,

    /// Server-assigned insert timestamp
    pub processed_at: DateTime<Utc>,
}

/// Dedup store contract used by the event processor.
///
/// Implementations must make `record_if_absent` atomic at the store level.
/// Read-then-write from the client is not acceptable.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Returns true iff a record for `event_id` exists at read time.
    async fn exists(&self, event_id: &str) -> DedupResult<bool>;

    /// Inserts a record for `event_id` only if none exists.
    ///
    /// Returns [`DedupError::AlreadyExists`] when the condition fails.
    async fn record_if_absent(&self, event_id: &str) -> DedupResult<()>;
}

/// PostgreSQL-backed dedup store.
///
/// Cheap to clone; shares the underlying pool.
#[derive(Clone)]
pub struct PgDedupStore {
    pool: PgPool,
}

impl PgDedupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the `processed_events` migration
    pub async fn migrate(&self) -> DedupResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run processed_events migration")?;
        Ok(())
    }

    /// Load the record for `event_id`, if any
    pub async fn find(&self, event_id: &str) -> DedupResult<Option<ProcessedEventRecord>> {
        validate_event_id(event_id)?;

        let row = sqlx::query(
            r#"
            SELECT id, processed_at FROM processed_events WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load processed event")?;

        row.map(|row| {
            Ok::<_, sqlx::Error>(ProcessedEventRecord {
                id: row.try_get("id")?,
                processed_at: row.try_get("processed_at")?,
            })
        })
        .transpose()
        .map_err(DedupError::Database)
    }
}

#[async_trait]
impl DedupStore for PgDedupStore {
    async fn exists(&self, event_id: &str) -> DedupResult<bool> {
        validate_event_id(event_id)?;

        let result = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM processed_events WHERE id = $1
            ) AS exists
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check if event is processed")?;

        let exists: bool = result.try_get("exists")?;

        if exists {
            debug!(event_id = %event_id, "Event already processed");
        }

        Ok(exists)
    }

    async fn record_if_absent(&self, event_id: &str) -> DedupResult<()> {
        validate_event_id(event_id)?;

        // Single conditional statement; the primary key decides the winner
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (id, processed_at)
            VALUES ($1, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(DedupError::Database);

        let result = match result {
            Ok(result) => result,
            Err(e) if e.is_duplicate_key() => {
                return Err(DedupError::AlreadyExists(event_id.to_string()));
            }
            Err(e) => return Err(e),
        };

        if result.rows_affected() == 0 {
            debug!(event_id = %event_id, "Conditional insert found existing record");
            return Err(DedupError::AlreadyExists(event_id.to_string()));
        }

        info!(event_id = %event_id, "Event recorded as processed");
        Ok(())
    }
}

/// Validate event_id format
pub fn validate_event_id(event_id: &str) -> DedupResult<()> {
    if event_id.is_empty() {
        return Err(DedupError::InvalidEventId(
            "Event ID cannot be empty".to_string(),
        ));
    }

    // VARCHAR length is in characters, not bytes
    let chars = event_id.chars().count();
    if chars > MAX_EVENT_ID_LEN {
        return Err(DedupError::InvalidEventId(format!(
            "Event ID too long: {} characters (max {})",
            chars, MAX_EVENT_ID_LEN
        )));
    }

    Ok(())
}
