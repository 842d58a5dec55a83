//! The Execution Store (§4.A): typed persistence plus the skip-lock poll
//! that lets multiple scheduler workers draw disjoint work without
//! coordinating with each other.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Execution;
use crate::error::EngineError;

/// Decouples the workers from the concrete Postgres implementation so unit
/// tests can run against an in-memory double (see `InMemoryExecutionStore`
/// below and SPEC_FULL.md §9 "Dynamic polymorphism").
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Inserts a new execution and returns it with its assigned id.
    async fn create(&self, exec: Execution) -> Result<Execution, EngineError>;

    /// `None` when no row with this id exists.
    async fn get_by_id(&self, id: i64) -> Result<Option<Execution>, EngineError>;

    async fn list(&self) -> Result<Vec<Execution>, EngineError>;

    /// Whole-row write, keyed by id, outside of any `poll_next_for_fill`
    /// transaction. Used directly by tests and by any caller that mutates
    /// an execution without going through the fill-scheduler's claim path;
    /// the scheduler itself writes through `FillClaim::update` instead, so
    /// its write stays inside the held row lock.
    async fn update(&self, exec: &Execution) -> Result<(), EngineError>;

    /// Opens a transaction and draws at most one row with `is_open AND
    /// next_fill_timestamp <= now`, via `FOR UPDATE SKIP LOCKED`. `None`
    /// means nothing is currently eligible, and the (empty) transaction is
    /// closed before returning. The returned `FillClaim` holds the row lock
    /// open until `commit` or `rollback` consumes it — per §4.A's contract,
    /// callers must drive the claim through the pricing fetch and the
    /// subsequent `update` + publish before releasing it, so the lock
    /// guards the whole write-then-publish window.
    async fn poll_next_for_fill(&self) -> Result<Option<Box<dyn FillClaim>>, EngineError>;
}

/// A held row lock from `poll_next_for_fill`, plus the execution it guards.
/// Exactly one of `commit`/`rollback` must be called to release the lock.
#[async_trait]
pub trait FillClaim: Send {
    /// The execution as it stood at poll time (before any in-tick mutation).
    fn execution(&self) -> &Execution;

    /// Writes the mutated execution back within the held transaction. Does
    /// not release the lock — call `commit` afterwards.
    async fn update(&mut self, exec: Execution) -> Result<(), EngineError>;

    /// Persists the transaction and releases the row lock.
    async fn commit(self: Box<Self>) -> Result<(), EngineError>;

    /// Abandons the transaction (no `update` effects survive) and releases
    /// the row lock, making the row eligible again on the next tick. Used
    /// when the pricing fetch fails mid-tick (§4.E step 5).
    async fn rollback(self: Box<Self>) -> Result<(), EngineError>;
}

pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub async fn connect(database_url: &str) -> Result<Self, EngineError> {
        let max_connections = std::env::var("PG_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }
}

fn row_to_execution(row: PgRow) -> Result<Execution, EngineError> {
    let status: String = row.try_get("execution_status")?;
    let trade_type: String = row.try_get("trade_type")?;
    Ok(Execution {
        id: row.try_get("id")?,
        execution_service_id: row.try_get("execution_service_id")?,
        is_open: row.try_get("is_open")?,
        status: status.parse()?,
        trade_type: trade_type.parse()?,
        destination: row.try_get("destination")?,
        security_id: row.try_get("security_id")?,
        ticker: row.try_get("ticker")?,
        quantity_ordered: row.try_get("quantity_ordered")?,
        limit_price: row.try_get("limit_price")?,
        received_timestamp: row.try_get("received_timestamp")?,
        sent_timestamp: row.try_get("sent_timestamp")?,
        last_fill_timestamp: row.try_get("last_fill_timestamp")?,
        next_fill_timestamp: row.try_get("next_fill_timestamp")?,
        quantity_filled: row.try_get("quantity_filled")?,
        number_of_fills: row.try_get("number_of_fills")?,
        total_amount: row.try_get("total_amount")?,
        trade_service_execution_id: row.try_get("trade_service_execution_id")?,
        version: row.try_get("version")?,
    })
}

fn bind_execution_columns<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    exec: &'q Execution,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(exec.execution_service_id)
        .bind(exec.is_open)
        .bind(exec.status.as_str())
        .bind(exec.trade_type.as_str())
        .bind(&exec.destination)
        .bind(&exec.security_id)
        .bind(&exec.ticker)
        .bind(exec.quantity_ordered)
        .bind(exec.limit_price)
        .bind(exec.received_timestamp)
        .bind(exec.sent_timestamp)
        .bind(exec.last_fill_timestamp)
        .bind(exec.quantity_filled)
        .bind(exec.next_fill_timestamp)
        .bind(exec.number_of_fills)
        .bind(exec.total_amount)
        .bind(exec.trade_service_execution_id)
        .bind(exec.version)
}

const UPDATE_SQL: &str = r#"UPDATE execution SET
    execution_service_id = $1, is_open = $2, execution_status = $3, trade_type = $4,
    destination = $5, security_id = $6, ticker = $7, quantity_ordered = $8,
    limit_price = $9, received_timestamp = $10, sent_timestamp = $11,
    last_fill_timestamp = $12, quantity_filled = $13, next_fill_timestamp = $14,
    number_of_fills = $15, total_amount = $16, trade_service_execution_id = $17,
    version = $18
   WHERE id = $19"#;

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn create(&self, mut exec: Execution) -> Result<Execution, EngineError> {
        let query = sqlx::query(
            r#"INSERT INTO execution (
                execution_service_id, is_open, execution_status, trade_type, destination,
                security_id, ticker, quantity_ordered, limit_price, received_timestamp,
                sent_timestamp, last_fill_timestamp, quantity_filled, next_fill_timestamp,
                number_of_fills, total_amount, trade_service_execution_id, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id"#,
        );
        let row = bind_execution_columns(query, &exec).fetch_one(&self.pool).await?;

        exec.id = row.try_get("id")?;
        Ok(exec)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Execution>, EngineError> {
        let row = sqlx::query("SELECT * FROM execution WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_execution).transpose()
    }

    async fn list(&self) -> Result<Vec<Execution>, EngineError> {
        let rows = sqlx::query("SELECT * FROM execution")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_execution).collect()
    }

    async fn update(&self, exec: &Execution) -> Result<(), EngineError> {
        let query = sqlx::query(UPDATE_SQL);
        bind_execution_columns(query, exec)
            .bind(exec.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn poll_next_for_fill(&self) -> Result<Option<Box<dyn FillClaim>>, EngineError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"SELECT * FROM execution
               WHERE is_open AND next_fill_timestamp <= NOW()
               FOR UPDATE SKIP LOCKED
               LIMIT 1"#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            None => {
                tx.rollback().await?;
                Ok(None)
            }
            Some(row) => {
                let exec = row_to_execution(row)?;
                Ok(Some(Box::new(PgFillClaim { tx: Some(tx), exec })))
            }
        }
    }
}

struct PgFillClaim {
    tx: Option<sqlx::Transaction<'static, sqlx::Postgres>>,
    exec: Execution,
}

#[async_trait]
impl FillClaim for PgFillClaim {
    fn execution(&self) -> &Execution {
        &self.exec
    }

    async fn update(&mut self, exec: Execution) -> Result<(), EngineError> {
        let tx = self
            .tx
            .as_mut()
            .expect("update called after commit/rollback");
        let query = sqlx::query(UPDATE_SQL);
        bind_execution_columns(query, &exec)
            .bind(exec.id)
            .execute(&mut **tx)
            .await?;
        self.exec = exec;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), EngineError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), EngineError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// In-memory test double. The whole table is guarded by a single
/// `tokio::sync::Mutex` rather than `std::sync::Mutex` so that a
/// `poll_next_for_fill` claim can hold its guard open across the `.await`
/// points between poll and commit/rollback — the same "exactly one caller
/// holds the row" guarantee `FOR UPDATE SKIP LOCKED` gives the Postgres
/// implementation, modeled here at whole-table granularity since unit
/// tests never need two *different* rows to proceed concurrently.
pub struct InMemoryExecutionStore {
    rows: Arc<tokio::sync::Mutex<Vec<Execution>>>,
    next_id: std::sync::atomic::AtomicI64,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, mut exec: Execution) -> Result<Execution, EngineError> {
        exec.id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.rows.lock().await.push(exec.clone());
        Ok(exec)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Execution>, EngineError> {
        Ok(self.rows.lock().await.iter().find(|e| e.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Execution>, EngineError> {
        Ok(self.rows.lock().await.clone())
    }

    async fn update(&self, exec: &Execution) -> Result<(), EngineError> {
        let mut rows = self.rows.lock().await;
        if let Some(slot) = rows.iter_mut().find(|e| e.id == exec.id) {
            *slot = exec.clone();
            Ok(())
        } else {
            Err(EngineError::Store(sqlx::Error::RowNotFound))
        }
    }

    async fn poll_next_for_fill(&self) -> Result<Option<Box<dyn FillClaim>>, EngineError> {
        let guard = self.rows.clone().lock_owned().await;
        let now = Utc::now();
        let index = guard
            .iter()
            .position(|e| e.is_open && e.next_fill_timestamp.is_some_and(|t| t <= now));

        match index {
            None => Ok(None),
            Some(index) => {
                let exec = guard[index].clone();
                Ok(Some(Box::new(InMemoryFillClaim {
                    guard: Some(guard),
                    index,
                    exec,
                })))
            }
        }
    }
}

struct InMemoryFillClaim {
    guard: Option<tokio::sync::OwnedMutexGuard<Vec<Execution>>>,
    index: usize,
    exec: Execution,
}

#[async_trait]
impl FillClaim for InMemoryFillClaim {
    fn execution(&self) -> &Execution {
        &self.exec
    }

    async fn update(&mut self, exec: Execution) -> Result<(), EngineError> {
        let guard = self
            .guard
            .as_mut()
            .expect("update called after commit/rollback");
        guard[self.index] = exec.clone();
        self.exec = exec;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), EngineError> {
        self.guard.take();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), EngineError> {
        self.guard.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sample() -> Execution {
        Execution::new_open(
            1,
            TradeType::Buy,
            "DEST".into(),
            "SEC1".into(),
            "AAPL".into(),
            dec!(100),
            None,
            Utc::now(),
            Utc::now(),
            None,
            1,
        )
    }

    #[tokio::test]
    async fn create_assigns_id_and_get_by_id_round_trips() {
        let store = InMemoryExecutionStore::new();
        let created = store.create(sample()).await.unwrap();
        assert_ne!(created.id, 0);

        let fetched = store.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.ticker, "AAPL");
    }

    #[tokio::test]
    async fn get_by_id_missing_returns_none() {
        let store = InMemoryExecutionStore::new();
        assert!(store.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn poll_only_returns_eligible_open_rows() {
        let store = InMemoryExecutionStore::new();
        let mut not_yet = sample();
        not_yet.next_fill_timestamp = Some(Utc::now() + chrono::Duration::seconds(60));
        store.create(not_yet).await.unwrap();

        assert!(store.poll_next_for_fill().await.unwrap().is_none());

        let eligible = store.create(sample()).await.unwrap();
        let claim = store.poll_next_for_fill().await.unwrap().unwrap();
        assert_eq!(claim.execution().id, eligible.id);
        claim.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn update_persists_changes_on_commit() {
        let store = InMemoryExecutionStore::new();
        let created = store.create(sample()).await.unwrap();

        let mut claim = store.poll_next_for_fill().await.unwrap().unwrap();
        let mut mutated = claim.execution().clone();
        mutated.quantity_filled = dec!(50);
        claim.update(mutated).await.unwrap();
        claim.commit().await.unwrap();

        let fetched = store.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.quantity_filled, dec!(50));
    }

    #[tokio::test]
    async fn rollback_discards_the_held_lock_without_surfacing_mutation() {
        let store = InMemoryExecutionStore::new();
        let created = store.create(sample()).await.unwrap();

        let claim = store.poll_next_for_fill().await.unwrap().unwrap();
        claim.rollback().await.unwrap();

        // Row is eligible again next poll, unchanged.
        let claim2 = store.poll_next_for_fill().await.unwrap().unwrap();
        assert_eq!(claim2.execution().id, created.id);
        assert_eq!(claim2.execution().quantity_filled, Decimal::ZERO);
        claim2.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn poll_hides_the_row_until_the_claim_is_released() {
        let store = Arc::new(InMemoryExecutionStore::new());
        store.create(sample()).await.unwrap();

        let claim = store.poll_next_for_fill().await.unwrap().unwrap();

        // A "concurrent" poll attempt would block on the same mutex rather
        // than observing the row a second time; we simulate that by
        // confirming the row only becomes pollable again after release.
        claim.rollback().await.unwrap();
        assert!(store.poll_next_for_fill().await.unwrap().is_some());
    }
}
