//! Postgres persistence for rounds and tickets.
//!
//! [`PgStore`] implements [`LotoStore`]. Each operation is one transaction
//! that first bounds its own statements with a transaction-local
//! `statement_timeout`. Lifecycle writes (open, close, store results) also
//! take one transaction-scoped advisory lock, so they run one at a time across
//! every daemon and CLI process sharing the database. The partial unique index
//! `uq_single_open_round` backs the single-open-round rule at the schema level.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{error, warn};
use uuid::Uuid;

use loto_config::DbConfig;
use loto_core::round::{decide_close, decide_open, ensure_accepting_tickets, ensure_results_storable};
use loto_core::{
    CloseDecision, CloseOutcome, DrawnNumbers, LotoError, LotoResult, LotoStore, OpenDecision,
    OpenOutcome, OwnerId, Round, Ticket, TicketDraft, TicketNumbers, TicketStatus,
};

pub use loto_config::ENV_DB_URL;

/// Advisory lock key shared by every lifecycle transition ("loto" in ASCII).
pub const LIFECYCLE_LOCK_KEY: i64 = 0x6c6f_746f;

const UQ_SINGLE_OPEN_ROUND: &str = "uq_single_open_round";

// ---------------------------------------------------------------------------
// Pool / schema
// ---------------------------------------------------------------------------

pub async fn connect(cfg: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .connect(&cfg.url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Connect using `LOTO_DATABASE_URL` and the `LOTO_DB_*` settings.
pub async fn connect_from_env() -> Result<(PgPool, DbConfig)> {
    let cfg = DbConfig::from_env()?;
    let pool = connect(&cfg).await?;
    Ok((pool, cfg))
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_rounds_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'rounds'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_rounds_table: exists,
    })
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn from_config(pool: PgPool, cfg: &DbConfig) -> Self {
        Self::new(pool, cfg.statement_timeout)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, op: &'static str) -> LotoResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error(op, e))?;
        sqlx::query("select set_config('statement_timeout', $1, true)")
            .bind(format!("{}ms", self.statement_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(op, e))?;
        Ok(tx)
    }

    /// Transaction holding the lifecycle lock until commit or rollback.
    async fn begin_lifecycle(&self, op: &'static str) -> LotoResult<Transaction<'static, Postgres>> {
        let mut tx = self.begin(op).await?;
        sqlx::query("select pg_advisory_xact_lock($1)")
            .bind(LIFECYCLE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(op, e))?;
        Ok(tx)
    }

    async fn active_round_id(&self) -> LotoResult<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            select id from rounds
            where closed = false
            order by started_at desc, seq desc
            limit 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("open_round", e))?;
        row.map(|r| r.try_get::<Uuid, _>("id"))
            .transpose()
            .map_err(|e| map_sqlx_error("open_round", e))
    }
}

const ROUND_COLUMNS: &str = "id, started_at, closed, results";

async fn fetch_active(
    tx: &mut Transaction<'static, Postgres>,
    op: &'static str,
    lock: &str,
) -> LotoResult<Option<Round>> {
    let sql = format!(
        "select {ROUND_COLUMNS} from rounds where closed = false \
         order by started_at desc, seq desc limit 1 {lock}"
    );
    let row = sqlx::query(&sql)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(op, e))?;
    row.map(|r| round_from_row(&r, op)).transpose()
}

async fn fetch_latest(
    tx: &mut Transaction<'static, Postgres>,
    op: &'static str,
) -> LotoResult<Option<Round>> {
    let sql = format!(
        "select {ROUND_COLUMNS} from rounds order by started_at desc, seq desc limit 1"
    );
    let row = sqlx::query(&sql)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(op, e))?;
    row.map(|r| round_from_row(&r, op)).transpose()
}

async fn commit(tx: Transaction<'static, Postgres>, op: &'static str) -> LotoResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error(op, e))
}

#[async_trait]
impl LotoStore for PgStore {
    async fn open_round(&self) -> LotoResult<OpenOutcome> {
        const OP: &str = "open_round";
        let mut tx = self.begin_lifecycle(OP).await?;

        let active = fetch_active(&mut tx, OP, "").await?;
        match decide_open(active.as_ref()) {
            OpenDecision::AlreadyOpen(id) => {
                commit(tx, OP).await?;
                Ok(OpenOutcome::AlreadyOpen(id))
            }
            OpenDecision::Create => {
                let id = Uuid::new_v4();
                let inserted = sqlx::query("insert into rounds (id, started_at) values ($1, clock_timestamp())")
                    .bind(id)
                    .execute(&mut *tx)
                    .await;
                match inserted {
                    Ok(_) => {
                        commit(tx, OP).await?;
                        Ok(OpenOutcome::Opened(id))
                    }
                    // Only reachable if a writer bypassed the advisory lock.
                    Err(e) if is_unique_constraint_violation(&e, UQ_SINGLE_OPEN_ROUND) => {
                        drop(tx);
                        warn!("open_round: lost race on {UQ_SINGLE_OPEN_ROUND}");
                        match self.active_round_id().await? {
                            Some(existing) => Ok(OpenOutcome::AlreadyOpen(existing)),
                            None => Err(map_sqlx_error(OP, e)),
                        }
                    }
                    Err(e) => Err(map_sqlx_error(OP, e)),
                }
            }
        }
    }

    async fn close_round(&self) -> LotoResult<CloseOutcome> {
        const OP: &str = "close_round";
        let mut tx = self.begin_lifecycle(OP).await?;

        let active = fetch_active(&mut tx, OP, "for update").await?;
        let out = match decide_close(active.as_ref()) {
            CloseDecision::NothingOpen => CloseOutcome::NothingOpen,
            CloseDecision::Close(id) => {
                sqlx::query("update rounds set closed = true where id = $1 and closed = false")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(OP, e))?;
                CloseOutcome::Closed(id)
            }
        };
        commit(tx, OP).await?;
        Ok(out)
    }

    async fn store_results(&self, drawn: &DrawnNumbers) -> LotoResult<Uuid> {
        const OP: &str = "store_results";
        let mut tx = self.begin_lifecycle(OP).await?;

        let latest = fetch_latest(&mut tx, OP).await?;
        let id = ensure_results_storable(latest.as_ref())?;

        let res = sqlx::query(
            "update rounds set results = $2 where id = $1 and closed = true and results is null",
        )
        .bind(id)
        .bind(to_pg_array(drawn.as_slice()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        if res.rows_affected() != 1 {
            return Err(LotoError::Store(format!(
                "{OP}: round {id} changed under lifecycle lock"
            )));
        }
        commit(tx, OP).await?;
        Ok(id)
    }

    async fn insert_ticket(&self, draft: TicketDraft) -> LotoResult<Ticket> {
        const OP: &str = "insert_ticket";
        let mut tx = self.begin(OP).await?;

        // FOR SHARE holds off a concurrent close until this ticket commits.
        let active = fetch_active(&mut tx, OP, "for share").await?;
        let round = ensure_accepting_tickets(active.as_ref())?;

        let mut ticket = draft.bind(round, Utc::now());
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            insert into tickets (id, round_id, owner_id, numbers)
            values ($1, $2, $3, $4)
            returning created_at
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.round_id)
        .bind(ticket.owner_id.as_str())
        .bind(to_pg_array(ticket.numbers.as_slice()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
        ticket.created_at = created_at;

        commit(tx, OP).await?;
        Ok(ticket)
    }

    async fn ticket_status(&self) -> LotoResult<TicketStatus> {
        const OP: &str = "ticket_status";
        let mut tx = self.begin(OP).await?;

        // Open round first, else the latest one; count in the same snapshot.
        let row = sqlx::query(
            r#"
            with r as (
                select id, started_at, closed, results
                from rounds
                order by closed asc, started_at desc, seq desc
                limit 1
            )
            select r.id, r.started_at, r.closed, r.results,
                   (select count(*) from tickets t where t.round_id = r.id)::bigint as ticket_count
            from r
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
        commit(tx, OP).await?;

        let Some(row) = row else {
            return Ok(TicketStatus::empty());
        };
        let round = round_from_row(&row, OP)?;
        let count: i64 = row
            .try_get("ticket_count")
            .map_err(|e| map_sqlx_error(OP, e))?;
        Ok(TicketStatus::summarize(Some(&round), count))
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> LotoResult<Option<(Ticket, Round)>> {
        const OP: &str = "find_ticket";
        let mut tx = self.begin(OP).await?;

        let row = sqlx::query(
            r#"
            select t.id as ticket_id, t.owner_id, t.numbers, t.created_at,
                   r.id, r.started_at, r.closed, r.results
            from tickets t
            join rounds r on r.id = t.round_id
            where t.id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
        commit(tx, OP).await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let round = round_from_row(&row, OP)?;
        let ticket = ticket_from_row(&row, &round, OP)?;
        Ok(Some((ticket, round)))
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn to_pg_array(values: &[u8]) -> Vec<i32> {
    values.iter().map(|&n| i32::from(n)).collect()
}

fn from_pg_array(values: &[i32]) -> Vec<i64> {
    values.iter().map(|&n| i64::from(n)).collect()
}

fn corrupt(op: &'static str, what: impl std::fmt::Display) -> LotoError {
    error!(op, %what, "stored row violates domain rules");
    LotoError::Store(format!("{op}: corrupt row: {what}"))
}

fn round_from_row(row: &PgRow, op: &'static str) -> LotoResult<Round> {
    let get = |e| map_sqlx_error(op, e);
    let results: Option<Vec<i32>> = row.try_get("results").map_err(get)?;
    let results = results
        .map(|v| DrawnNumbers::from_list(&from_pg_array(&v)))
        .transpose()
        .map_err(|e| corrupt(op, e))?;
    Ok(Round {
        id: row.try_get("id").map_err(get)?,
        started_at: row.try_get("started_at").map_err(get)?,
        closed: row.try_get("closed").map_err(get)?,
        results,
    })
}

fn ticket_from_row(row: &PgRow, round: &Round, op: &'static str) -> LotoResult<Ticket> {
    let get = |e| map_sqlx_error(op, e);
    let owner: String = row.try_get("owner_id").map_err(get)?;
    let numbers: Vec<i32> = row.try_get("numbers").map_err(get)?;
    Ok(Ticket {
        id: row.try_get("ticket_id").map_err(get)?,
        round_id: round.id,
        owner_id: OwnerId::new(&owner).map_err(|e| corrupt(op, e))?,
        numbers: TicketNumbers::from_list(&from_pg_array(&numbers)).map_err(|e| corrupt(op, e))?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Postgres `query_canceled`, raised when `statement_timeout` fires.
const PG_QUERY_CANCELED: &str = "57014";
/// Postgres `lock_not_available`.
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> LotoError {
    match &err {
        sqlx::Error::PoolTimedOut => {
            warn!(op, "connection pool acquire timed out");
            LotoError::Unavailable(format!("{op}: connection pool timed out"))
        }
        sqlx::Error::Database(db)
            if matches!(
                db.code().as_deref(),
                Some(PG_QUERY_CANCELED) | Some(PG_LOCK_NOT_AVAILABLE)
            ) =>
        {
            warn!(op, error = %err, "statement timed out");
            LotoError::Unavailable(format!("{op}: statement timed out"))
        }
        _ => {
            error!(op, error = %err, "store failure");
            LotoError::Store(format!("{op}: {err}"))
        }
    }
}

fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
