//! Round lifecycle and ticket registry against a real Postgres.
//!
//! DB-backed tests. Each skips if LOTO_DATABASE_URL is not set. They wipe the
//! `rounds` and `tickets` tables, so point LOTO_DATABASE_URL at a dedicated
//! test database.

use std::sync::Arc;
use std::time::Duration;

use loto_core::{
    CloseOutcome, DrawnNumbers, LotoError, LotoStore, OpenOutcome, OwnerId, TicketDraft,
    TicketNumbers,
};
use loto_db::{PgStore, LIFECYCLE_LOCK_KEY};
use sqlx::PgPool;
use tokio::sync::Mutex;

/// The single-open-round rule is global, so scenarios in this binary run one
/// at a time.
static DB_GUARD: Mutex<()> = Mutex::const_new(());

async fn fresh_store() -> anyhow::Result<Option<(PgPool, PgStore)>> {
    fresh_store_with_timeout(Duration::from_secs(5)).await
}

async fn fresh_store_with_timeout(
    statement_timeout: Duration,
) -> anyhow::Result<Option<(PgPool, PgStore)>> {
    let url = match std::env::var(loto_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: LOTO_DATABASE_URL not set");
            return Ok(None);
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await?;
    loto_db::migrate(&pool).await?;

    sqlx::query("delete from tickets").execute(&pool).await?;
    sqlx::query("delete from rounds").execute(&pool).await?;

    let store = PgStore::new(pool.clone(), statement_timeout);
    Ok(Some((pool, store)))
}

async fn open_rounds(pool: &PgPool) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as("select count(*)::bigint from rounds where closed = false")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn draft(owner: &str, csv: &str) -> TicketDraft {
    TicketDraft::new(
        OwnerId::new(owner).expect("valid owner"),
        TicketNumbers::from_csv(csv).expect("valid picks"),
    )
}

#[tokio::test]
async fn lifecycle_open_close_results_once() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((pool, store)) = fresh_store().await? else {
        return Ok(());
    };

    assert_eq!(store.close_round().await?, CloseOutcome::NothingOpen);

    let first = store.open_round().await?;
    let id = first.round_id();
    assert!(matches!(first, OpenOutcome::Opened(_)));
    assert_eq!(store.open_round().await?, OpenOutcome::AlreadyOpen(id));
    assert_eq!(open_rounds(&pool).await?, 1);

    let drawn = DrawnNumbers::from_list(&[7, 19, 25, 1, 2, 3])?;
    let err = store.store_results(&drawn).await.unwrap_err();
    assert!(matches!(err, LotoError::InvalidState { .. }));

    assert_eq!(store.close_round().await?, CloseOutcome::Closed(id));
    assert_eq!(store.store_results(&drawn).await?, id);

    let err = store.store_results(&drawn).await.unwrap_err();
    assert!(matches!(err, LotoError::InvalidState { round_id: Some(r), .. } if r == id));

    let status = store.ticket_status().await?;
    assert!(status.active_round.is_none());
    assert_eq!(status.results, Some(drawn));
    Ok(())
}

#[tokio::test]
async fn schema_rejects_a_second_open_round() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((pool, store)) = fresh_store().await? else {
        return Ok(());
    };

    store.open_round().await?;
    let res = sqlx::query("insert into rounds (id) values ($1)")
        .bind(uuid::Uuid::new_v4())
        .execute(&pool)
        .await;
    assert!(res.is_err(), "partial unique index must reject a second open round");
    Ok(())
}

#[tokio::test]
async fn tickets_bind_to_open_round_and_are_found_with_it() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((_pool, store)) = fresh_store().await? else {
        return Ok(());
    };

    let err = store.insert_ticket(draft("A123", "1,2,3,4,5,6")).await.unwrap_err();
    assert!(matches!(err, LotoError::NoActiveRound));

    let round_id = store.open_round().await?.round_id();
    let pending = draft("A123", "40,3,25,7,19,12");
    let pending_id = pending.id;
    let ticket = store.insert_ticket(pending).await?;
    assert_eq!(ticket.id, pending_id);
    assert_eq!(ticket.round_id, round_id);

    let status = store.ticket_status().await?;
    assert_eq!(status.ticket_count, 1);
    assert_eq!(status.active_round.map(|r| r.id), Some(round_id));

    let (found, round) = store.find_ticket(ticket.id).await?.expect("ticket exists");
    assert_eq!(found.numbers.as_slice(), &[3, 7, 12, 19, 25, 40]);
    assert_eq!(found.owner_id.as_str(), "A123");
    assert_eq!(round.id, round_id);
    assert!(!round.closed);

    assert!(store.find_ticket(uuid::Uuid::new_v4()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn concurrent_opens_create_exactly_one_round() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((pool, store)) = fresh_store().await? else {
        return Ok(());
    };
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.open_round().await }));
    }

    let mut opened = 0;
    for h in handles {
        if let OpenOutcome::Opened(_) = h.await?? {
            opened += 1;
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(open_rounds(&pool).await?, 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_results_succeed_once() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((_pool, store)) = fresh_store().await? else {
        return Ok(());
    };
    store.open_round().await?;
    store.close_round().await?;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..6_i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let drawn = DrawnNumbers::from_list(&[1, 2, 3, 4, 5, 10 + i]).expect("valid draw");
            store.store_results(&drawn).await
        }));
    }

    let mut ok = 0;
    for h in handles {
        match h.await? {
            Ok(_) => ok += 1,
            Err(LotoError::InvalidState { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 1);
    Ok(())
}

#[tokio::test]
async fn tickets_racing_a_close_land_in_the_closed_round_or_are_refused() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((pool, store)) = fresh_store().await? else {
        return Ok(());
    };
    let round_id = store.open_round().await?.round_id();
    let store = Arc::new(store);

    let mut inserts = Vec::new();
    for i in 0..6_i64 {
        let store = store.clone();
        inserts.push(tokio::spawn(async move {
            let csv = format!("1,2,3,4,5,{}", 10 + i);
            store.insert_ticket(draft("A123", &csv)).await
        }));
    }
    let closer = {
        let store = store.clone();
        tokio::spawn(async move { store.close_round().await })
    };

    let mut issued = 0_i64;
    for h in inserts {
        match h.await? {
            Ok(ticket) => {
                assert_eq!(ticket.round_id, round_id);
                issued += 1;
            }
            Err(LotoError::NoActiveRound) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(closer.await??, CloseOutcome::Closed(round_id));

    let (persisted, foreign): (i64, i64) = sqlx::query_as(
        "select count(*)::bigint, count(*) filter (where round_id <> $1)::bigint from tickets",
    )
    .bind(round_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(persisted, issued);
    assert_eq!(foreign, 0);

    // Closed is final: nothing is accepted after the race.
    let err = store.insert_ticket(draft("A123", "1,2,3,4,5,6")).await.unwrap_err();
    assert!(matches!(err, LotoError::NoActiveRound));
    Ok(())
}

#[tokio::test]
async fn lifecycle_lock_wait_past_statement_timeout_is_unavailable() -> anyhow::Result<()> {
    let _g = DB_GUARD.lock().await;
    let Some((_pool, store)) = fresh_store_with_timeout(Duration::from_millis(200)).await? else {
        return Ok(());
    };

    // Another session holds the lifecycle lock for the whole attempt.
    let mut holder = store.pool().begin().await?;
    sqlx::query("select pg_advisory_xact_lock($1)")
        .bind(LIFECYCLE_LOCK_KEY)
        .execute(&mut *holder)
        .await?;

    let err = store.open_round().await.unwrap_err();
    assert!(matches!(err, LotoError::Unavailable(_)), "got {err:?}");

    holder.rollback().await?;
    assert!(matches!(store.open_round().await?, OpenOutcome::Opened(_)));
    Ok(())
}
