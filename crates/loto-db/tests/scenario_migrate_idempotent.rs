/// Running migrations twice on the same database must succeed and leave the
/// schema reporting healthy.
///
/// DB-backed test. Skips if LOTO_DATABASE_URL is not set.
#[tokio::test]
async fn migrate_twice_then_status_reports_schema() -> anyhow::Result<()> {
    let url = match std::env::var(loto_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: LOTO_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;

    loto_db::migrate(&pool).await?;
    loto_db::migrate(&pool).await?;

    let st = loto_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_rounds_table);

    let (has_index,): (bool,) = sqlx::query_as(
        "select exists (select 1 from pg_indexes where indexname = 'uq_single_open_round')",
    )
    .fetch_one(&pool)
    .await?;
    assert!(has_index, "single-open-round index missing");

    Ok(())
}
