//! # SQLite Provider Tests
//!
//! Schema bootstrap, transactions and the typed row accessors. Each test
//! works on its own database file in a temporary directory.

use futures::future::join_all;
use kbase::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use kbase::KbError;
use tempfile::TempDir;

async fn provider() -> anyhow::Result<(SqliteProvider, TempDir)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("provider.db");
    let db = SqliteProvider::new(&path.to_string_lossy()).await?;
    db.initialize_schema().await?;
    Ok((db, dir))
}

async fn note_count(db: &SqliteProvider) -> anyhow::Result<i64> {
    let row = db.query_one("SELECT COUNT(*) FROM notes", vec![]).await?;
    Ok(row.map(|r| r.int(0)).transpose()?.unwrap_or(0))
}

#[tokio::test]
async fn schema_bootstrap_is_idempotent_and_seeds_roles_once() -> anyhow::Result<()> {
    let (db, _dir) = provider().await?;
    db.initialize_schema().await?;
    db.initialize_schema().await?;

    let rows = db.query("SELECT name FROM roles ORDER BY name", vec![]).await?;
    let names = rows
        .iter()
        .map(|r| r.text(0))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(names, vec!["admin", "contributor", "super_admin", "viewer"]);
    Ok(())
}

#[tokio::test]
async fn transactions_commit_or_roll_back_as_a_unit() -> anyhow::Result<()> {
    let (db, _dir) = provider().await?;
    db.execute("CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT)", vec![])
        .await?;

    let tx = db.begin().await?;
    let result = async {
        tx.execute(
            "INSERT INTO notes (id, body) VALUES (?, ?)",
            vec![value::text("a"), value::text("kept")],
        )
        .await?;
        Ok::<_, KbError>(())
    }
    .await;
    tx.finish(result).await?;
    assert_eq!(note_count(&db).await?, 1);

    let tx = db.begin().await?;
    let result = async {
        tx.execute(
            "INSERT INTO notes (id, body) VALUES (?, ?)",
            vec![value::text("b"), value::text("discarded")],
        )
        .await?;
        Err::<(), _>(KbError::BadRequest("abort".into()))
    }
    .await;
    let err = tx.finish(result).await.expect_err("rolled back");
    assert!(matches!(err, KbError::BadRequest(_)));
    assert_eq!(note_count(&db).await?, 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_writers_queue_instead_of_failing() -> anyhow::Result<()> {
    let (db, _dir) = provider().await?;
    db.execute("CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT)", vec![])
        .await?;

    let writes = (0..20).map(|i| {
        let db = db.clone();
        async move {
            db.execute(
                "INSERT INTO notes (id, body) VALUES (?, ?)",
                vec![value::text(format!("n{i}")), value::text("x")],
            )
            .await
        }
    });
    for result in join_all(writes).await {
        assert_eq!(result?, 1);
    }
    assert_eq!(note_count(&db).await?, 20);
    Ok(())
}

#[tokio::test]
async fn row_accessors_read_nullable_and_boolean_columns() -> anyhow::Result<()> {
    let (db, _dir) = provider().await?;
    db.execute(
        "CREATE TABLE flags (id TEXT, label TEXT, enabled INTEGER, meta TEXT, at TEXT)",
        vec![],
    )
    .await?;
    db.execute(
        "INSERT INTO flags (id, label, enabled, meta, at) VALUES (?, ?, ?, ?, ?)",
        vec![
            value::text("f1"),
            value::opt_text(None::<String>),
            value::flag(true),
            value::opt_json(Some(&serde_json::json!({ "k": 1 }))),
            value::text("2024-05-01T10:00:00Z"),
        ],
    )
    .await?;

    let row = db
        .query_one("SELECT id, label, enabled, meta, at FROM flags", vec![])
        .await?
        .expect("one row");
    assert_eq!(row.text(0)?, "f1");
    assert_eq!(row.opt_text(1)?, None);
    assert!(row.flag(2)?);
    assert_eq!(row.opt_json(3)?, Some(serde_json::json!({ "k": 1 })));
    assert_eq!(row.ts(4)?.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    Ok(())
}
