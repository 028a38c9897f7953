//! CRUD round trips against an in-memory SQLite database
//!
//! Every pool holds exactly one connection so all statements in a test see
//! the same memory database.

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use minorm::models::{business_id, unix_now};
use minorm::{
    execute, select, with_transaction, ConnectOptions, ConnectionPool, DatabaseValue, Field,
    FindOptions, Model, ModelError, PoolConfig, Schema, Transaction,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Visitor {
    id: Option<String>,
    name: Option<String>,
    vip: Option<bool>,
    score: Option<f64>,
    created_at: Option<i64>,
}

impl Model for Visitor {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder("Visitor")
                .table("t_visitors")
                .field("id", Field::string().ddl("varchar(50)").primary_key().default_with(business_id))
                .field("name", Field::string().ddl("varchar(50)"))
                .field("vip", Field::boolean())
                .field("score", Field::float())
                .field("created_at", Field::integer().default_with(unix_now))
                .build()
                .unwrap()
        })
    }
}

fn visitor(name: &str) -> Visitor {
    Visitor {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn memory_options() -> ConnectOptions {
    ConnectOptions::from_url("sqlite::memory:")
        .unwrap()
        .with_max_size(1)
        .with_min_size(1)
        .with_pool_config(PoolConfig {
            idle_timeout: None,
            max_lifetime: None,
            ..PoolConfig::default()
        })
}

async fn memory_pool() -> ConnectionPool {
    let pool = ConnectionPool::connect(memory_options()).await.unwrap();
    Visitor::create_table(&pool).await.unwrap();
    pool
}

async fn count(pool: &ConnectionPool) -> i64 {
    Visitor::get_count(pool, None, &[]).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_save_then_find_round_trip() {
    let pool = memory_pool().await;
    let before = unix_now();

    let mut vic = visitor("vic");
    assert_eq!(vic.save(&pool).await.unwrap(), 1);

    // Defaults were materialized into the instance
    let id = vic.id.clone().expect("save assigns an id");
    assert_eq!(id.len(), 32);
    assert_eq!(vic.vip, Some(false));
    assert_eq!(vic.score, Some(0.0));

    let found = Visitor::find(&pool, id.as_str()).await.unwrap().expect("row exists");
    assert_eq!(found.id.as_deref(), Some(id.as_str()));
    assert_eq!(found.name.as_deref(), Some("vic"));
    assert_eq!(found.vip, Some(false));
    let created_at = found.created_at.unwrap();
    assert!(created_at >= before && created_at - before < 5);
    assert_eq!(found, vic);
}

#[tokio::test]
async fn test_find_missing_or_empty_key_is_none() {
    let pool = memory_pool().await;
    assert!(Visitor::find(&pool, business_id()).await.unwrap().is_none());
    assert!(Visitor::find(&pool, "").await.unwrap().is_none());
    assert!(Visitor::find(&pool, DatabaseValue::Null).await.unwrap().is_none());
    assert!(matches!(
        Visitor::find_or_fail(&pool, "nobody").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_get_count_tracks_inserts() {
    let pool = memory_pool().await;
    assert_eq!(count(&pool).await, 0);

    for name in ["a", "b", "c"] {
        visitor(name).save(&pool).await.unwrap();
    }
    assert_eq!(count(&pool).await, 3);

    let filtered = Visitor::get_count(&pool, Some("`name`<>?"), &["a".into()]).await.unwrap();
    assert_eq!(filtered, Some(2));
}

#[tokio::test]
async fn test_find_all_limits_and_pages() {
    let pool = memory_pool().await;
    for i in 0..7 {
        visitor(&format!("n{}", i)).save(&pool).await.unwrap();
    }

    let all = Visitor::find_all(&pool, FindOptions::new()).await.unwrap();
    assert_eq!(all.len(), 7);

    let limited = Visitor::find_all(&pool, FindOptions::new().limit(5)).await.unwrap();
    assert!(limited.len() <= 5);

    let page = Visitor::find_all(&pool, FindOptions::new().order_by("`name`").limit((2, 3)))
        .await
        .unwrap();
    let names: Vec<_> = page.iter().filter_map(|v| v.name.as_deref()).collect();
    assert_eq!(names, ["n2", "n3", "n4"]);

    let filtered = Visitor::find_all(&pool, FindOptions::new().filter("`name`=?", ["n6"]))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

#[tokio::test]
async fn test_bad_limit_fails_before_querying() {
    let pool = memory_pool().await;
    let acquired = pool.stats().acquire_count;
    let result = Visitor::find_all(&pool, FindOptions::new().limit("bad")).await;
    assert!(matches!(result, Err(ModelError::InvalidArgument(_))));
    assert_eq!(pool.stats().acquire_count, acquired);
}

#[tokio::test]
async fn test_modify_and_remove() {
    let pool = memory_pool().await;
    let mut vic = visitor("vic");
    vic.save(&pool).await.unwrap();
    let id = vic.id.clone().unwrap();

    vic.name = Some("victor".to_string());
    vic.vip = Some(true);
    vic.score = Some(9.5);
    assert_eq!(vic.modify(&pool).await.unwrap(), 1);

    let mut reloaded = visitor("stale");
    reloaded.id = Some(id.clone());
    reloaded.refresh(&pool).await.unwrap();
    assert_eq!(reloaded.name.as_deref(), Some("victor"));
    assert_eq!(reloaded.vip, Some(true));
    assert_eq!(reloaded.score, Some(9.5));

    assert_eq!(vic.remove(&pool).await.unwrap(), 1);
    assert!(Visitor::find(&pool, id.as_str()).await.unwrap().is_none());

    // A second remove matches nothing; reported, not raised
    assert_eq!(vic.remove(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_write_without_autocommit_leaves_no_trace() {
    let pool = memory_pool().await;
    let mut vic = visitor("vic");
    vic.save(&pool).await.unwrap();
    assert_eq!(count(&pool).await, 1);

    // Same primary key again: the insert fails inside its transaction
    let args = [
        DatabaseValue::from("dup"),
        DatabaseValue::Bool(false),
        DatabaseValue::Float64(0.0),
        DatabaseValue::Int64(unix_now()),
        DatabaseValue::from(vic.id.clone()),
    ];
    let result = execute(&pool, Visitor::schema().insert_sql(), &args, false).await;
    assert!(matches!(result, Err(ModelError::Execution(_))));
    assert_eq!(count(&pool).await, 1);

    // The connection is usable again after the rollback
    let rows = select(&pool, "SELECT `name` FROM `t_visitors`", &[], None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name").and_then(DatabaseValue::as_str), Some("vic"));
}

#[tokio::test]
async fn test_cancelled_write_is_rolled_back_and_connection_reused() {
    let pool = memory_pool().await;
    let mut vic = visitor("vic");
    vic.save(&pool).await.unwrap();

    // The created_at subquery walks a long recursive sequence, so the insert
    // is still running inside its transaction when the timeout drops it
    let slow_insert = "INSERT INTO `t_visitors` (`name`, `vip`, `score`, `created_at`, `id`) \
        SELECT 'slow', 0, 0.0, \
        (WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 5000000) \
        SELECT COUNT(*) FROM seq), 'slow-id'";
    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        execute(&pool, slow_insert, &[], false),
    )
    .await;
    assert!(outcome.is_err(), "insert should still be running when cancelled");

    // The single connection went back to the pool without the partial write
    assert_eq!(count(&pool).await, 1);
    assert!(Visitor::find(&pool, "slow-id").await.unwrap().is_none());

    visitor("after").save(&pool).await.unwrap();
    assert_eq!(count(&pool).await, 2);
}

#[tokio::test]
async fn test_with_transaction_rolls_back_every_statement() {
    let pool = memory_pool().await;
    let insert = Visitor::schema().insert_sql();
    let row = |id: &str| {
        vec![
            DatabaseValue::from("tx"),
            DatabaseValue::Bool(false),
            DatabaseValue::Float64(0.0),
            DatabaseValue::Int64(unix_now()),
            DatabaseValue::from(id),
        ]
    };

    let result: Result<(), ModelError> = with_transaction(&pool, |tx| {
        let first = row("one");
        let second = row("one");
        Box::pin(async move {
            tx.execute(insert, &first).await?;
            tx.execute(insert, &second).await?;
            Ok(())
        })
    })
    .await;
    assert!(result.is_err());
    assert_eq!(count(&pool).await, 0);

    let inserted = with_transaction(&pool, |tx| {
        let first = row("one");
        let second = row("two");
        Box::pin(async move { Ok(tx.execute(insert, &first).await? + tx.execute(insert, &second).await?) })
    })
    .await
    .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(count(&pool).await, 2);
}

#[tokio::test]
async fn test_dropped_transaction_is_rolled_back() {
    let pool = memory_pool().await;
    {
        let mut tx = Transaction::begin(&pool).await.unwrap();
        let mut vic = visitor("ghost");
        vic.id = Some(business_id());
        tx.execute(
            "INSERT INTO `t_visitors` (`name`, `vip`, `score`, `created_at`, `id`) VALUES (?, ?, ?, ?, ?)",
            &["ghost".into(), false.into(), 0.0.into(), unix_now().into(), vic.id.clone().into()],
        )
        .await
        .unwrap();
        let seen = tx.select("SELECT `id` FROM `t_visitors`", &[], None).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert!(tx.is_active());
    }
    assert_eq!(count(&pool).await, 0);
}

#[tokio::test]
async fn test_unready_pool_is_rejected() {
    let pool = ConnectionPool::new(memory_options()).unwrap();
    assert!(matches!(
        Visitor::find(&pool, "someone").await,
        Err(ModelError::PoolNotReady)
    ));
    assert!(matches!(
        visitor("early").save(&pool).await,
        Err(ModelError::PoolNotReady)
    ));

    pool.initialize().await.unwrap();
    assert!(matches!(
        pool.initialize().await,
        Err(ModelError::PoolAlreadyInitialized)
    ));
    assert!(pool.health_check().await.is_ok());
    assert_eq!(pool.stats().total_connections, 1);

    pool.close().await;
    assert!(Visitor::find(&pool, "someone").await.is_err());
}
