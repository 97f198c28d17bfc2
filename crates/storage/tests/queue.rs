#![forbid(unsafe_code)]

use dk_storage::{OpenOptions, SqliteStore, StoreError, TxOutcome};
use rusqlite::params;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("dk_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

async fn open_store(test_name: &str) -> SqliteStore {
    let db_path = temp_dir(test_name).join("docs.sqlite");
    SqliteStore::open(OpenOptions::new(db_path))
        .await
        .expect("open store")
}

#[tokio::test]
async fn operations_run_in_submission_order() {
    let store = Arc::new(open_store("operations_run_in_submission_order").await);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut pending = Vec::new();
    for index in 0..16 {
        let order = Arc::clone(&order);
        let future = {
            let store = Arc::clone(&store);
            async move {
                store
                    .queue()
                    .enqueue_write(move |_tx| {
                        order.lock().expect("order lock").push(index);
                        Ok(())
                    })
                    .await
            }
        };
        pending.push(future);
    }
    for result in futures_join_all(pending).await {
        result.expect("queued write");
    }

    let observed = order.lock().expect("order lock").clone();
    assert_eq!(observed, (0..16).collect::<Vec<_>>());
}

async fn futures_join_all<F, T>(futures: Vec<F>) -> Vec<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    // Spawning in order queues the submissions in order on a current-thread runtime.
    let handles = futures.into_iter().map(tokio::spawn).collect::<Vec<_>>();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.expect("task joined"));
    }
    out
}

#[tokio::test]
async fn failed_write_rolls_back_and_queue_keeps_going() {
    let store = open_store("failed_write_rolls_back_and_queue_keeps_going").await;

    let err = store
        .queue()
        .enqueue_write(|tx| {
            tx.execute(
                "INSERT INTO local_store(id, rev, json) VALUES (?1, '0-1', '{}')",
                params!["_local/rolled_back"],
            )?;
            Err::<(), _>(StoreError::InvalidInput("abort on purpose"))
        })
        .await
        .expect_err("write must fail");
    assert!(matches!(err, StoreError::InvalidInput("abort on purpose")));

    let missing = store.get_local("_local/rolled_back").await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    let rev = store
        .put_local(json!({ "_id": "_local/after", "n": 1 }))
        .await
        .expect("queue still serves writes");
    assert_eq!(rev, "0-1");
}

#[tokio::test]
async fn panicking_write_is_contained() {
    let store = open_store("panicking_write_is_contained").await;

    let err = store
        .queue()
        .enqueue_write(|tx| -> Result<(), StoreError> {
            tx.execute(
                "INSERT INTO local_store(id, rev, json) VALUES ('_local/panic', '0-1', '{}')",
                [],
            )?;
            panic!("boom");
        })
        .await
        .expect_err("panic becomes an error");
    assert!(matches!(err, StoreError::Internal(_)));

    assert!(matches!(
        store.get_local("_local/panic").await,
        Err(StoreError::NotFound(_))
    ));
    store
        .put(json!({ "_id": "still-alive" }))
        .await
        .expect("queue survives the panic");
}

#[tokio::test]
async fn second_terminal_call_is_rejected() {
    let store = open_store("second_terminal_call_is_rejected").await;

    let (first, second, outcome) = store
        .queue()
        .enqueue_write(|tx| {
            let first = tx.commit();
            let second = tx.commit();
            Ok((first.is_ok(), second, tx.outcome()))
        })
        .await
        .expect("write closure");
    assert!(first);
    assert!(matches!(second, Err(StoreError::TransactionFinished)));
    assert_eq!(outcome, Some(TxOutcome::Committed));
}

#[tokio::test]
async fn explicit_rollback_discards_changes() {
    let store = open_store("explicit_rollback_discards_changes").await;

    let outcome = store
        .queue()
        .enqueue_write(|tx| {
            tx.execute(
                "INSERT INTO local_store(id, rev, json) VALUES ('_local/gone', '0-1', '{}')",
                [],
            )?;
            tx.rollback()?;
            assert!(tx.is_finished());
            Ok(tx.outcome())
        })
        .await
        .expect("write closure");
    assert_eq!(outcome, Some(TxOutcome::RolledBack));

    let count = store
        .queue()
        .enqueue_read(|conn| {
            Ok(conn.query_row("SELECT COUNT(1) FROM local_store", [], |row| {
                row.get::<_, i64>(0)
            })?)
        })
        .await
        .expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn read_only_store_rejects_writes_before_dispatch() {
    let db_path = temp_dir("read_only_store_rejects_writes_before_dispatch").join("docs.sqlite");
    let writer = SqliteStore::open(OpenOptions::new(&db_path))
        .await
        .expect("open writer");
    writer
        .put(json!({ "_id": "a", "v": 1 }))
        .await
        .expect("seed");
    writer.close().await;

    let reader = SqliteStore::open(OpenOptions::new(&db_path).read_only(true))
        .await
        .expect("open read-only");
    assert!(reader.is_read_only());

    let err = reader
        .put(json!({ "_id": "b" }))
        .await
        .expect_err("read-only write");
    assert!(matches!(err, StoreError::ReadOnly));

    let doc = reader
        .get("a", Default::default())
        .await
        .expect("reads still work");
    assert_eq!(doc["v"], 1);
}

#[tokio::test]
async fn closed_store_rejects_new_work() {
    let store = open_store("closed_store_rejects_new_work").await;
    store.put(json!({ "_id": "a" })).await.expect("put");
    store.close().await;

    let err = store.info().await.expect_err("closed");
    assert!(matches!(err, StoreError::Closed));
}
