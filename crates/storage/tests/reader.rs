#![forbid(unsafe_code)]

use dk_storage::{
    AllDocsOptions, AllDocsRow, AllDocsValue, BulkDocsRequest, GetOptions, OpenOptions, SqliteStore,
    StoreError,
};
use serde_json::json;
use std::path::PathBuf;

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

async fn alphabet_store(test_name: &str) -> SqliteStore {
    let store = SqliteStore::open(OpenOptions::new(temp_dir(test_name).join("docs.sqlite")))
        .await
        .expect("open store");
    let docs = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|id| json!({ "_id": id, "letter": id }))
        .collect();
    let results = store
        .bulk_docs(BulkDocsRequest::new(docs))
        .await
        .expect("seed");
    assert!(results.iter().all(|result| result.is_ok()));
    store
}

fn row_ids(rows: &[AllDocsRow]) -> Vec<String> {
    rows.iter().map(|row| row.key.clone()).collect()
}

#[tokio::test]
async fn all_docs_ranges_follow_id_order() {
    let store = alphabet_store("all_docs_ranges_follow_id_order").await;

    let all = store
        .all_docs(AllDocsOptions::default())
        .await
        .expect("all docs");
    assert_eq!(all.total_rows, 5);
    assert_eq!(row_ids(&all.rows), ["a", "b", "c", "d", "e"]);

    let bounded = AllDocsOptions {
        start_key: Some("b".to_string()),
        end_key: Some("d".to_string()),
        inclusive_end: false,
        ..AllDocsOptions::default()
    };
    let page = store.all_docs(bounded).await.expect("range");
    assert_eq!(row_ids(&page.rows), ["b", "c"]);

    let descending = AllDocsOptions {
        start_key: Some("d".to_string()),
        end_key: Some("b".to_string()),
        descending: true,
        skip: 1,
        limit: Some(1),
        ..AllDocsOptions::default()
    };
    let page = store.all_docs(descending).await.expect("descending");
    assert_eq!(row_ids(&page.rows), ["c"]);
    assert_eq!(page.offset, 1);
}

#[tokio::test]
async fn all_docs_keys_report_missing_and_deleted_rows() {
    let store = alphabet_store("all_docs_keys_report_missing_and_deleted_rows").await;
    let b = store.get("b", GetOptions::default()).await.expect("get b");
    let tombstone = store
        .remove("b", b["_rev"].as_str().expect("rev"))
        .await
        .expect("remove b");

    let response = store
        .all_docs(AllDocsOptions {
            keys: Some(vec!["c".to_string(), "zz".to_string(), "b".to_string()]),
            include_docs: true,
            ..AllDocsOptions::default()
        })
        .await
        .expect("keys");
    assert_eq!(response.total_rows, 4);
    assert_eq!(response.rows.len(), 3);

    assert_eq!(response.rows[0].key, "c");
    assert_eq!(
        response.rows[0].doc.as_ref().expect("doc")["letter"],
        "c"
    );

    assert_eq!(response.rows[1].key, "zz");
    assert_eq!(response.rows[1].error, Some("not_found"));
    assert!(response.rows[1].value.is_none());

    assert_eq!(
        response.rows[2].value,
        Some(AllDocsValue {
            rev: tombstone,
            deleted: true,
        })
    );
    assert!(response.rows[2].doc.is_none());

    let listed = store
        .all_docs(AllDocsOptions::default())
        .await
        .expect("all docs");
    assert!(listed.rows.iter().all(|row| row.key != "b"));
}

#[tokio::test]
async fn get_options_add_revisions_and_resolve_latest() {
    let store = SqliteStore::open(OpenOptions::new(
        temp_dir("get_options_add_revisions_and_resolve_latest").join("docs.sqlite"),
    ))
    .await
    .expect("open store");
    let first = store.put(json!({ "_id": "a", "n": 1 })).await.expect("put");
    let second = store
        .put(json!({ "_id": "a", "_rev": first, "n": 2 }))
        .await
        .expect("update");

    let doc = store
        .get(
            "a",
            GetOptions {
                revs: true,
                ..GetOptions::default()
            },
        )
        .await
        .expect("get with revs");
    let hashes = [&second, &first]
        .iter()
        .map(|rev| rev.split_once('-').expect("rev").1.to_string())
        .collect::<Vec<_>>();
    assert_eq!(doc["_revisions"], json!({ "start": 2, "ids": hashes }));

    let latest = store
        .get(
            "a",
            GetOptions {
                rev: Some(first.clone()),
                latest: true,
                ..GetOptions::default()
            },
        )
        .await
        .expect("latest");
    assert_eq!(latest["_rev"], second);

    let missing = store
        .get("nope", GetOptions::default())
        .await
        .expect_err("missing doc");
    assert!(matches!(missing, StoreError::NotFound("missing")));
}

#[tokio::test]
async fn destroy_removes_database_files() {
    let db_path = temp_dir("destroy_removes_database_files").join("docs.sqlite");
    let store = SqliteStore::open(OpenOptions::new(&db_path))
        .await
        .expect("open store");
    store.put(json!({ "_id": "a" })).await.expect("put");
    assert!(db_path.exists());

    store.destroy().await.expect("destroy");
    assert!(!db_path.exists());
    let mut wal = db_path.clone().into_os_string();
    wal.push("-wal");
    assert!(!PathBuf::from(wal).exists());
}
