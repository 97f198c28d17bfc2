#![forbid(unsafe_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dk_storage::{
    AllDocsOptions, BulkDocsRequest, Change, ChangeRegistry, ChangesOptions, FilterDecision,
    OpenOptions, SqliteStore,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

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

async fn seeded_store(test_name: &str) -> SqliteStore {
    let store = SqliteStore::open(OpenOptions::new(temp_dir(test_name).join("docs.sqlite")))
        .await
        .expect("open store");
    for id in ["a", "b", "c"] {
        store
            .put(json!({ "_id": id, "kind": id }))
            .await
            .expect("seed");
    }
    store
}

#[tokio::test]
async fn one_shot_feed_reports_latest_sequence_per_document() {
    let store = seeded_store("one_shot_feed_reports_latest_sequence_per_document").await;
    let doc = store.get("a", Default::default()).await.expect("get a");
    let rev = doc["_rev"].as_str().expect("rev").to_string();
    store
        .put(json!({ "_id": "a", "_rev": rev, "kind": "a2" }))
        .await
        .expect("update a");

    let all = store
        .changes(ChangesOptions::default())
        .await
        .expect("changes");
    let order = all
        .results
        .iter()
        .map(|change| (change.id.as_str(), change.seq))
        .collect::<Vec<_>>();
    assert_eq!(order, vec![("b", 2), ("c", 3), ("a", 4)]);
    assert_eq!(all.last_seq, 4);
    assert!(all.results.iter().all(|change| change.doc.is_none()));

    let since = store
        .changes(ChangesOptions {
            since: 2,
            limit: Some(1),
            ..ChangesOptions::default()
        })
        .await
        .expect("changes since");
    assert_eq!(since.results.len(), 1);
    assert_eq!(since.results[0].id, "c");
    assert_eq!(since.last_seq, 3);

    let descending = store
        .changes(ChangesOptions {
            descending: true,
            include_docs: true,
            ..ChangesOptions::default()
        })
        .await
        .expect("descending");
    assert_eq!(descending.results[0].id, "a");
    assert_eq!(
        descending.results[0].doc.as_ref().expect("doc")["kind"],
        "a2"
    );
}

#[tokio::test]
async fn filter_can_skip_and_stop_the_feed() {
    let store = seeded_store("filter_can_skip_and_stop_the_feed").await;

    let result = store
        .changes(ChangesOptions {
            filter: Some(Arc::new(|change: &Change| match change.id.as_str() {
                "a" => FilterDecision::Skip,
                "c" => FilterDecision::Stop,
                _ => FilterDecision::Include,
            })),
            ..ChangesOptions::default()
        })
        .await
        .expect("filtered changes");
    assert!(result.stopped);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].id, "b");
    assert_eq!(result.last_seq, 2);
}

#[tokio::test]
async fn filter_sees_the_document_even_without_include_docs() {
    let store = seeded_store("filter_sees_the_document_even_without_include_docs").await;

    let result = store
        .changes(ChangesOptions {
            filter: Some(Arc::new(|change: &Change| {
                let kind = change.doc.as_ref().and_then(|doc| doc["kind"].as_str());
                if kind == Some("b") {
                    FilterDecision::Include
                } else {
                    FilterDecision::Skip
                }
            })),
            ..ChangesOptions::default()
        })
        .await
        .expect("filtered changes");
    assert_eq!(result.results.len(), 1);
    assert!(result.results[0].doc.is_none());
    assert_eq!(result.last_seq, 3);
}

#[tokio::test]
async fn doc_ids_restrict_the_feed() {
    let store = seeded_store("doc_ids_restrict_the_feed").await;
    let result = store
        .changes(ChangesOptions {
            doc_ids: Some(BTreeSet::from(["c".to_string(), "missing".to_string()])),
            ..ChangesOptions::default()
        })
        .await
        .expect("changes");
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].id, "c");
}

#[tokio::test]
async fn deleted_documents_appear_as_deleted_changes() {
    let store = seeded_store("deleted_documents_appear_as_deleted_changes").await;
    let doc = store.get("b", Default::default()).await.expect("get b");
    store
        .remove("b", doc["_rev"].as_str().expect("rev"))
        .await
        .expect("remove b");

    let result = store
        .changes(ChangesOptions {
            since: 3,
            ..ChangesOptions::default()
        })
        .await
        .expect("changes");
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].id, "b");
    assert!(result.results[0].deleted);
    assert!(result.results[0].changes[0].starts_with("2-"));
}

#[tokio::test]
async fn live_feed_delivers_backlog_then_new_commits_in_order() {
    let registry = Arc::new(ChangeRegistry::new());
    let db_path = temp_dir("live_feed_delivers_backlog_then_new_commits_in_order").join("docs.sqlite");
    let store = SqliteStore::open(
        OpenOptions::new(&db_path)
            .name("live-feed")
            .registry(Arc::clone(&registry)),
    )
    .await
    .expect("open store");
    store.put(json!({ "_id": "first" })).await.expect("seed");

    let mut feed = store.live_changes(ChangesOptions::default());
    assert_eq!(registry.subscriber_count("live-feed"), 1);

    let backlog = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .expect("backlog in time")
        .expect("feed open")
        .expect("change");
    assert_eq!(backlog.id, "first");

    for id in ["second", "third"] {
        store.put(json!({ "_id": id })).await.expect("live write");
    }
    let mut seen = Vec::new();
    while seen.len() < 2 {
        let change = tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .expect("live change in time")
            .expect("feed open")
            .expect("change");
        seen.push((change.id, change.seq));
    }
    assert_eq!(
        seen,
        vec![("second".to_string(), 2), ("third".to_string(), 3)]
    );

    feed.cancel();
    assert_eq!(registry.subscriber_count("live-feed"), 0);
}

#[tokio::test]
async fn live_feed_ends_at_limit_and_on_close() {
    let registry = Arc::new(ChangeRegistry::new());
    let store = SqliteStore::open(
        OpenOptions::new(temp_dir("live_feed_ends_at_limit_and_on_close").join("docs.sqlite"))
            .name("limited")
            .registry(Arc::clone(&registry)),
    )
    .await
    .expect("open store");

    let mut limited = store.live_changes(ChangesOptions {
        limit: Some(1),
        ..ChangesOptions::default()
    });
    let mut open_ended = store.live_changes(ChangesOptions::default());

    store.put(json!({ "_id": "one" })).await.expect("write one");
    store.put(json!({ "_id": "two" })).await.expect("write two");

    let only = tokio::time::timeout(Duration::from_secs(5), limited.next())
        .await
        .expect("limited in time")
        .expect("feed open")
        .expect("change");
    assert_eq!(only.id, "one");
    let ended = tokio::time::timeout(Duration::from_secs(5), limited.next())
        .await
        .expect("limited ends in time");
    assert!(ended.is_none());

    let mut delivered = 0;
    while delivered < 2 {
        tokio::time::timeout(Duration::from_secs(5), open_ended.next())
            .await
            .expect("open feed in time")
            .expect("feed open")
            .expect("change");
        delivered += 1;
    }

    store.close().await;
    let closed = tokio::time::timeout(Duration::from_secs(5), open_ended.next())
        .await
        .expect("feed ends after close");
    assert!(closed.is_none());
}

#[tokio::test]
async fn feeds_inline_attachment_data_when_asked() {
    let registry = Arc::new(ChangeRegistry::new());
    let store = SqliteStore::open(
        OpenOptions::new(temp_dir("feeds_inline_attachment_data_when_asked").join("docs.sqlite"))
            .name("attachments")
            .registry(Arc::clone(&registry)),
    )
    .await
    .expect("open store");
    let data = BASE64.encode(b"attached bytes");
    let with_attachments = ChangesOptions {
        include_docs: true,
        attachments: true,
        ..ChangesOptions::default()
    };

    store
        .put(json!({
            "_id": "first",
            "_attachments": { "note.txt": { "content_type": "text/plain", "data": data } }
        }))
        .await
        .expect("put first");
    let one_shot = store
        .changes(with_attachments.clone())
        .await
        .expect("changes");
    let doc = one_shot.results[0].doc.as_ref().expect("doc");
    assert_eq!(doc["_attachments"]["note.txt"]["data"], data);

    let stubs_only = store
        .changes(ChangesOptions {
            include_docs: true,
            ..ChangesOptions::default()
        })
        .await
        .expect("changes");
    let stub = &stubs_only.results[0].doc.as_ref().expect("doc")["_attachments"]["note.txt"];
    assert_eq!(stub["stub"], true);
    assert!(stub.get("data").is_none());

    let mut feed = store.live_changes(ChangesOptions {
        since: one_shot.last_seq,
        ..with_attachments
    });
    store
        .put(json!({
            "_id": "second",
            "_attachments": { "note.txt": { "content_type": "text/plain", "data": data } }
        }))
        .await
        .expect("put second");
    let change = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .expect("live change in time")
        .expect("feed open")
        .expect("change");
    assert_eq!(change.id, "second");
    let doc = change.doc.expect("doc");
    assert_eq!(doc["_attachments"]["note.txt"]["data"], data);
}

#[tokio::test]
async fn local_documents_stay_out_of_feeds_and_listings() {
    let registry = Arc::new(ChangeRegistry::new());
    let store = SqliteStore::open(
        OpenOptions::new(
            temp_dir("local_documents_stay_out_of_feeds_and_listings").join("docs.sqlite"),
        )
        .name("locals")
        .registry(Arc::clone(&registry)),
    )
    .await
    .expect("open store");

    let results = store
        .bulk_docs(BulkDocsRequest::new(vec![
            json!({ "_id": "_local/checkpoint", "seq": 1 }),
            json!({ "_id": "shared" }),
        ]))
        .await
        .expect("mixed batch");
    assert!(results.iter().all(|result| result.is_ok()));

    let feed = store
        .changes(ChangesOptions::default())
        .await
        .expect("changes");
    let ids = feed
        .results
        .iter()
        .map(|change| change.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["shared"]);
    assert_eq!(feed.last_seq, 1);

    let listed = store
        .all_docs(AllDocsOptions::default())
        .await
        .expect("all docs");
    assert_eq!(listed.total_rows, 1);
    assert_eq!(listed.rows.len(), 1);
    assert_eq!(listed.rows[0].key, "shared");

    let watcher = registry.subscribe("locals");
    store
        .put_local(json!({ "_id": "_local/checkpoint", "_rev": "0-1", "seq": 2 }))
        .await
        .expect("local-only write");
    let woken = tokio::time::timeout(Duration::from_millis(200), watcher.notify.notified()).await;
    assert!(woken.is_err(), "local-only write must not wake live feeds");

    store.put(json!({ "_id": "visible" })).await.expect("put");
    tokio::time::timeout(Duration::from_secs(5), watcher.notify.notified())
        .await
        .expect("normal write wakes live feeds");
    registry.unsubscribe("locals", watcher.id);
}
