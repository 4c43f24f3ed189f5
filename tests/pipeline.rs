//! Library-level tests of the ingestion and export pipeline against a real
//! SQLite database.

use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use vector_sync::config::Config;
use vector_sync::db;
use vector_sync::error::IngestError;
use vector_sync::export::{export_batch, HttpTransport};
use vector_sync::get::{get_context, set_published};
use vector_sync::ingest::{import_payload, upsert_payload};
use vector_sync::migrate;
use vector_sync::sqlite_store::SqliteStore;
use vector_sync_core::export::ExportOutcome;
use vector_sync_core::models::{ContextRecord, TermCategory};
use vector_sync_core::store::{ContextRepository, TermStore};
use vector_sync_core::upsert::UpsertResolver;

type Received = Arc<Mutex<Vec<(Option<String>, Value)>>>;

fn test_config(tmp: &TempDir, endpoint: &str) -> Config {
    let db_path = tmp.path().join("vsync.sqlite");
    let config_content = format!(
        r#"
[db]
path = "{}"

[sync]
api_key = "test-key"
endpoint_url = "{}"
timeout_secs = 5
batch_size = 50
"#,
        db_path.display(),
        endpoint
    );
    toml::from_str(&config_content).unwrap()
}

async fn setup(endpoint: &str) -> (TempDir, Config, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, endpoint);
    migrate::run_migrations(&cfg).await.unwrap();
    let pool = db::connect(&cfg).await.unwrap();
    (tmp, cfg, SqliteStore::new(pool))
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a stand-in for the remote run endpoint that records every request.
async fn spawn_remote(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let app = Router::new().route(
        "/runs/wait",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                let key = headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                sink.lock().unwrap().push((key, body));
                (status, Json(json!({ "ok": status.is_success() })))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/", addr), received)
}

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn count(store: &SqliteStore, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(store.pool()).await.unwrap()
}

#[tokio::test]
async fn test_migrations_idempotent() {
    let (_tmp, cfg, _store) = setup("http://127.0.0.1:1").await;
    migrate::run_migrations(&cfg).await.unwrap();
}

#[tokio::test]
async fn test_reference_fingerprint_is_stored() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    let outcome = upsert_payload(
        &store,
        r#"{"title":"Hello <b>World</b>","description":" Some Text ","tags":["x","y"],"agents":["Bot"]}"#,
    )
    .await
    .unwrap();

    assert!(outcome.was_created);
    assert_eq!(
        outcome.record.fingerprint,
        sha256_hex("bot|x,y|hello world|some text")
    );
    // Stored text is the raw input, not the normalized form.
    assert_eq!(outcome.record.title, "Hello <b>World</b>");
}

#[tokio::test]
async fn test_upsert_twice_yields_one_record() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;
    let payload = r#"{"title":"Deploy","description":"Use Docker","tags":["ops"],"agents":["bot"]}"#;

    let first = upsert_payload(&store, payload).await.unwrap();
    let second = upsert_payload(&store, payload).await.unwrap();

    assert!(first.was_created);
    assert!(!second.was_created);
    assert_eq!(first.record.id, second.record.id);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM contexts").await, 1);
    assert_eq!(store.revisions(&first.record.id).await.unwrap().len(), 2);

    let stored = store.get(&first.record.id).await.unwrap().unwrap();
    assert_eq!(stored.revision_id, second.revision_id);
    assert_eq!(stored.created_at, first.record.created_at);
}

#[tokio::test]
async fn test_reordered_and_recased_item_updates_existing() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    let first = upsert_payload(
        &store,
        r#"{"title":"Runbook","description":"Restart the <em>service</em>","tags":["Foo","Bar"],"agents":["Ops"]}"#,
    )
    .await
    .unwrap();
    let second = upsert_payload(
        &store,
        r#"{"title":"RUNBOOK ","description":"restart the service","tags":["bar","foo"],"agents":["ops"]}"#,
    )
    .await
    .unwrap();

    assert!(!second.was_created);
    assert_eq!(first.record.id, second.record.id);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM contexts").await, 1);

    let stored = get_context(&store, &first.record.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "RUNBOOK ");
    assert_eq!(stored.tags, vec!["bar", "foo"]);
    assert_eq!(stored.agents, vec!["ops"]);
    assert_eq!(stored.revisions, 2);
}

/// Term storage is case-sensitive while fingerprints are not: "Foo" and
/// "foo" become two terms but the same record.
#[tokio::test]
async fn test_case_variants_are_distinct_terms() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    upsert_payload(&store, r#"{"title":"T","description":"D","tags":["Foo"]}"#)
        .await
        .unwrap();
    upsert_payload(&store, r#"{"title":"T","description":"D","tags":["foo"]}"#)
        .await
        .unwrap();

    let upper = store.find_terms(TermCategory::Tag, "Foo").await.unwrap();
    let lower = store.find_terms(TermCategory::Tag, "foo").await.unwrap();
    assert_eq!(upper.len(), 1);
    assert_eq!(lower.len(), 1);
    assert_ne!(upper[0].id, lower[0].id);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM terms").await, 2);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM contexts").await, 1);
}

/// Nothing prevents two records from sharing a fingerprint; an upsert then
/// rewrites the oldest and leaves the other alone.
#[tokio::test]
async fn test_shared_fingerprint_updates_oldest_record() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    let older = store
        .save(ContextRecord::new("old", "d", vec![], vec![], "dup"))
        .await
        .unwrap()
        .record;
    let newer = store
        .save(ContextRecord::new("new", "d", vec![], vec![], "dup"))
        .await
        .unwrap()
        .record;
    assert_eq!(store.find_by_fingerprint("dup").await.unwrap().len(), 2);

    let tag = store.create_term(TermCategory::Tag, "t").await.unwrap();
    let out = UpsertResolver::new(&store)
        .upsert("dup", "replaced", "d2", vec![], vec![tag.id])
        .await
        .unwrap();

    assert!(!out.was_created);
    assert_eq!(out.record.id, older.id);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM contexts").await, 2);

    let untouched = store.get(&newer.id).await.unwrap().unwrap();
    assert_eq!(untouched, newer);
    assert_eq!(store.revisions(&newer.id).await.unwrap().len(), 1);

    let updated = store.get(&older.id).await.unwrap().unwrap();
    assert_eq!(updated.title, "replaced");
    assert_eq!(updated.tag_ids, vec![tag.id]);
    assert_eq!(store.revisions(&older.id).await.unwrap().len(), 2);
}

/// Payloads that differ only in markup edge cases land on the same record.
#[tokio::test]
async fn test_markup_edge_cases_share_fingerprint() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    let first = upsert_payload(&store, r#"{"title":"a<b<c>d>e","description":"ends with"}"#)
        .await
        .unwrap();
    let second = upsert_payload(&store, r#"{"title":"ae","description":"ends with <"}"#)
        .await
        .unwrap();

    assert!(!second.was_created);
    assert_eq!(first.record.id, second.record.id);
    assert_eq!(first.record.fingerprint, sha256_hex("||ae|ends with"));
}

#[tokio::test]
async fn test_numeric_title_is_accepted_as_text() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    let numeric = upsert_payload(&store, r#"{"title":5,"description":"D"}"#)
        .await
        .unwrap();
    let text = upsert_payload(&store, r#"{"title":"5","description":"D"}"#)
        .await
        .unwrap();

    assert_eq!(numeric.record.title, "5");
    assert!(!text.was_created);
    assert_eq!(numeric.record.id, text.record.id);
}

#[tokio::test]
async fn test_invalid_upsert_payloads() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    for raw in [
        "not json",
        r#"{"title":"T"}"#,
        r#"{"title":"","description":"D"}"#,
        r#"{"title":"0","description":"D"}"#,
        r#"[]"#,
    ] {
        let err = upsert_payload(&store, raw).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::InvalidPayload)
        );
    }
    assert_eq!(count(&store, "SELECT COUNT(*) FROM contexts").await, 0);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM terms").await, 0);
}

#[tokio::test]
async fn test_bulk_import_counts() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;
    let payload = r#"{"items":[
        {"title":"A","text":"alpha","tags":["x"],"agents":["bot"]},
        {"title":"B","text":"beta"},
        {"title":"a","text":"ALPHA","tags":["X"],"agents":["Bot"]}
    ]}"#;

    let summary = import_payload(&store, payload).await.unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 1);

    let again = import_payload(&store, payload).await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.updated, 3);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM contexts").await, 2);
}

#[tokio::test]
async fn test_bulk_import_missing_items() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    for raw in [r#"{"records":[]}"#, "{", r#"{"items":"x"}"#] {
        let err = import_payload(&store, raw).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::InvalidStructure)
        );
        assert_eq!(err.to_string(), "Invalid JSON structure.");
    }
}

#[tokio::test]
async fn test_bulk_import_malformed_item_flows_through() {
    let (_tmp, _cfg, store) = setup("http://127.0.0.1:1").await;

    let summary = import_payload(&store, r#"{"items":[{"tags":["orphan"]}]}"#)
        .await
        .unwrap();
    assert_eq!(summary.created, 1);

    let records = store.find_by_fingerprint(&sha256_hex("|orphan||")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "");
    assert_eq!(records[0].description, "");
}

#[tokio::test]
async fn test_export_sends_envelope() {
    let (endpoint, received) = spawn_remote(StatusCode::OK).await;
    let (_tmp, cfg, store) = setup(&endpoint).await;

    import_payload(
        &store,
        r#"{"items":[
            {"title":"First","text":"one","tags":["a","b"],"agents":["bot"]},
            {"title":"Second","text":"two"}
        ]}"#,
    )
    .await
    .unwrap();

    let transport = HttpTransport::new(&cfg.sync).unwrap();
    assert!(transport.url().ends_with("/runs/wait"));
    assert!(!transport.url().contains("//runs"));

    let outcome = export_batch(&cfg, &store, &transport, None).await.unwrap();
    let batch_id = match outcome {
        ExportOutcome::Sent { count, batch_id } => {
            assert_eq!(count, 2);
            batch_id
        }
        other => panic!("unexpected outcome: {:?}", other),
    };

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (key, body) = &received[0];
    assert_eq!(key.as_deref(), Some("test-key"));
    assert_eq!(body["assistant_id"], "vector_writer");
    assert_eq!(body["on_completion"], "delete");
    assert_eq!(body["metadata"]["source"], "drupal");
    assert_eq!(body["metadata"]["content_type"], "context");
    assert_eq!(body["metadata"]["batch_id"], batch_id.as_str());

    let items = body["input"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Second");
    assert_eq!(items[1]["title"], "First");
    assert_eq!(items[1]["text"], "one");
    assert_eq!(items[1]["tags"], json!(["a", "b"]));
    assert_eq!(items[1]["agents"], json!(["bot"]));
    assert!(items[1]["uuid"].as_str().unwrap().len() == 36);
    assert!(items[1]["changed"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_export_skips_unpublished() {
    let (endpoint, received) = spawn_remote(StatusCode::OK).await;
    let (_tmp, cfg, store) = setup(&endpoint).await;

    let visible = upsert_payload(&store, r#"{"title":"Visible","description":"v"}"#)
        .await
        .unwrap();
    let hidden = upsert_payload(&store, r#"{"title":"Hidden","description":"h"}"#)
        .await
        .unwrap();
    set_published(&store, &hidden.record.id, false).await.unwrap();

    let transport = HttpTransport::new(&cfg.sync).unwrap();
    let outcome = export_batch(&cfg, &store, &transport, Some(10)).await.unwrap();
    assert!(matches!(outcome, ExportOutcome::Sent { count: 1, .. }));

    let received = received.lock().unwrap();
    let items = received[0].1["input"]["items"].as_array().unwrap();
    assert_eq!(items[0]["uuid"], visible.record.id.as_str());
}

#[tokio::test]
async fn test_export_empty_and_zero_limit() {
    let (endpoint, received) = spawn_remote(StatusCode::OK).await;
    let (_tmp, cfg, store) = setup(&endpoint).await;
    let transport = HttpTransport::new(&cfg.sync).unwrap();

    let outcome = export_batch(&cfg, &store, &transport, None).await.unwrap();
    assert_eq!(outcome, ExportOutcome::Empty);

    upsert_payload(&store, r#"{"title":"T","description":"D"}"#)
        .await
        .unwrap();
    let outcome = export_batch(&cfg, &store, &transport, Some(0)).await.unwrap();
    assert_eq!(outcome, ExportOutcome::Empty);

    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_export_remote_error_is_reported() {
    let (endpoint, _received) = spawn_remote(StatusCode::INTERNAL_SERVER_ERROR).await;
    let (_tmp, cfg, store) = setup(&endpoint).await;
    upsert_payload(&store, r#"{"title":"T","description":"D"}"#)
        .await
        .unwrap();

    let transport = HttpTransport::new(&cfg.sync).unwrap();
    match export_batch(&cfg, &store, &transport, None).await.unwrap() {
        ExportOutcome::Failed { message } => assert!(message.contains("500"), "{}", message),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_export_unreachable_endpoint_is_reported() {
    let port = find_free_port();
    let (_tmp, cfg, store) = setup(&format!("http://127.0.0.1:{}", port)).await;
    upsert_payload(&store, r#"{"title":"T","description":"D"}"#)
        .await
        .unwrap();

    let transport = HttpTransport::new(&cfg.sync).unwrap();
    let outcome = export_batch(&cfg, &store, &transport, None).await.unwrap();
    assert!(matches!(outcome, ExportOutcome::Failed { .. }));
}
