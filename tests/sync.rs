use localnative_core::config::Config;
use localnative_core::error::Error;
use localnative_core::models::NewNote;
use localnative_core::{client, db, notes, server};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn open_store(tmp: &TempDir, name: &str) -> SqlitePool {
    db::open(&Config::with_db_path(tmp.path().join(name)))
        .await
        .unwrap()
}

async fn add(pool: &SqlitePool, title: &str) {
    notes::insert(
        pool,
        &NewNote {
            title: title.to_string(),
            url: format!("https://{}.example", title),
            tags: "sync".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
}

async fn start_server(pool: SqlitePool) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        server::serve(listener, pool).await.unwrap();
    });
    (addr, handle)
}

#[tokio::test]
async fn test_two_way_sync() {
    let tmp = TempDir::new().unwrap();
    let server_pool = open_store(&tmp, "server.sqlite3").await;
    let client_pool = open_store(&tmp, "client.sqlite3").await;

    add(&server_pool, "on-server").await;
    add(&client_pool, "on-client-1").await;
    add(&client_pool, "on-client-2").await;

    let (addr, handle) = start_server(server_pool.clone()).await;

    let report = client::sync(&client_pool, &addr).await.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.received, 1);

    let mut on_server = notes::uuid4_list(&server_pool).await.unwrap();
    let mut on_client = notes::uuid4_list(&client_pool).await.unwrap();
    on_server.sort();
    on_client.sort();
    assert_eq!(on_server.len(), 3);
    assert_eq!(on_server, on_client);

    // Timestamps and content travel unchanged.
    for uuid4 in &on_server {
        let a = notes::get_by_uuid4(&server_pool, uuid4).await.unwrap();
        let b = notes::get_by_uuid4(&client_pool, uuid4).await.unwrap();
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(a.title, b.title);
    }

    let again = client::sync(&client_pool, &addr).await.unwrap();
    assert_eq!(again, client::SyncReport::default());

    client::stop_server(&addr).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_sync_refuses_other_version() {
    let tmp = TempDir::new().unwrap();
    let server_pool = open_store(&tmp, "server.sqlite3").await;
    let client_pool = open_store(&tmp, "client.sqlite3").await;
    add(&client_pool, "stays-home").await;

    sqlx::query("UPDATE meta SET meta_value = '0.5.0' WHERE meta_key = 'version'")
        .execute(&server_pool)
        .await
        .unwrap();

    let (addr, handle) = start_server(server_pool.clone()).await;

    let err = client::sync(&client_pool, &addr).await.unwrap_err();
    match &err {
        Error::VersionMismatch { local, remote } => {
            assert_eq!(local, "0.6.0");
            assert_eq!(remote, "0.5.0");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(notes::uuid4_list(&server_pool).await.unwrap().is_empty());

    client::stop_server(&addr).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_missing_note_is_404() {
    let tmp = TempDir::new().unwrap();
    let pool = open_store(&tmp, "server.sqlite3").await;
    let (addr, handle) = start_server(pool).await;

    let resp = reqwest::get(format!("http://{}/notes/does-not-exist", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let health: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    client::stop_server(&addr).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_malformed_bodies_use_json_error_contract() {
    let tmp = TempDir::new().unwrap();
    let pool = open_store(&tmp, "server.sqlite3").await;
    let (addr, handle) = start_server(pool.clone()).await;
    let http = reqwest::Client::new();

    let missing_fields = http
        .post(format!("http://{}/notes", addr))
        .json(&serde_json::json!({ "uuid4": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_fields.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = missing_fields.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("title"));

    let empty = http
        .post(format!("http://{}/notes", addr))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = empty.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let not_json = http
        .post(format!("http://{}/sync/version", addr))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(not_json.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = not_json.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    assert!(notes::uuid4_list(&pool).await.unwrap().is_empty());

    client::stop_server(&addr).await.unwrap();
    handle.await.unwrap();
}
