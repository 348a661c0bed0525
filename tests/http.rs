//! End-to-end tests for the catalog HTTP server.

use macfreeapps::config::Config;
use macfreeapps::server::{run_server, ADMIN_HEADER};
use serde_json::{json, Value};
use tempfile::TempDir;

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Start a server over a fresh catalog; returns its base URL.
async fn start_server(tmp: &TempDir) -> String {
    let port = find_free_port();
    let mut cfg = Config::minimal();
    cfg.store.path = tmp.path().join("data/macfreeapps_apps.json");
    cfg.server.bind = format!("127.0.0.1:{}", port);
    cfg.admin.password = "s3cret".to_string();

    tokio::spawn(async move {
        run_server(&cfg).await.ok();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

async fn add_app(client: &reqwest::Client, base: &str, body: Value) -> Value {
    let resp = client
        .post(format!("{}/api/apps", base))
        .header(ADMIN_HEADER, "s3cret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_admin_routes_require_password() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/apps", base))
        .header(ADMIN_HEADER, "wrong")
        .json(&json!({ "name": "X", "description": "Y", "icon": "📱" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");

    let apps: Value = reqwest::get(format!("{}/api/apps", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(apps, json!([]));
}

#[tokio::test]
async fn test_crud_flow() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let created = add_app(
        &client,
        &base,
        json!({
            "name": "Raycast",
            "description": "Launcher and productivity tool",
            "icon": "🚀",
            "category": "productivity",
            "downloadUrl": "https://www.raycast.com/"
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["views"], 0);

    let resp = client
        .patch(format!("{}/api/apps/{}", base, id))
        .header(ADMIN_HEADER, "s3cret")
        .json(&json!({ "category": "utilities" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["category"], "utilities");
    assert_eq!(updated["name"], "Raycast");
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let fetched: Value = reqwest::get(format!("{}/api/apps/{}", base, id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, updated);

    let resp = client
        .delete(format!("{}/api/apps/{}", base, id))
        .header(ADMIN_HEADER, "s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(format!("{}/api/apps/{}", base, id)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_validation_error_lists_fields() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/apps", base))
        .header(ADMIN_HEADER, "s3cret")
        .json(&json!({ "name": "", "description": "ok", "icon": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation");
    assert_eq!(body["error"]["message"], "missing required fields: name, icon");
}

#[tokio::test]
async fn test_bad_admin_body_uses_error_contract() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();
    let body = json!({ "name": "X", "description": "Y", "icon": "📱", "category": "games" });

    let resp = client
        .post(format!("{}/api/apps", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "unauthorized");

    let resp = client
        .post(format!("{}/api/apps", base))
        .header(ADMIN_HEADER, "s3cret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "bad_request");
    assert!(err["error"]["message"].as_str().unwrap().contains("games"));

    let resp = client
        .patch(format!("{}/api/apps/any", base))
        .header(ADMIN_HEADER, "s3cret")
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_list_filter_search_and_download() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let first = add_app(
        &client,
        &base,
        json!({ "name": "Inkscape", "description": "Vector graphics", "icon": "✏️",
                "category": "design", "downloadUrl": "https://inkscape.org/" }),
    )
    .await;
    add_app(
        &client,
        &base,
        json!({ "name": "KeePassXC", "description": "Password manager", "icon": "🔒",
                "category": "security" }),
    )
    .await;

    let design: Vec<Value> = reqwest::get(format!("{}/api/apps?category=Tasarım", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(design.len(), 1);
    assert_eq!(design[0]["name"], "Inkscape");

    let resp = reqwest::get(format!("{}/api/apps?category=games", base)).await.unwrap();
    assert_eq!(resp.status(), 400);

    let hits: Vec<Value> = reqwest::get(format!("{}/api/apps/search?q=PASSWORD", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "KeePassXC");

    let id = first["id"].as_str().unwrap();
    for expected in 1..=2 {
        let body: Value = client
            .post(format!("{}/api/apps/{}/download", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["views"], expected);
        assert_eq!(body["downloadUrl"], "https://inkscape.org/");
    }

    let resp = client
        .post(format!("{}/api/apps/missing/download", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let stats: Value = reqwest::get(format!("{}/api/stats", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats, json!({ "totalApps": 2, "totalViews": 2 }));
}

#[tokio::test]
async fn test_index_page_escapes_names() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    add_app(
        &client,
        &base,
        json!({ "name": "<b>Bold</b>", "description": "Tags & more", "icon": "📱" }),
    )
    .await;

    let resp = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("&lt;b&gt;Bold&lt;/b&gt;"));
    assert!(html.contains("Tags &amp; more"));
    assert!(!html.contains("<b>Bold</b>"));
}
