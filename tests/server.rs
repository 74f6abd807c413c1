//! HTTP round trips against a server bound to a free local port.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;

use catalog_store::config::Config;
use catalog_store::{migrate, open_catalog, server};

fn test_config(tmp: &TempDir, max_upload_bytes: usize) -> Config {
    let root = tmp.path();
    let config_content = format!(
        r#"
[db]
path = "{}"

[blobs]
root = "{}"

[server]
bind = "127.0.0.1:0"
max_upload_bytes = {}
"#,
        root.join("catalog.sqlite").display(),
        root.join("images").display(),
        max_upload_bytes
    );
    toml::from_str(&config_content).unwrap()
}

/// Start the router on an ephemeral port and return its base URL.
async fn start_server(cfg: &Config) -> (String, tokio::task::JoinHandle<()>) {
    migrate::run_migrations(cfg).await.unwrap();
    let catalog = open_catalog(cfg).await.unwrap();
    let app = server::router(catalog, cfg.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    wait_for_server(port).await;
    (format!("http://127.0.0.1:{}", port), handle)
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

fn upload_form(name: &str, category: &str, image: &[u8]) -> Form {
    Form::new()
        .text("name", name.to_string())
        .text("category", category.to_string())
        .part(
            "image",
            Part::bytes(image.to_vec())
                .file_name("upload.jpg")
                .mime_str("image/jpeg")
                .unwrap(),
        )
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_item_lifecycle_over_http() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, 1 << 20);
    let (base, handle) = start_server(&cfg).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/items", base))
        .multipart(upload_form("Red Shirt", "Clothing", b"jpeg bytes"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["id"], 1);
    assert_eq!(created["name"], "Red Shirt");
    assert_eq!(created["category"], "Clothing");
    let image_name = created["image_name"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/items", base))
        .multipart(upload_form("Blue Shirt", "Clothing", b"jpeg bytes"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["image_name"], image_name.as_str());
    assert_eq!(second["category_id"], created["category_id"]);

    let list: Value = client
        .get(format!("{}/items", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["items"].as_array().unwrap().len(), 2);

    let search: Value = client
        .get(format!("{}/search?keyword=SHIRT", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(search["items"].as_array().unwrap().len(), 2);

    let image = client
        .get(format!("{}/images/{}", base, image_name))
        .send()
        .await
        .unwrap();
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()["content-type"], "image/jpeg");
    assert_eq!(image.bytes().await.unwrap().as_ref(), b"jpeg bytes");

    let resp = client
        .delete(format!("{}/items/1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{}/items/1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let categories: Value = client
        .get(format!("{}/categories", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories["categories"][0]["name"], "Clothing");

    handle.abort();
}

#[tokio::test]
async fn test_bad_requests_name_the_problem() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, 1 << 20);
    let (base, handle) = start_server(&cfg).await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .text("name", "Orphan".to_string())
        .part("image", Part::bytes(b"x".to_vec()).file_name("x.jpg"));
    let resp = client
        .post(format!("{}/items", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("category"));

    let resp = client
        .get(format!("{}/search?keyword=", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(format!("{}/images/..%2Fcatalog.sqlite", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let list: Value = client
        .get(format!("{}/items", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list["items"].as_array().unwrap().is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, 1024);
    let (base, handle) = start_server(&cfg).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/items", base))
        .multipart(upload_form("Poster", "Art", &vec![7u8; 16 * 1024]))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error(), "got {}", resp.status());

    let list: Value = client
        .get(format!("{}/items", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list["items"].as_array().unwrap().is_empty());

    handle.abort();
}
