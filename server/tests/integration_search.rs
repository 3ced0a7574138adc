use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{router, AppState};
use tempfile::tempdir;
use tower::ServiceExt;
use trawl_core::{DataPaths, InvertedIndex, SharedIndex};

fn build_tiny_index(dir: &std::path::Path) -> SharedIndex {
    let paths = DataPaths::new(dir);
    let mut index = InvertedIndex::with_snapshot(paths.index());
    index.add_document(
        "http://rust.org/",
        "Rust language",
        "Rust is great. rust systems programming with rust.",
    );
    index.add_document("http://learn.com/", "Learning", "Learning rust today.");
    index.add_document("http://cook.com/", "Cooking", "Pasta and sauce recipes.");
    index.dump().unwrap();
    index.into_shared()
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn admin_post(uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = server::build_app(dir.path().to_string_lossy().to_string()).unwrap();

    let (status, body) = call(app, get("/search?q=rust&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["query"], "rust");
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["url"], "http://rust.org/");
    assert_eq!(arr[1]["url"], "http://learn.com/");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert_eq!(arr[0]["title_highlights"], serde_json::json!([0]));
}

#[tokio::test]
async fn k_limits_results_but_not_total_hits() {
    let dir = tempdir().unwrap();
    let app = router(AppState::new(build_tiny_index(dir.path()), None));

    let (status, body) = call(app, get("/search?q=rust&k=1")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_query_is_a_bad_request() {
    let dir = tempdir().unwrap();
    let app = router(AppState::new(build_tiny_index(dir.path()), None));

    let (status, _) = call(app.clone(), get("/search?q=%20%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(app, get("/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    let app = router(AppState::new(build_tiny_index(dir.path()), None));

    let (status, body) = call(app.clone(), get("/doc?url=http://cook.com/")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "Cooking");
    assert_eq!(json["id"], 3);
    assert_eq!(json["body_length"], 4);

    let (status, _) = call(app, get("/doc?url=http://missing.com/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_endpoints_require_the_token() {
    let dir = tempdir().unwrap();
    let index = build_tiny_index(dir.path());
    let app = router(AppState::new(index.clone(), Some("secret".into())));

    let (status, _) = call(app.clone(), admin_post("/index/remove", "wrong", r#"{"url": "http://rust.org/"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(index.read().indexed_url_count(), 3);

    let (status, _) = call(app.clone(), admin_post("/index/remove", "secret", r#"{"url": "http://rust.org/"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(index.read().document("http://rust.org/").is_none());

    let (status, _) = call(app, admin_post("/index/commit", "secret", "")).await;
    assert_eq!(status, StatusCode::OK);
    let reloaded = InvertedIndex::load(DataPaths::new(dir.path()).index()).unwrap();
    assert_eq!(reloaded.indexed_url_count(), 2);
}

#[tokio::test]
async fn admin_endpoints_are_closed_without_a_token() {
    let dir = tempdir().unwrap();
    let app = router(AppState::new(build_tiny_index(dir.path()), None));
    let (status, _) = call(app, admin_post("/index/commit", "", "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn app_starts_only_over_an_existing_snapshot() {
    let dir = tempdir().unwrap();
    assert!(server::build_app(dir.path().to_string_lossy().to_string()).is_err());

    build_tiny_index(dir.path());
    let app = server::build_app(dir.path().to_string_lossy().to_string()).unwrap();
    let (status, body) = call(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}
