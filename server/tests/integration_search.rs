use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use spindex_core::{DirectorySource, EnglishAnalyzer, IndexBuilder, IndexConfig};
use std::fs;
use tempfile::tempdir;
use tower::ServiceExt;

const DOCS: &[&str] = &[
    "Apple and banana with blackberry jam.",
    "Blackberry and durian.",
    "An apple, then a blackberry.",
    "Durian, kiwi and more kiwi.",
];

fn build_tiny_index(root: &std::path::Path) -> IndexConfig {
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    for (i, text) in DOCS.iter().enumerate() {
        fs::write(data_dir.join(format!("{}.txt", i + 1)), text).unwrap();
    }
    let config = IndexConfig {
        data_dir,
        index_dir: root.join("index"),
        num_documents: DOCS.len() as u32,
        block_capacity: 3,
        ..IndexConfig::default()
    };
    let source = DirectorySource::new(&config.data_dir);
    IndexBuilder::new(&config, &source, &EnglishAnalyzer).run().unwrap();
    config
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

fn doc_ids(json: &Value) -> Vec<u64> {
    json["doc_ids"].as_array().unwrap().iter().map(|v| v.as_u64().unwrap()).collect()
}

#[tokio::test]
async fn search_returns_matching_documents() {
    let dir = tempdir().unwrap();
    let app = spindex_server::build_app(&build_tiny_index(dir.path()));

    let (status, body) = call(app.clone(), "GET", "/search?q=apple%20AND%20blackberry").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc_ids(&json), vec![1, 3]);
    assert_eq!(json["total_hits"].as_u64().unwrap(), 2);

    let (status, body) = call(app, "GET", "/search?q=apple%20OR%20durian%20NOT%20kiwi&compressed=true").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc_ids(&json), vec![1, 2, 3]);
}

#[tokio::test]
async fn rank_orders_by_score() {
    let dir = tempdir().unwrap();
    let app = spindex_server::build_app(&build_tiny_index(dir.path()));

    let (status, body) = call(app.clone(), "GET", "/rank?q=kiwi").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["doc_id"].as_u64().unwrap(), 4);
    assert!(results[0]["score"].as_f64().unwrap() > 0.0);

    let (_, body) = call(app, "GET", "/rank?q=blackberry%20durian").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    let scores: Vec<f64> = json["results"].as_array().unwrap().iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert_eq!(scores.len(), 4);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn malformed_queries_are_bad_requests() {
    let dir = tempdir().unwrap();
    let app = spindex_server::build_app(&build_tiny_index(dir.path()));

    let (status, body) = call(app.clone(), "GET", "/search?q=apple%20XOR%20durian").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("XOR"));

    let (status, _) = call(app, "GET", "/search?q=apple%20AND").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_index_is_a_server_error_and_warm_loads_everything() {
    let dir = tempdir().unwrap();
    let config = IndexConfig { index_dir: dir.path().join("nothing-here"), ..IndexConfig::default() };
    let (status, _) = call(spindex_server::build_app(&config), "GET", "/search?q=apple").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let app = spindex_server::build_app(&build_tiny_index(dir.path()));
    let (status, _) = call(app.clone(), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(app, "POST", "/warm").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["warm"], Value::Bool(true));
}
