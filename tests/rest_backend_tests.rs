// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REST backend client against a local stand-in server.

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use stride_recorder::error::AppError;
use stride_recorder::services::{RemoteBackend, RestBackend};

#[derive(Debug, Clone)]
struct Captured {
    table: String,
    query: Option<String>,
    prefer: Option<String>,
    apikey: Option<String>,
    body: Value,
}

type Log = Arc<Mutex<Vec<Captured>>>;

async fn insert(
    State(log): State<Log>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    log.lock().unwrap().push(Captured {
        table: table.clone(),
        query,
        prefer: header("prefer"),
        apikey: header("apikey"),
        body,
    });

    match table.as_str() {
        "outdoor_sessions" => (StatusCode::CREATED, Json(json!([{ "id": 42 }]))),
        "indoor_sessions" => (StatusCode::CREATED, Json(json!([{ "id": "9f1c" }]))),
        "strength_sessions" => (StatusCode::CREATED, Json(json!([]))),
        "indoor_samples" => (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))),
        "strength_sets" => (StatusCode::UNAUTHORIZED, Json(json!({}))),
        _ => (StatusCode::CREATED, Json(Value::Null)),
    }
}

async fn spawn_server() -> (String, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/rest/v1/{table}", post(insert))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/rest/v1/", addr), log)
}

#[tokio::test]
async fn test_session_insert_upserts_on_client_id() {
    let (url, log) = spawn_server().await;
    let backend = RestBackend::new(url, "key123").unwrap();

    let id = backend
        .insert_session("outdoor_sessions", &json!({ "client_id": "abc", "distance_m": 5000.0 }))
        .await
        .unwrap();
    assert_eq!(id, "42");

    let id = backend
        .insert_session("indoor_sessions", &json!({ "client_id": "def" }))
        .await
        .unwrap();
    assert_eq!(id, "9f1c");

    let captured = log.lock().unwrap().clone();
    assert_eq!(captured[0].table, "outdoor_sessions");
    assert_eq!(captured[0].query.as_deref(), Some("on_conflict=client_id"));
    assert_eq!(
        captured[0].prefer.as_deref(),
        Some("return=representation,resolution=merge-duplicates")
    );
    assert_eq!(captured[0].apikey.as_deref(), Some("key123"));
    assert_eq!(captured[0].body, json!([{ "client_id": "abc", "distance_m": 5000.0 }]));
}

#[tokio::test]
async fn test_rows_insert_ignores_duplicates() {
    let (url, log) = spawn_server().await;
    let backend = RestBackend::new(url, "key123").unwrap();

    let rows = vec![json!({ "seq": 0, "session_id": "42" }), json!({ "seq": 1, "session_id": "42" })];
    backend.insert_rows("outdoor_samples", &rows).await.unwrap();

    let captured = log.lock().unwrap().clone();
    assert_eq!(captured[0].query.as_deref(), Some("on_conflict=session_id%2Cseq"));
    assert_eq!(
        captured[0].prefer.as_deref(),
        Some("return=minimal,resolution=ignore-duplicates")
    );
    assert_eq!(captured[0].body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_error_statuses_mapped() {
    let (url, _log) = spawn_server().await;
    let backend = RestBackend::new(url, "key123").unwrap();

    let err = backend
        .insert_rows("indoor_samples", &[json!({ "seq": 0 })])
        .await
        .unwrap_err();
    assert!(matches!(&err, AppError::Backend(msg) if msg == AppError::BACKEND_RATE_LIMIT));
    assert!(err.is_retryable());

    let err = backend
        .insert_rows("strength_sets", &[json!({ "seq": 0 })])
        .await
        .unwrap_err();
    assert!(matches!(&err, AppError::Backend(msg) if msg == AppError::BACKEND_AUTH_ERROR));
    assert!(!err.is_retryable());

    let err = backend
        .insert_session("strength_sessions", &json!({ "client_id": "x" }))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Backend(_)));
}
