// HTTP API tests driving the axum router in-process (dev mode, so the echo
// decoder and canned LLM stand in for the real backends).

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine as _;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use recap_engine::config::{Config, RuntimeMode};
use recap_engine::{create_router, AppState};

fn dev_config() -> Config {
    let mut cfg = Config::default();
    cfg.mode = RuntimeMode::Dev;
    cfg.chunk_duration_seconds = 2.0;
    cfg.stop_drain_timeout_seconds = 5;
    cfg
}

fn app_with(cfg: Config) -> Router {
    create_router(AppState::new(cfg))
}

fn app() -> Router {
    app_with(dev_config())
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn start_body(session_id: &str, dir: &TempDir) -> Value {
    json!({
        "session_id": session_id,
        "model": "whisper",
        "sample_rate": 16000,
        "user_settings": {
            "chunk_summary_prompt": "Summarize:\n{text}",
            "final_summary_prompt": "Combine:\n{summaries_text}",
            "output_dir": dir.path().join("summaries").display().to_string(),
            "csv_export_path": dir.path().join("meetings.csv").display().to_string(),
            "append_csv": true
        }
    })
}

fn speech_chunk(session_id: &str, seconds: f64) -> Value {
    let rate = 16_000u32;
    let n = (rate as f64 * seconds) as usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5)
        .collect();
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    json!({
        "session_id": session_id,
        "timestamp": 0.0,
        "pcm_b64": base64::engine::general_purpose::STANDARD.encode(bytes),
        "sample_rate": rate,
    })
}

const SESSION_A: &str = "00000000-0000-0000-0000-00000000000a";
const SESSION_B: &str = "00000000-0000-0000-0000-00000000000b";

#[tokio::test]
async fn health_reports_versions_and_backends() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["api_version"], "1");
    assert_eq!(body["stt_backends"], json!(["whisper", "parakeet"]));
    assert!(body["llm_models"].is_array());
}

#[tokio::test]
async fn auth_token_is_enforced_except_on_health() {
    let mut cfg = dev_config();
    cfg.auth_token = "secret-token".to_string();
    let app = app_with(cfg);
    let dir = TempDir::new().unwrap();

    // Health stays open.
    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Missing token → 401 with the unified error shape.
    let response = app
        .clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["error_code"], "UNAUTHORIZED");
    assert!(body["details"]["hint"].is_string());

    // Correct token passes.
    let mut request = post("/start_session", start_body(SESSION_A, &dir));
    request
        .headers_mut()
        .insert("x-engine-token", "secret-token".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn start_session_validates_the_body() {
    let app = app();
    let dir = TempDir::new().unwrap();

    // Not a UUID.
    let mut body = start_body("meeting-1", &dir);
    body["session_id"] = json!("meeting-1");
    let response = app.clone().oneshot(post("/start_session", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_REQUEST");

    // Unknown model.
    let mut body = start_body(SESSION_A, &dir);
    body["model"] = json!("siri");
    let response = app.clone().oneshot(post("/start_session", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Out-of-range sample rate.
    let mut body = start_body(SESSION_A, &dir);
    body["sample_rate"] = json!(7999);
    let response = app.clone().oneshot(post("/start_session", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Malformed JSON body.
    let request = Request::builder()
        .method("POST")
        .uri("/start_session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn second_session_conflicts_while_first_is_active() {
    let app = app();
    let dir = TempDir::new().unwrap();

    let response = app
        .clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = app
        .clone()
        .oneshot(post("/start_session", start_body(SESSION_B, &dir)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error_code"],
        "SESSION_ALREADY_ACTIVE"
    );

    // Reusing the active id is a conflict too.
    let response = app
        .clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error_code"],
        "SESSION_ALREADY_EXISTS"
    );
}

#[tokio::test]
async fn audio_chunk_for_unknown_session_is_404() {
    let response = app()
        .oneshot(post("/audio_chunk", speech_chunk(SESSION_A, 0.5)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error_code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn audio_chunk_rejects_bad_audio() {
    let app = app();
    let dir = TempDir::new().unwrap();
    app.clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();

    // Boundary sample rates.
    let mut chunk = speech_chunk(SESSION_A, 0.5);
    chunk["sample_rate"] = json!(7999);
    let response = app.clone().oneshot(post("/audio_chunk", chunk)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error_code"],
        "INVALID_AUDIO_FORMAT"
    );

    let mut chunk = speech_chunk(SESSION_A, 0.5);
    chunk["sample_rate"] = json!(96001);
    let response = app.clone().oneshot(post("/audio_chunk", chunk)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Empty payload.
    let mut chunk = speech_chunk(SESSION_A, 0.5);
    chunk["pcm_b64"] = json!("");
    let response = app.clone().oneshot(post("/audio_chunk", chunk)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error_code"],
        "INVALID_AUDIO_FORMAT"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn full_session_over_http() {
    let app = app();
    let dir = TempDir::new().unwrap();

    let response = app
        .clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..4 {
        let response = app
            .clone()
            .oneshot(post("/audio_chunk", speech_chunk(SESSION_A, 2.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["buffered_seconds"].is_number());
        assert!(body["queue_depth"].is_number());
    }

    let response = app
        .clone()
        .oneshot(post("/stop_session", json!({ "session_id": SESSION_A })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session_status"], "completed");

    let summary_path = body["summary_path"].as_str().unwrap().to_string();
    assert!(std::path::Path::new(&summary_path).exists());
    let data_path = body["data_path"].as_str().unwrap().to_string();
    assert!(std::path::Path::new(&data_path).exists());
    let csv_path = body["csv_path"].as_str().unwrap().to_string();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2, "header plus one row");

    // Idempotent stop: identical paths, already_stopped status.
    let response = app
        .clone()
        .oneshot(post("/stop_session", json!({ "session_id": SESSION_A })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "already_stopped");
    assert_eq!(body["summary_path"], summary_path);
    assert_eq!(body["session_status"], "completed");

    // After stopping, audio for that id is unknown.
    let response = app
        .clone()
        .oneshot(post("/audio_chunk", speech_chunk(SESSION_A, 1.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // And a fresh id can start.
    let response = app
        .clone()
        .oneshot(post("/start_session", start_body(SESSION_B, &dir)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions_listing_and_stats() {
    let app = app();
    let dir = TempDir::new().unwrap();

    app.clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();
    app.clone()
        .oneshot(post("/audio_chunk", speech_chunk(SESSION_A, 2.0)))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sessions"][0]["session_id"], SESSION_A);
    assert_eq!(body["sessions"][0]["status"], "active");

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{SESSION_A}/stats"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["session_id"], SESSION_A);
    assert_eq!(body["status"], "active");
    assert!((body["total_audio_seconds"].as_f64().unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(body["total_segments"], 1);

    app.clone()
        .oneshot(post("/stop_session", json!({ "session_id": SESSION_A })))
        .await
        .unwrap();

    // Terminal sessions stay listed from history but no longer serve stats.
    let response = app
        .clone()
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessions"][0]["status"], "completed");

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{SESSION_A}/stats"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unknown id is a 404 too.
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{SESSION_B}/stats"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn prompts_must_carry_their_fill_slots() {
    let app = app();
    let dir = TempDir::new().unwrap();

    let mut body = start_body(SESSION_A, &dir);
    body["user_settings"]["chunk_summary_prompt"] = json!("no slot here");
    let response = app.clone().oneshot(post("/start_session", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_REQUEST");

    let mut body = start_body(SESSION_A, &dir);
    body["user_settings"]["final_summary_prompt"] = json!("missing the slot");
    let response = app.clone().oneshot(post("/start_session", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_track_the_session_lifecycle() {
    let app = app();
    let dir = TempDir::new().unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessions_started"], 0);

    app.clone()
        .oneshot(post("/start_session", start_body(SESSION_A, &dir)))
        .await
        .unwrap();
    for _ in 0..2 {
        app.clone()
            .oneshot(post("/audio_chunk", speech_chunk(SESSION_A, 2.0)))
            .await
            .unwrap();
    }
    app.clone()
        .oneshot(post("/stop_session", json!({ "session_id": SESSION_A })))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessions_started"], 1);
    assert_eq!(body["sessions_completed"], 1);
    assert_eq!(body["audio_chunks_accepted"], 2);
    assert!((body["audio_seconds_total"].as_f64().unwrap() - 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn stop_unknown_session_is_404() {
    let response = app()
        .oneshot(post("/stop_session", json!({ "session_id": SESSION_A })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error_code"], "SESSION_NOT_FOUND");
}
