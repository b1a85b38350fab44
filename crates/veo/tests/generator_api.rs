//! End-to-end tests for [`VeoGenerator`] against an in-process HTTP
//! server emulating the submit / poll / download protocol.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;
use veoq_core::job::{JobSpec, VideoJob};
use veoq_veo::api::VeoApi;
use veoq_veo::credentials::{ApiKey, Credentials};
use veoq_veo::error::GenerationError;
use veoq_veo::generator::{VeoGenerator, VideoGenerator};
use veoq_veo::poll::PollConfig;

const GOOD_KEY: &str = "test-key";
const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42";

// ---------------------------------------------------------------------------
// Fake service
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Outcome {
    Video,
    Empty,
    DownloadFails,
}

struct FakeState {
    base: String,
    outcome: Outcome,
    polls_until_done: u32,
    polls: u32,
    submissions: Vec<serde_json::Value>,
}

#[derive(Clone)]
struct Fake(Arc<Mutex<FakeState>>);

fn entity_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND"
            }
        })),
    )
        .into_response()
}

fn has_good_key(headers: &HeaderMap) -> bool {
    headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        == Some(GOOD_KEY)
}

async fn v1beta(
    State(fake): State<Fake>,
    method: Method,
    Path(rest): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !has_good_key(&headers) {
        return entity_not_found();
    }

    let mut state = fake.0.lock().unwrap();

    if method == Method::POST && rest.ends_with(":predictLongRunning") {
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
        state.submissions.push(parsed);
        return Json(json!({ "name": "models/veo/operations/op-1" })).into_response();
    }

    state.polls += 1;
    if state.polls < state.polls_until_done {
        return Json(json!({ "name": rest, "done": false })).into_response();
    }

    let samples = match state.outcome {
        Outcome::Empty => json!([]),
        Outcome::Video | Outcome::DownloadFails => json!([
            { "video": { "uri": format!("{}/files/vid-1", state.base) } }
        ]),
    };

    Json(json!({
        "name": rest,
        "done": true,
        "response": { "generateVideoResponse": { "generatedSamples": samples } }
    }))
    .into_response()
}

async fn download(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if !has_good_key(&headers) {
        return entity_not_found();
    }
    let outcome = fake.0.lock().unwrap().outcome;
    match outcome {
        Outcome::DownloadFails => {
            (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response()
        }
        _ => ([(header::CONTENT_TYPE, "video/mp4")], VIDEO_BYTES).into_response(),
    }
}

async fn spawn_fake(outcome: Outcome, polls_until_done: u32) -> (String, Fake) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let fake = Fake(Arc::new(Mutex::new(FakeState {
        base: base.clone(),
        outcome,
        polls_until_done,
        polls: 0,
        submissions: Vec::new(),
    })));

    let app = Router::new()
        .route("/v1beta/{*rest}", any(v1beta))
        .route("/files/{id}", get(download))
        .with_state(fake.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base, fake)
}

fn generator(base: &str, key: Option<&str>) -> (VeoGenerator, Credentials) {
    let credentials = Credentials::new(key.map(ApiKey::new));
    let poll = PollConfig {
        interval: Duration::from_millis(10),
        max_attempts: Some(50),
        max_elapsed: None,
    };
    let generator = VeoGenerator::new(VeoApi::new(base), credentials.clone(), poll);
    (generator, credentials)
}

fn job() -> VideoJob {
    VideoJob::new(JobSpec::text("a paper boat in the rain"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submits_polls_and_downloads() {
    let (base, fake) = spawn_fake(Outcome::Video, 3).await;
    let (generator, _) = generator(&base, Some(GOOD_KEY));

    let blob = generator.generate(&job()).await.expect("generation should succeed");

    assert_eq!(&*blob.data, VIDEO_BYTES);
    assert_eq!(blob.content_type, "video/mp4");
    assert!(blob.uri().starts_with("blob:"));

    let state = fake.0.lock().unwrap();
    assert_eq!(state.polls, 3);
    assert_eq!(state.submissions.len(), 1);
    let submitted = &state.submissions[0];
    assert_eq!(submitted["instances"][0]["prompt"], "a paper boat in the rain");
    assert_eq!(submitted["parameters"]["aspectRatio"], "16:9");
    assert_eq!(submitted["parameters"]["resolution"], "720p");
}

#[tokio::test]
async fn rejected_key_is_a_credential_error() {
    let (base, fake) = spawn_fake(Outcome::Video, 1).await;
    let (generator, _) = generator(&base, Some("stale-key"));

    let result = generator.generate(&job()).await;

    assert_matches!(result, Err(GenerationError::Credential(_)));
    assert!(fake.0.lock().unwrap().submissions.is_empty());
}

#[tokio::test]
async fn missing_key_fails_without_calling_the_service() {
    let (base, fake) = spawn_fake(Outcome::Video, 1).await;
    let (generator, _) = generator(&base, None);

    let result = generator.generate(&job()).await;

    assert_matches!(result, Err(GenerationError::Credential(_)));
    assert_eq!(fake.0.lock().unwrap().polls, 0);
}

#[tokio::test]
async fn done_without_samples_is_no_result() {
    let (base, _) = spawn_fake(Outcome::Empty, 1).await;
    let (generator, _) = generator(&base, Some(GOOD_KEY));

    let result = generator.generate(&job()).await;

    assert_matches!(result, Err(GenerationError::NoResult));
}

#[tokio::test]
async fn failed_download_is_transient() {
    let (base, _) = spawn_fake(Outcome::DownloadFails, 1).await;
    let (generator, _) = generator(&base, Some(GOOD_KEY));

    let result = generator.generate(&job()).await;

    assert_matches!(
        result,
        Err(GenerationError::Transient(msg)) if msg.contains("Failed to download video")
    );
}

#[tokio::test]
async fn reselected_key_is_used_for_next_job() {
    let (base, _) = spawn_fake(Outcome::Video, 1).await;
    let (generator, credentials) = generator(&base, Some("stale-key"));

    assert!(generator.generate(&job()).await.is_err());

    credentials.select(ApiKey::new(GOOD_KEY));
    assert!(generator.generate(&job()).await.is_ok());
}
