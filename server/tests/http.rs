#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use slide_core::test_support::{png, zip_with_declared_size, DeckBuilder, FixtureShape};
use slide_core::{ActionContext, Deck, DeckStore, StubClient};
use slide_server::{router, AppState, PPTX_MIME};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "slide-test-boundary";

struct Harness {
    app: Router,
    stub: Arc<StubClient>,
    _dir: TempDir,
}

fn harness(reply: &str) -> Harness {
    harness_with_icon(reply, Path::new("/nonexistent/placeholder_icon.png"))
}

fn harness_with_icon(reply: &str, icon: &Path) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubClient::new(reply));
    let state = AppState::new(DeckStore::new(dir.path()), stub.clone(), ActionContext::new(icon));
    Harness { app: router(state, 10 * 1024 * 1024), stub, _dir: dir }
}

fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"deck.pptx\"\r\nContent-Type: {PPTX_MIME}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(field: &str, bytes: &[u8]) -> Request<Body> {
    Request::post("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(field, bytes)))
        .unwrap()
}

fn chat_request(message: &str) -> Request<Body> {
    Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "message": message }).to_string()))
        .unwrap()
}

fn download_request() -> Request<Body> {
    Request::get("/download").body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, bytes)
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn downloaded_deck(app: &Router) -> Deck {
    let (status, bytes) = send(app, download_request()).await;
    assert_eq!(status, StatusCode::OK);
    Deck::from_bytes(&bytes).unwrap()
}

fn sample_deck() -> Vec<u8> {
    DeckBuilder::new()
        .slide(&["Welcome", "Agenda"])
        .slide_with(vec![
            FixtureShape::Text("Left".into()),
            FixtureShape::Text("Right".into()),
            FixtureShape::Connector,
        ])
        .build()
}

#[tokio::test]
async fn chat_before_upload_is_rejected() {
    let h = harness("{}");
    let (status, body) = send_json(&h.app, chat_request("hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No presentation loaded."}));
    assert!(h.stub.requests().is_empty());
}

#[tokio::test]
async fn download_before_upload() {
    let h = harness("{}");
    let (status, body) = send_json(&h.app, download_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "No file available."}));
}

#[tokio::test]
async fn upload_then_download_round_trips() {
    let h = harness("{}");
    let original = Deck::from_bytes(&sample_deck()).unwrap();

    let (status, body) = send_json(&h.app, upload_request("file", &sample_deck())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Presentation loaded."}));

    let resp = h.app.clone().oneshot(download_request()).await.unwrap();
    assert_eq!(resp.headers()[header::CONTENT_TYPE], PPTX_MIME);
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment;"), "{disposition}");
    assert!(disposition.contains(".pptx"), "{disposition}");

    let downloaded = downloaded_deck(&h.app).await;
    assert_eq!(downloaded.slide_count(), original.slide_count());
    assert_eq!(downloaded.summaries(), original.summaries());
}

#[tokio::test]
async fn upload_without_file_field() {
    let h = harness("{}");
    let (status, body) = send_json(&h.app, upload_request("attachment", &sample_deck())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No file uploaded."}));
}

#[tokio::test]
async fn upload_of_garbage_is_rejected() {
    let h = harness("{}");
    let (status, body) = send_json(&h.app, upload_request("file", b"definitely not a zip")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Uploaded file is not a valid presentation."}));

    let (status, _) = send(&h.app, download_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_claiming_huge_part_is_rejected() {
    let h = harness("{}");
    let (status, body) = send_json(&h.app, upload_request("file", &zip_with_declared_size(1 << 62))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Uploaded file is not a valid presentation."}));

    let (status, _) = send(&h.app, download_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_edits_text() {
    let h = harness(
        "Sure, here is the change:\n{\"action\": \"edit_text\", \"slide_number\": 1, \"old_text\": \"Welcome\", \"new_text\": \"Quarterly Review\"}",
    );
    send(&h.app, upload_request("file", &sample_deck())).await;

    let (status, body) = send_json(&h.app, chat_request("Rename the title")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"response": "Edit applied."}));

    let deck = downloaded_deck(&h.app).await;
    assert_eq!(deck.summaries()[0].text, "Quarterly Review\nAgenda");

    let requests = h.stub.requests();
    assert_eq!(requests.len(), 1);
    let user = &requests[0][1].content;
    assert!(user.starts_with("Slides: [{\"slide_number\":1,\"text\":\"Welcome\\nAgenda\"}"), "{user}");
    assert!(user.ends_with("\nInstruction: Rename the title"), "{user}");
}

#[tokio::test]
async fn chat_text_not_found() {
    let h = harness(r#"{"action": "edit_text", "old_text": "Nope", "new_text": "X"}"#);
    send(&h.app, upload_request("file", &sample_deck())).await;
    let (status, body) = send_json(&h.app, chat_request("edit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"response": "Text not found."}));
}

#[tokio::test]
async fn chat_applies_style() {
    let h = harness(r#"{"action": "apply_style", "slide_number": 2, "style": "modern"}"#);
    send(&h.app, upload_request("file", &sample_deck())).await;

    let (_, body) = send_json(&h.app, chat_request("make slide 2 modern")).await;
    assert_eq!(body, json!({"response": "Modern style applied."}));

    let deck = downloaded_deck(&h.app).await;
    let slide = deck.slide(2).unwrap();
    for shape in slide.shapes().iter().filter(|s| s.has_text_frame()) {
        let font = shape.first_paragraph_font().unwrap();
        assert_eq!(font.typeface.as_deref(), Some("Arial"));
        assert_eq!(font.size, Some(2880));
    }
    assert_eq!(deck.summaries()[1].text, "Left\nRight");
}

#[tokio::test]
async fn chat_changes_layout() {
    let h = harness(r#"{"action": "change_layout", "slide_number": 2}"#);
    send(&h.app, upload_request("file", &sample_deck())).await;

    let (_, body) = send_json(&h.app, chat_request("two columns")).await;
    assert_eq!(body, json!({"response": "Slide layout updated."}));

    let deck = downloaded_deck(&h.app).await;
    let positions: Vec<_> = deck
        .slide(2)
        .unwrap()
        .shapes()
        .iter()
        .map(|s| s.position().map(|(x, y)| (x.0, y.0)))
        .collect();
    assert_eq!(positions[0], Some((457_200, 457_200)));
    assert_eq!(positions[1], Some((3_657_600, 457_200)));
    assert_eq!(positions[2], Some((0, 2_743_200)));
}

#[tokio::test]
async fn chat_adds_icon() {
    let dir = tempfile::tempdir().unwrap();
    let icon = dir.path().join("placeholder_icon.png");
    std::fs::write(&icon, png(2, 2)).unwrap();
    let h = harness_with_icon(r#"{"action": "add_icon", "slide_number": 1, "keywords": ["profit"]}"#, &icon);
    send(&h.app, upload_request("file", &sample_deck())).await;

    let (_, body) = send_json(&h.app, chat_request("add an icon")).await;
    assert_eq!(body, json!({"response": "Placeholder icon added."}));

    let deck = downloaded_deck(&h.app).await;
    assert_eq!(deck.slide(1).unwrap().shapes().len(), 3);
    assert_eq!(deck.summaries()[0].text, "Welcome\nAgenda");
}

#[tokio::test]
async fn unparseable_reply_leaves_deck() {
    let h = harness("I'm sorry, I can't do that.");
    send(&h.app, upload_request("file", &sample_deck())).await;

    let (status, body) = send_json(&h.app, chat_request("do something")).await;
    assert_eq!(status, StatusCode::OK);
    let response = body["response"].as_str().unwrap();
    assert!(response.starts_with("Failed to parse GPT response:"), "{response}");

    let deck = downloaded_deck(&h.app).await;
    assert_eq!(deck.summaries(), Deck::from_bytes(&sample_deck()).unwrap().summaries());
}

#[tokio::test]
async fn unknown_action_is_not_an_error() {
    let h = harness(r#"{"action": "delete_slide", "slide_number": 1}"#);
    send(&h.app, upload_request("file", &sample_deck())).await;
    let (status, body) = send_json(&h.app, chat_request("delete it")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"response": "Unknown action."}));
}

#[tokio::test]
async fn out_of_range_slide_is_server_error() {
    let h = harness(r#"{"action": "change_layout", "slide_number": 7}"#);
    send(&h.app, upload_request("file", &sample_deck())).await;
    let (status, body) = send_json(&h.app, chat_request("layout")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("slide 7 is out of range"), "{error}");
}

#[tokio::test]
async fn missing_field_is_server_error() {
    let h = harness(r#"{"action": "edit_text", "slide_number": 1}"#);
    send(&h.app, upload_request("file", &sample_deck())).await;
    let (status, body) = send_json(&h.app, chat_request("edit")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Invalid action: missing field `old_text`"}));
}

#[tokio::test]
async fn chat_with_empty_body_uses_empty_message() {
    let h = harness("no json");
    send(&h.app, upload_request("file", &sample_deck())).await;
    let req = Request::post("/chat").body(Body::empty()).unwrap();
    let (status, _) = send_json(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.stub.requests()[0][1].content.ends_with("Instruction: "));
}

#[tokio::test]
async fn health() {
    let h = harness("{}");
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
