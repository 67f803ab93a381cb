//! Integration tests for `POST /send-email`.
//!
//! The real router is driven with `oneshot`; the email provider is a local
//! fake bound on `127.0.0.1:0` that records what it receives.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use courtier::courtier::{
    mail::{MailConfig, Mailer},
    router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;

#[derive(Default)]
struct Received {
    bodies: Vec<Value>,
    authorization: Vec<String>,
}

type Shared = Arc<Mutex<Received>>;

async fn spawn_provider(status: StatusCode, answer: Value) -> (Url, Shared) {
    let received = Shared::default();

    let app = Router::new()
        .route(
            "/emails",
            post(
                move |State(received): State<Shared>, headers: HeaderMap, Json(body): Json<Value>| {
                    let answer = answer.clone();
                    async move {
                        let mut received = received.lock().unwrap();
                        if let Some(value) = headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                        {
                            received.authorization.push(value.to_string());
                        }
                        received.bodies.push(body);
                        (status, Json(answer))
                    }
                },
            ),
        )
        .with_state(received.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}/emails")).unwrap(), received)
}

fn app(api_url: Url, api_key: Option<&str>) -> Router {
    let config = MailConfig::new(api_url, api_key.map(SecretString::from))
        .with_from("Devis <devis@courtier.example>")
        .with_recipients("broker@courtier.example");
    router(Arc::new(Mailer::new(config).unwrap()))
}

fn quote() -> Value {
    json!({
        "nom": "Jean Dupont",
        "email": "jean@example.com",
        "message": "Assurance <auto>",
        "fileUrl": "https://files.example/permis.pdf"
    })
}

fn post_json(body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

#[tokio::test]
async fn accepted_quote_is_forwarded() {
    let (url, received) = spawn_provider(StatusCode::OK, json!({ "id": "msg_1" })).await;

    let (status, headers, body) = call(app(url, Some("re_test")), post_json(&quote())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert!(headers.contains_key("x-request-id"));

    let received = received.lock().unwrap();
    assert_eq!(received.authorization, vec!["Bearer re_test".to_string()]);

    let email = &received.bodies[0];
    assert_eq!(email["from"], "Devis <devis@courtier.example>");
    assert_eq!(email["to"], json!(["broker@courtier.example"]));
    assert_eq!(email["reply_to"], "jean@example.com");
    assert_eq!(email["subject"], "Nouvelle demande de devis - Jean Dupont");
    let html = email["html"].as_str().unwrap();
    assert!(html.contains("Assurance &lt;auto&gt;"));
    assert!(html.contains("https://files.example/permis.pdf"));
}

#[tokio::test]
async fn missing_file_url_is_a_bad_request() {
    let (url, received) = spawn_provider(StatusCode::OK, json!({})).await;

    let mut payload = quote();
    payload.as_object_mut().unwrap().remove("fileUrl");

    let (status, _, body) = call(app(url, Some("re_test")), post_json(&payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: fileUrl");
    assert!(received.lock().unwrap().bodies.is_empty());
}

#[tokio::test]
async fn blank_field_and_garbage_body_are_bad_requests() {
    let url = Url::parse("http://127.0.0.1:9/emails").unwrap();

    let mut payload = quote();
    payload["nom"] = json!("   ");
    let (status, _, _) = call(app(url.clone(), Some("re_test")), post_json(&payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = call(app(url, Some("re_test")), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing payload");
}

#[tokio::test]
async fn missing_api_key_is_a_server_error() {
    let (url, received) = spawn_provider(StatusCode::OK, json!({})).await;

    let (status, _, body) = call(app(url, None), post_json(&quote())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("mail API key"));
    assert!(received.lock().unwrap().bodies.is_empty());
}

#[tokio::test]
async fn unreachable_provider_is_a_server_error() {
    // bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/emails")).unwrap();
    let (status, _, body) = call(app(url, Some("re_test")), post_json(&quote())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn provider_rejection_is_a_bad_gateway() {
    let (url, _) = spawn_provider(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "name": "validation_error", "message": "Invalid `from` field" }),
    )
    .await;

    let (status, _, body) = call(app(url, Some("re_test")), post_json(&quote())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("422"));
    assert_eq!(body["details"]["message"], "Invalid `from` field");
}

#[tokio::test]
async fn preflight_allows_any_origin() {
    let url = Url::parse("http://127.0.0.1:9/emails").unwrap();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/send-email")
        .header(header::ORIGIN, "https://courtier.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = call(app(url.clone(), None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let methods = headers
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(methods.contains("POST"));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/send-email")
        .header(header::ORIGIN, "https://courtier.example")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = call(app(url, None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let url = Url::parse("http://127.0.0.1:9/emails").unwrap();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = call(app(url.clone(), None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "courtier");
    assert!(headers.contains_key("x-app"));

    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(app(url, None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/send-email"].is_object());
}
