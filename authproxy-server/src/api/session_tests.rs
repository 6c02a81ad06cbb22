use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use url::{form_urlencoded, Url};

use authproxy_core::{BrokerConfig, SessionId, UnknownSessionPolicy};

use super::session::{AUTH_ID_KEY, CLOSE_PAGE};
use crate::config::ServerConfig;
use crate::router::build_router;
use crate::test_helpers::{test_app_state, test_app_state_with};

fn app() -> Router {
    build_router(test_app_state())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, String::from_utf8(body.to_vec()).expect("utf-8 body"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn poll_with_cookie(id: &str) -> Request<Body> {
    Request::builder()
        .uri("/authproxy/auth")
        .header(COOKIE, format!("{AUTH_ID_KEY}={id}"))
        .body(Body::empty())
        .expect("request")
}

/// Starts a session, returning the session id and the decoded login URL.
async fn start(app: &Router, form: &str) -> (SessionId, Url) {
    let request = Request::builder()
        .method("POST")
        .uri("/authproxy/auth")
        .header(HOST, "proxy.test:8426")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("id cookie")
        .to_string();
    assert!(cookie.contains("HttpOnly"), "cookie should be HttpOnly: {cookie}");
    let id = cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("apid="))
        .expect("apid cookie")
        .parse::<SessionId>()
        .expect("valid session id");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let decoded: String = form_urlencoded::parse(&[&b"u="[..], &body[..]].concat())
        .next()
        .map(|(_, v)| v.into_owned())
        .expect("encoded login url");
    (id, Url::parse(&decoded).expect("login url"))
}

#[tokio::test]
async fn test_start_embeds_completion_callback() {
    let app = app();
    let (id, login) = start(
        &app,
        "loginurl=https%3A%2F%2Flogin.example.com%2Foauth%3Fclient%3Dabc&redirecturlkey=next",
    )
    .await;

    assert_eq!(login.host_str(), Some("login.example.com"));
    let pairs: Vec<(String, String)> = login.query_pairs().into_owned().collect();
    assert_eq!(pairs[0], ("client".to_string(), "abc".to_string()));

    let callback = pairs.iter().find(|(k, _)| k == "next").map(|(_, v)| v).expect("callback");
    let callback = Url::parse(callback).expect("callback url");
    assert_eq!(callback.scheme(), "http");
    assert_eq!(callback.host_str(), Some("proxy.test"));
    assert_eq!(callback.port(), Some(8426));
    assert_eq!(callback.path(), "/authproxy/complete");
    let apid = callback.query_pairs().find(|(k, _)| k == AUTH_ID_KEY).map(|(_, v)| v.into_owned());
    assert_eq!(apid.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_start_uses_public_url_and_default_param() {
    let config = ServerConfig {
        public_url: Some("https://auth.example.org".to_string()),
        ..ServerConfig::default()
    };
    let app = build_router(test_app_state_with(config));
    let (_, login) = start(&app, "loginurl=https%3A%2F%2Flogin.example.com%2F").await;

    let callback = login
        .query_pairs()
        .find(|(k, _)| k == "redirect_uri")
        .map(|(_, v)| v.into_owned())
        .expect("default callback param");
    assert!(callback.starts_with("https://auth.example.org/authproxy/complete?apid="));
}

#[tokio::test]
async fn test_start_rejects_bad_login_url() {
    let app = app();
    for form in ["", "loginurl=%2Frelative%2Fpath", "loginurl=javascript%3Aalert(1)"] {
        let request = Request::builder()
            .method("POST")
            .uri("/authproxy/auth")
            .header(HOST, "proxy.test")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .expect("request");
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "form {form:?} should be rejected");
    }
}

#[tokio::test]
async fn test_start_with_unusable_host_creates_no_session() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/authproxy/auth")
        .header(HOST, "bad host")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("loginurl=https%3A%2F%2Flogin.example.com%2F"))
        .expect("request");
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, get("/api/status")).await;
    let json: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["sessions"], 0);
}

#[tokio::test]
async fn test_poll_rejects_missing_or_malformed_id() {
    let app = app();
    let (status, _) = send(&app, get("/authproxy/auth")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/authproxy/poll?apid=12")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_poll_unknown_session_is_unauthorized() {
    let app = app();
    let (status, _) = send(&app, poll_with_cookie(SessionId::generate().as_str())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_complete_then_poll_returns_content() {
    let app = app();
    let (id, _) = start(&app, "loginurl=https%3A%2F%2Flogin.example.com%2F").await;

    let (status, page) = send(
        &app,
        get(&format!("/authproxy/complete?token=xyz&apid={id}&scope=read&scope=write")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, CLOSE_PAGE);

    let (status, body) = send(&app, poll_with_cookie(id.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"token":["xyz"],"scope":["read","write"]}"#);

    let (status, body) = send(&app, get(&format!("/authproxy/poll?apid={id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains(AUTH_ID_KEY), "id must not leak into content: {body}");
}

#[tokio::test(start_paused = true)]
async fn test_long_poll_released_by_completion() {
    let app = app();
    let (id, _) = start(&app, "loginurl=https%3A%2F%2Flogin.example.com%2F").await;

    let waiting = {
        let app = app.clone();
        let request = poll_with_cookie(id.as_str());
        tokio::spawn(async move { send(&app, request).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiting.is_finished());

    let (status, _) = send(&app, get(&format!("/authproxy/complete?apid={id}&token=abc"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = waiting.await.expect("poll task");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"token":["abc"]}"#);
}

#[tokio::test]
async fn test_complete_page_hides_unknown_session() {
    let app = app();
    let (status, page) =
        send(&app, get(&format!("/authproxy/complete?apid={}&token=x", SessionId::generate())))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, CLOSE_PAGE);

    let (status, _) = send(&app, get("/authproxy/complete?token=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_rejects_other_methods() {
    let app = app();
    let request =
        Request::builder().method("DELETE").uri("/authproxy/auth").body(Body::empty()).expect("request");
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_lenient_policy_waits_for_unknown_id() {
    let config = ServerConfig {
        broker: BrokerConfig {
            unknown_session_policy: UnknownSessionPolicy::Lenient,
            ..BrokerConfig::default()
        },
        ..ServerConfig::default()
    };
    let app = build_router(test_app_state_with(config));
    let id = SessionId::generate();

    let waiting = {
        let app = app.clone();
        let request = poll_with_cookie(id.as_str());
        tokio::spawn(async move { send(&app, request).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiting.is_finished(), "lenient poll should wait instead of failing");

    send(&app, get(&format!("/authproxy/complete?apid={id}&token=t"))).await;
    let (status, _) = waiting.await.expect("poll task");
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_status_reports_broker_stats() {
    let app = app();
    start(&app, "loginurl=https%3A%2F%2Flogin.example.com%2F").await;

    let (status, body) = send(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["sessions"], 1);
    assert_eq!(json["finished"], 0);
    assert_eq!(json["broker_running"], true);

    let (status, _) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
