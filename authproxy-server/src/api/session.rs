//! Login Session Handlers
//!
//! Translate the three HTTP entry points into broker calls:
//! start (POST/PUT), long-poll (GET) and the provider's completion redirect.

use axum::body::Bytes;
use axum::extract::{Query, RawQuery, State};
use axum::http::header::HOST;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use url::form_urlencoded;
use url::Url;

use authproxy_core::{PollOutcome, SessionContent, SessionId};

use super::error::ApiError;
use crate::state::AppState;

/// Cookie and query parameter carrying the correlation token.
pub const AUTH_ID_KEY: &str = "apid";
const LOGIN_URL_KEY: &str = "loginurl";
const REDIRECT_URL_KEY: &str = "redirecturlkey";
const DEFAULT_REDIRECT_PARAM: &str = "redirect_uri";

pub const CLOSE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Login complete</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <p>Done! You may close this page.</p>
</body>
</html>"#;

// ============ Request Types ============

#[derive(Deserialize)]
pub struct PollQuery {
    pub apid: Option<String>,
}

// ============ Handlers ============

/// Starts a session and returns the provider login URL, form-encoded.
///
/// Reads `loginurl` and `redirecturlkey` from the body or the query string
/// (body wins). The login URL gets a `{redirecturlkey}` parameter pointing at
/// this server's completion route for the new session.
pub async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<(CookieJar, String), ApiError> {
    let form = FormValues::new(query.as_deref(), &body);

    let raw_login = form
        .get(LOGIN_URL_KEY)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {LOGIN_URL_KEY}")))?;
    let mut login_url = Url::parse(raw_login)
        .map_err(|e| ApiError::BadRequest(format!("{LOGIN_URL_KEY}: {e}")))?;
    if !matches!(login_url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!("{LOGIN_URL_KEY}: unsupported scheme")));
    }
    let redirect_param = form
        .get(REDIRECT_URL_KEY)
        .filter(|k| !k.is_empty())
        .unwrap_or(DEFAULT_REDIRECT_PARAM)
        .to_string();

    let base = callback_base(&state, &headers)?;
    let callback = callback_url(&base, &state.config().route("/complete"))?;

    let id = state.broker().create_session().await?;
    let completion = completion_url(&callback, &id);
    set_query_param(&mut login_url, &redirect_param, completion.as_str());

    let cookie = Cookie::build((AUTH_ID_KEY, id.to_string()))
        .http_only(true)
        .secure(state.config().secure_cookies())
        .same_site(SameSite::Lax)
        .path("/")
        .build();

    tracing::info!(session = id.short(), login_host = ?login_url.host_str(), "Login session started");

    let encoded: String = form_urlencoded::byte_serialize(login_url.as_str().as_bytes()).collect();
    Ok((jar.add(cookie), encoded))
}

/// Long-polls for a session result. Id from the `apid` cookie, else the query.
pub async fn poll_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<PollQuery>,
) -> Result<Json<SessionContent>, ApiError> {
    let raw = jar
        .get(AUTH_ID_KEY)
        .map(|c| c.value().to_string())
        .or(query.apid)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {AUTH_ID_KEY}")))?;
    let id: SessionId = raw.parse()?;

    match state.broker().poll(id).await? {
        PollOutcome::Found(content) => Ok(Json(content)),
        PollOutcome::NotFound => Err(ApiError::NotFound),
    }
}

/// Provider redirect target. Everything but `apid` becomes the session content.
///
/// The page is the same whether or not the completion matched a live
/// session.
pub async fn complete_session(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Html<&'static str>, ApiError> {
    let query = query.unwrap_or_default();
    let mut raw_id = None;
    let mut content = SessionContent::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == AUTH_ID_KEY {
            raw_id.get_or_insert(value.into_owned());
        } else {
            content.push(key, value);
        }
    }

    let id: SessionId = raw_id
        .ok_or_else(|| ApiError::BadRequest(format!("missing {AUTH_ID_KEY}")))?
        .parse()?;

    if let Err(e) = state.broker().complete(id, content).await {
        tracing::error!(error = %e, "Completion not delivered");
    }

    Ok(Html(CLOSE_PAGE))
}

pub async fn unsupported_method() -> Response {
    ApiError::BadRequest("unsupported method".into()).into_response()
}

// ============ Helpers ============

/// Merged form view: body pairs first, then query pairs.
struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    fn new(query: Option<&str>, body: &[u8]) -> Self {
        let pairs = form_urlencoded::parse(body)
            .chain(form_urlencoded::parse(query.unwrap_or_default().as_bytes()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

fn callback_base(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(public) = &state.config().public_url {
        return Ok(public.clone());
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing Host header".into()))?;
    Ok(format!("http://{host}"))
}

/// Completion route on this server, checked before any session exists.
fn callback_url(base: &str, path: &str) -> Result<Url, ApiError> {
    Url::parse(&format!("{base}{path}"))
        .map_err(|e| ApiError::BadRequest(format!("cannot build callback URL: {e}")))
}

fn completion_url(callback: &Url, id: &SessionId) -> Url {
    let mut url = callback.clone();
    url.query_pairs_mut().append_pair(AUTH_ID_KEY, id.as_str());
    url
}

/// Replaces every `key` pair in the query with a single `key=value`.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut().clear().extend_pairs(kept).append_pair(key, value);
}
