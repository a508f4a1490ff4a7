//! HTTP route handlers for Gatehouse.

use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use tollgate_common::VerificationResult;
use tollgate_common::constants::{headers, paths};

use crate::error::method_not_allowed;
use crate::state::AppState;

mod captcha;
mod challenge;
mod csrf_token;
mod health;
mod verify;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let router = Router::new()
        // Health
        .route(paths::HEALTH, get(health::health_check))

        // Proof-of-work
        .route(
            paths::CHALLENGE,
            get(challenge::get_challenge)
                .post(challenge::post_challenge)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            paths::VERIFY,
            post(verify::verify_solution)
                .options(preflight)
                .fallback(method_not_allowed),
        )

        // CSRF
        .route(
            paths::CSRF_TOKEN,
            get(csrf_token::issue_token)
                .options(preflight)
                .fallback(method_not_allowed),
        )

        // Third-party CAPTCHA
        .route(
            paths::VERIFY_CAPTCHA,
            post(captcha::verify_captcha)
                .options(preflight)
                .fallback(method_not_allowed),
        );

    with_request_timeout(router, timeout)
        .layer(cors)
        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state)
}

/// Bound every request by `timeout`, answering 408 with the JSON error body
fn with_request_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(json_timeout))
}

async fn json_timeout(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    tracing::warn!("Request timed out");
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(VerificationResult::failed("Request timed out")),
    )
        .into_response()
}

/// Bare OPTIONS requests (real preflights are answered by the CORS layer)
async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(headers::X_CSRF_TOKEN),
        ]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        base.allow_origin(Any)
    } else {
        // Cookies only travel cross-origin to an explicit allow-list
        base.allow_origin(allowed).allow_credentials(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use serde_json::{Value, json};
    use tollgate_common::{Challenge, VerifyPayload, protocol};
    use tollgate_solver::CancellationToken;
    use tollgate_solver::solver::{SolveOptions, solve};
    use tower::ServiceExt;

    use crate::config::AppConfig;

    const SECRET: &str = "route-test-secret";

    fn app(secret: Option<&str>) -> Router {
        let mut config = AppConfig::default();
        config.secrets.hmac_secret = secret.map(String::from);
        create_router(AppState::new(config).unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn get_req(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).unwrap()
    }

    /// Returns (`Cookie` header value, token from the body)
    async fn csrf_pair(app: &Router) -> (String, String) {
        let (status, headers, body) = send(app, get_req(paths::CSRF_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        let set_cookie = headers[header::SET_COOKIE].to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();
        (cookie, body["token"].as_str().unwrap().to_string())
    }

    async fn fetch_challenge(app: &Router) -> Challenge {
        let (status, _, body) = send(app, get_req(paths::CHALLENGE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        serde_json::from_value(body).unwrap()
    }

    fn solved_payload(challenge: &Challenge) -> VerifyPayload {
        let solution = solve(challenge, &SolveOptions::default(), &CancellationToken::new()).unwrap();
        VerifyPayload::from_challenge(challenge, solution.number)
    }

    fn verify_req(body: &Value, cookie: Option<&str>, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(paths::VERIFY).header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(token) = token {
            builder = builder.header(headers::X_CSRF_TOKEN, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_csrf_token_endpoint() {
        let app = app(Some(SECRET));
        let (status, headers, body) = send(&app, get_req(paths::CSRF_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let token = body["token"].as_str().unwrap();
        assert_eq!(token.len(), 64);

        let set_cookie = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("csrf-token={};", token)));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Strict"));
        assert!(set_cookie.contains("Path=/"));
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;
        let challenge = fetch_challenge(&app).await;
        assert_eq!(challenge.action, "login");
        assert_eq!(challenge.algorithm, "SHA-256");

        let payload = serde_json::to_value(solved_payload(&challenge)).unwrap();
        let (status, _, body) = send(&app, verify_req(&payload, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_wrapped_payload_and_string_solution() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;
        let challenge = fetch_challenge(&app).await;

        let mut inner = serde_json::to_value(solved_payload(&challenge)).unwrap();
        let number = inner["solution"].as_u64().unwrap();
        inner["solution"] = json!(number.to_string());
        let wrapped = json!({ "payload": inner.to_string() });

        let (status, _, body) = send(&app, verify_req(&wrapped, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_forged_signature_fails() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;
        let challenge = fetch_challenge(&app).await;

        let mut payload = solved_payload(&challenge);
        payload.signature = protocol::sign(
            b"attacker-secret",
            &challenge.challenge,
            &challenge.action,
            &challenge.salt,
        )
        .unwrap();

        let body = serde_json::to_value(payload).unwrap();
        let (status, _, body) = send(&app, verify_req(&body, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Verification failed");
    }

    #[tokio::test]
    async fn test_signed_action_is_enforced() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;

        let request = Request::post(paths::CHALLENGE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "action": "signup" }).to_string()))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let challenge: Challenge = serde_json::from_value(body).unwrap();
        assert_eq!(challenge.action, "signup");

        let mut payload = solved_payload(&challenge);
        let ok = serde_json::to_value(&payload).unwrap();
        let (status, _, _) = send(&app, verify_req(&ok, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::OK);

        payload.action = "login".to_string();
        let swapped = serde_json::to_value(&payload).unwrap();
        let (status, _, _) = send(&app, verify_req(&swapped, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_challenge_empty_body_defaults_to_login() {
        let app = app(Some(SECRET));
        let request = Request::post(paths::CHALLENGE).body(Body::empty()).unwrap();
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "login");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn test_csrf_rejections() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;
        let challenge = fetch_challenge(&app).await;
        let payload = serde_json::to_value(solved_payload(&challenge)).unwrap();

        // header without cookie
        let (status, _, body) = send(&app, verify_req(&payload, None, Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid CSRF token");

        // cookie without header
        let (status, _, _) = send(&app, verify_req(&payload, Some(&cookie), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // mismatched
        let other = "csrf-token=0000000000000000000000000000000000000000000000000000000000000000";
        let (status, _, _) = send(&app, verify_req(&payload, Some(other), Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // CSRF runs before payload parsing
        let (status, _, _) = send(&app, verify_req(&json!("garbage"), None, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_two_csrf_tokens_are_independent() {
        let app = app(Some(SECRET));
        let (cookie_a, token_a) = csrf_pair(&app).await;
        let (cookie_b, token_b) = csrf_pair(&app).await;
        assert_ne!(token_a, token_b);

        let challenge = fetch_challenge(&app).await;
        let payload = serde_json::to_value(solved_payload(&challenge)).unwrap();

        let (status, _, _) = send(&app, verify_req(&payload, Some(&cookie_a), Some(&token_a))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, verify_req(&payload, Some(&cookie_b), Some(&token_b))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, verify_req(&payload, Some(&cookie_a), Some(&token_b))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;

        let missing = json!({ "challenge": "c1", "salt": "s1", "algorithm": "SHA-256" });
        let (status, _, body) = send(&app, verify_req(&missing, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let request = Request::post(paths::VERIFY)
            .header(header::COOKIE, &cookie)
            .header(headers::X_CSRF_TOKEN, &token)
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_solution = json!({
            "challenge": "c1", "salt": "s1", "signature": "sig1",
            "algorithm": "SHA-256", "solution": "abc"
        });
        let (status, _, _) = send(&app, verify_req(&bad_solution, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparsable_wrapped_payload_is_500() {
        let app = app(Some(SECRET));
        let (cookie, token) = csrf_pair(&app).await;

        let wrapped = json!({ "payload": "{broken" });
        let (status, _, body) = send(&app, verify_req(&wrapped, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Internal server error");

        // Parsable but incomplete stays a 400
        let incomplete = json!({ "payload": json!({ "challenge": "c1" }).to_string() });
        let (status, _, _) = send(&app, verify_req(&incomplete, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsafe_action_is_rejected() {
        let app = app(Some(SECRET));
        let request = Request::post(paths::CHALLENGE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "action": "login?x" }).to_string()))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_timeout_uses_error_body() {
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_request_timeout(slow, Duration::from_millis(20));

        let (status, _, body) = send(&app, get_req("/slow")).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body, json!({ "success": false, "error": "Request timed out" }));
    }

    #[tokio::test]
    async fn test_missing_secret_is_500() {
        let app = app(None);
        let (status, _, body) = send(&app, get_req(paths::CHALLENGE)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Server configuration error");

        let (cookie, token) = csrf_pair(&app).await;
        let payload = json!({
            "challenge": "c1", "salt": "s1", "signature": "sig1",
            "algorithm": "SHA-256", "action": "login", "solution": 1
        });
        let (status, _, _) = send(&app, verify_req(&payload, Some(&cookie), Some(&token))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_wrong_methods_are_405() {
        let app = app(Some(SECRET));

        let (status, _, body) = send(&app, get_req(paths::VERIFY)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["success"], false);

        let put = Request::put(paths::CHALLENGE).body(Body::empty()).unwrap();
        let (status, _, _) = send(&app, put).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let post_csrf = Request::post(paths::CSRF_TOKEN).body(Body::empty()).unwrap();
        let (status, _, _) = send(&app, post_csrf).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let app = app(Some(SECRET));
        let bare = Request::options(paths::VERIFY).body(Body::empty()).unwrap();
        let (status, _, _) = send(&app, bare).await;
        assert_eq!(status, StatusCode::OK);

        let preflight = Request::options(paths::VERIFY)
            .header(header::ORIGIN, "https://dashboard.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-csrf-token")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, preflight).await;
        assert_eq!(status, StatusCode::OK);
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
        assert!(allowed.contains("x-csrf-token"));
    }

    #[tokio::test]
    async fn test_captcha_requires_csrf_and_secret() {
        let app = app(Some(SECRET));
        let body = json!({ "token": "widget-token" }).to_string();

        let request = Request::post(paths::VERIFY_CAPTCHA).body(Body::from(body.clone())).unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // CAPTCHA secret is unset in the test config
        let (cookie, token) = csrf_pair(&app).await;
        let request = Request::post(paths::VERIFY_CAPTCHA)
            .header(header::COOKIE, &cookie)
            .header(headers::X_CSRF_TOKEN, &token)
            .body(Body::from(body))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server configuration error");

        let request = Request::post(paths::VERIFY_CAPTCHA)
            .header(header::COOKIE, &cookie)
            .header(headers::X_CSRF_TOKEN, &token)
            .body(Body::from("{}"))
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(&app(Some(SECRET)), get_req(paths::HEALTH)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pow_ready"], true);
        assert_eq!(body["captcha_ready"], false);
    }
}
