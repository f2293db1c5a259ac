//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use prospector_core::{AuthError, AuthRequest};

use super::handlers::error_response;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Record duration, count and in-flight gauge for every request.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let response = next.run(request).await;
    HTTP_REQUESTS_IN_FLIGHT.dec();

    let status = response.status().as_u16().to_string();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authenticate with the configured method and attach the [`Identity`]
/// to the request. Rejections are `401` with a JSON error body.
///
/// [`Identity`]: prospector_core::Identity
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = request
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(AuthRequest::new(source_ip), |req, (name, value)| {
            req.with_header(name, value)
        });

    match state.authenticator().authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            let reason = match e {
                AuthError::NotAuthenticated => "not_authenticated",
                AuthError::InvalidCredentials(_) => "invalid_credentials",
                AuthError::ConfigurationError(_) => "internal_error",
            };
            AUTH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
            let status = if reason == "internal_error" {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::UNAUTHORIZED
            };
            error_response(status, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Extension, http::header, middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use prospector_core::{ApiKeyAuthenticator, Authenticator, Identity, NoneAuthenticator};
    use tower::ServiceExt;

    use crate::api::test_support::state_with_authenticator;

    async fn whoami(Extension(identity): Extension<Identity>) -> String {
        format!("{}:{}", identity.user_id, identity.method)
    }

    fn app(authenticator: Arc<dyn Authenticator>) -> Router {
        let state = state_with_authenticator(authenticator);
        Router::new()
            .route("/test", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn call(app: Router, header: Option<(&str, &str)>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/test");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_none_auth_allows_all() {
        let (status, body) = call(app(Arc::new(NoneAuthenticator::new("local"))), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "local:none");
    }

    #[tokio::test]
    async fn test_api_key_auth_valid() {
        let auth = Arc::new(ApiKeyAuthenticator::new("secret-key", "local"));
        let (status, body) = call(
            app(auth),
            Some((header::AUTHORIZATION.as_str(), "Bearer secret-key")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "local:api_key");
    }

    #[tokio::test]
    async fn test_x_api_key_header() {
        let auth = Arc::new(ApiKeyAuthenticator::new("secret-key", "local"));
        let (status, _) = call(app(auth), Some(("X-API-Key", "secret-key"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_auth_invalid() {
        let auth = Arc::new(ApiKeyAuthenticator::new("secret-key", "local"));
        let (status, body) = call(
            app(auth),
            Some((header::AUTHORIZATION.as_str(), "Bearer wrong-key")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_api_key_auth_missing() {
        let auth = Arc::new(ApiKeyAuthenticator::new("secret-key", "local"));
        let (status, _) = call(app(auth), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
