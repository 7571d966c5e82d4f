//! Axum route handlers for the edge-compose proxy.
//!
//! # Routes
//!
//! - `GET /health` — liveness probe
//! - anything else — proxied to the content API; composition route
//!   responses are resolved, everything else passes through verbatim
//!
//! The proxy handler is the request orchestrator: it extracts quirks and
//! session tokens, fetches the upstream route and the profile traits
//! concurrently, and resolves the composition tree only when the upstream
//! call succeeded, the path is the route endpoint, and the payload carries
//! the `composition` discriminant. Any error anywhere in the pipeline is
//! converted into a fixed-shape 500 page; nothing propagates uncaught.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::join;
use tower_http::cors::CorsLayer;

use crate::composition::node::{is_composition_payload, CompositionRoute};
use crate::composition::resolver::{ResolverOptions, TreeResolver};
use crate::context::adapter::DecisionContext;
use crate::context::engine::DecisionEngine;
use crate::context::quirks::{
    merge_quirks, quirks_from_headers, quirks_from_traits, session_tokens_from_cookie, Quirks,
    SessionTokens,
};
use crate::error::{Error, Result};
use crate::profile::{TraitProvider, ANONYMOUS_ID_HEADER, USER_ID_HEADER};
use crate::upstream::{is_route_path, UpstreamClient, UpstreamResponse};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Content API client.
    pub upstream: Arc<UpstreamClient>,
    /// Profile trait collaborator.
    pub traits: Arc<dyn TraitProvider>,
    /// Decision engine, shared read-only; per-request state lives in the
    /// [`DecisionContext`] built for each request.
    pub engine: Arc<dyn DecisionEngine>,
    /// Tree resolver options.
    pub options: ResolverOptions,
}

/// Build the axum router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(proxy_handler)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "edge-compose",
    }))
}

/// Proxy every non-health request through the resolution pipeline. This is
/// the single catch point: pipeline errors become the fixed error page.
async fn proxy_handler(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    match run_pipeline(&state, &headers, &uri).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, path = %uri.path(), "pipeline failed");
            error_page(&err)
        }
    }
}

/// Fixed-shape 500 response embedding the error description.
pub fn error_page(err: &Error) -> Response {
    let body = format!(
        "<html><body><h1>Internal Server Error: {}</h1></body></html>",
        err
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [("Content-Type", "text/html")],
        body,
    )
        .into_response()
}

async fn run_pipeline(state: &AppState, headers: &HeaderMap, uri: &Uri) -> Result<Response> {
    let path = uri.path();
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path);

    let quirk_headers = quirks_from_headers(headers);
    let tokens = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .map(session_tokens_from_cookie)
        .unwrap_or_default();

    let user_id = header_str(headers, USER_ID_HEADER);
    let anonymous_id = header_str(headers, ANONYMOUS_ID_HEADER);

    // Both network calls are read-only and independent; both must complete
    // before the decision context is built.
    let (upstream, traits) = join!(
        state.upstream.fetch_route(path_and_query),
        state.traits.traits_for(user_id, anonymous_id),
    );
    let upstream = upstream?;
    let traits = traits?;

    if !upstream.is_ok() || !is_route_path(path) {
        return Ok(pass_through(upstream));
    }

    let payload: serde_json::Value = serde_json::from_str(&upstream.body)?;
    if !is_composition_payload(&payload) {
        return Ok(pass_through(upstream));
    }

    let mut route: CompositionRoute = serde_json::from_value(payload)?;

    let quirks = merge_quirks([quirks_from_traits(&traits), quirk_headers]);
    resolve_route(state, &mut route, &tokens, &quirks);

    let body = serde_json::to_string(&route)?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "application/json")],
        body,
    )
        .into_response())
}

/// Build a per-request decision context and resolve the composition tree.
fn resolve_route(
    state: &AppState,
    route: &mut CompositionRoute,
    tokens: &SessionTokens,
    quirks: &Quirks,
) {
    let context = DecisionContext::initialize(Arc::clone(&state.engine), tokens, quirks);
    let resolver = TreeResolver::with_options(&context, state.options);
    resolver.resolve(&mut route.composition_api_response.composition);
    tracing::debug!("composition resolved");
}

/// Forward a non-resolvable upstream response verbatim. Length-sensitive
/// headers are dropped because the body was already decoded.
fn pass_through(upstream: UpstreamResponse) -> Response {
    let mut builder = Response::builder().status(upstream.status);
    for (name, value) in &upstream.headers {
        if name == "content-length" || name == "transfer-encoding" {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(upstream.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::context::engine::ScoringEngine;
    use crate::context::manifest::SignalManifest;
    use crate::profile::NoTraits;

    fn test_state() -> AppState {
        AppState {
            upstream: Arc::new(UpstreamClient::new(
                reqwest::Client::new(),
                "upstream.invalid",
                "key",
                "proj",
            )),
            traits: Arc::new(NoTraits),
            engine: Arc::new(ScoringEngine::new(SignalManifest::default_manifest())),
            options: ResolverOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app_router(test_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "edge-compose");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_yields_error_page() {
        // .invalid never resolves, so the pipeline fails at the fetch and
        // must surface the fixed 500 page rather than propagate.
        let app = app_router(test_state());

        let request = Request::builder()
            .uri("/api/v1/route?path=%2F")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/html"
        );

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("Internal Server Error"));
    }

    #[test]
    fn test_error_page_embeds_message() {
        let response = error_page(&Error::Config("UNIFORM_API_KEY is not set".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/html");
    }

    #[test]
    fn test_pass_through_preserves_status_and_body() {
        let upstream = UpstreamResponse {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            body: "{\"type\":\"redirect\"}".to_string(),
        };
        let response = pass_through(upstream);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pass_through_drops_length_sensitive_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-length", "999".parse().unwrap());
        headers.insert("x-custom", "kept".parse().unwrap());
        let upstream = UpstreamResponse {
            status: StatusCode::OK,
            headers,
            body: "{}".to_string(),
        };
        let response = pass_through(upstream);
        assert_ne!(
            response
                .headers()
                .get("content-length")
                .map(|v| v.to_str().unwrap()),
            Some("999")
        );
        assert_eq!(response.headers().get("x-custom").unwrap(), "kept");
    }
}
