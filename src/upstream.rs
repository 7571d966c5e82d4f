//! Upstream composition fetch.
//!
//! Rewrites the inbound request to the fixed content API host, preserving
//! the original path and query, appending the project identifier, and
//! attaching the API key and JSON content headers. One GET per request,
//! fixed timeout, no retries: any transport failure is converted to the
//! generic error response by the orchestrator.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};

use crate::error::Result;

/// Fixed upstream call timeout.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Route path whose responses are eligible for resolution.
pub const ROUTE_PATH: &str = "/api/v1/route";

/// Raw upstream response, body undecoded so pass-through stays faithful.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl UpstreamResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}

/// Client for the content API.
pub struct UpstreamClient {
    client: reqwest::Client,
    host: String,
    api_key: String,
    project_id: String,
}

impl UpstreamClient {
    pub fn new(
        client: reqwest::Client,
        host: impl Into<String>,
        api_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
            project_id: project_id.into(),
        }
    }

    /// Upstream URL for an inbound path-and-query string.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let separator = if path_and_query.contains('?') { '&' } else { '?' };
        format!(
            "https://{}{}{}projectId={}",
            self.host, path_and_query, separator, self.project_id
        )
    }

    /// Fetch the route resource behind the inbound path and query.
    pub async fn fetch_route(&self, path_and_query: &str) -> Result<UpstreamResponse> {
        let url = self.url_for(path_and_query);
        tracing::debug!(url = %url, "fetching upstream route");

        let response = self
            .client
            .get(&url)
            .timeout(UPSTREAM_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("edge-compose/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            if let (Ok(name), Ok(value)) = (
                axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
                axum::http::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }
        let body = response.text().await?;

        tracing::debug!(status = %status, bytes = body.len(), "upstream responded");

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Whether an inbound path targets the resolvable route endpoint.
/// Case-insensitive, query excluded.
pub fn is_route_path(path: &str) -> bool {
    path.eq_ignore_ascii_case(ROUTE_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> UpstreamClient {
        UpstreamClient::new(reqwest::Client::new(), "uniform.global", "key", "proj-1")
    }

    #[test]
    fn test_url_appends_project_id_without_query() {
        assert_eq!(
            client().url_for("/api/v1/route"),
            "https://uniform.global/api/v1/route?projectId=proj-1"
        );
    }

    #[test]
    fn test_url_appends_project_id_with_query() {
        assert_eq!(
            client().url_for("/api/v1/route?path=%2F"),
            "https://uniform.global/api/v1/route?path=%2F&projectId=proj-1"
        );
    }

    #[test]
    fn test_route_path_match_is_case_insensitive() {
        assert!(is_route_path("/api/v1/route"));
        assert!(is_route_path("/API/V1/Route"));
        assert!(!is_route_path("/api/v1/routes"));
        assert!(!is_route_path("/other"));
    }
}
