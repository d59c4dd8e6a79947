//! HTTP search client for a remote audit log
//!
//! `GET {endpoint}/v1/namespaces/{namespace}/events` with `from`, `to`,
//! repeated `event_type`, `limit` and `start_key`, answered by
//! `{"events": [...], "last_key": "..."}`.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;
use url::Url;

use super::{SearchEvents, SearchQuery};
use crate::config::SourceConfig;
use crate::error::{FerryError, Result};
use crate::event::{AuditEvent, Batch, Cursor};
use crate::tls::{load_certificate, load_identity};

/// Longest response body quoted in an error message
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    events: Vec<AuditEvent>,
    #[serde(default)]
    last_key: String,
}

/// [`SearchEvents`] over HTTPS, with optional bearer token and client certificate
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpSearchClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref ca) = config.ca_path {
            builder = builder.add_root_certificate(load_certificate(ca)?);
        }
        if let (Some(cert), Some(key)) = (&config.cert_path, &config.key_path) {
            builder = builder.identity(load_identity(cert, key)?);
        }

        let client = builder
            .build()
            .map_err(|e| FerryError::Config(format!("Failed to build source client: {}", e)))?;

        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            FerryError::Config(format!("Invalid source endpoint '{}': {}", config.endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(FerryError::Config(format!(
                "Invalid source endpoint '{}': not a base URL",
                config.endpoint
            )));
        }

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
        })
    }

    /// Events route for `namespace`, which is percent-encoded as a single
    /// path segment
    fn events_url(&self, namespace: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "namespaces", namespace, "events"]);
        }
        url
    }
}

/// Query string for one search call, in request order
fn query_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("from", query.from.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        ("to", query.to.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        ("limit", query.limit.to_string()),
    ];
    params.extend(query.types.iter().map(|t| ("event_type", t.clone())));
    if !query.cursor.is_empty() {
        params.push(("start_key", query.cursor.as_str().to_string()));
    }
    params
}

fn request_error(err: reqwest::Error) -> FerryError {
    FerryError::Source {
        transient: err.is_timeout() || err.is_connect() || err.is_request(),
        message: err.to_string(),
    }
}

fn status_error(status: StatusCode, body: &str) -> FerryError {
    let mut body = body.trim().to_string();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    FerryError::Source {
        message: format!("search returned HTTP {}: {}", status.as_u16(), body),
        transient: status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT,
    }
}

#[async_trait]
impl SearchEvents for HttpSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Batch> {
        let mut request = self
            .client
            .get(self.events_url(&query.namespace))
            .query(&query_params(query));
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                FerryError::source_permanent(format!("undecodable search response: {}", e))
            } else {
                request_error(e)
            }
        })?;

        trace!(
            events = body.events.len(),
            last_key = %body.last_key,
            "Search response"
        );
        Ok(Batch::new(body.events, Cursor::new(body.last_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn query() -> SearchQuery {
        SearchQuery {
            from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            namespace: "default".into(),
            types: vec!["user.login".into(), "session.start".into()],
            limit: 20,
            cursor: Cursor::default(),
        }
    }

    #[test]
    fn test_query_params_first_page() {
        let params = query_params(&query());
        assert_eq!(
            params,
            vec![
                ("from", "2024-01-01T00:00:00Z".to_string()),
                ("to", "2024-01-02T00:00:00Z".to_string()),
                ("limit", "20".to_string()),
                ("event_type", "user.login".to_string()),
                ("event_type", "session.start".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_params_with_cursor() {
        let mut q = query();
        q.types.clear();
        q.cursor = Cursor::from("opaque/key==");
        let params = query_params(&q);
        assert_eq!(params.last().unwrap(), &("start_key", "opaque/key==".to_string()));
        assert!(!params.iter().any(|(k, _)| *k == "event_type"));
    }

    #[test]
    fn test_events_url_trims_slash() {
        let client = HttpSearchClient::new(&SourceConfig {
            endpoint: "https://auth.example.com:3025/".into(),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.events_url("default").as_str(),
            "https://auth.example.com:3025/v1/namespaces/default/events"
        );
    }

    #[test]
    fn test_events_url_encodes_namespace() {
        let client = HttpSearchClient::new(&SourceConfig {
            endpoint: "https://auth.example.com:3025".into(),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap();

        let url = client.events_url("team/a?x=1#frag");
        assert_eq!(url.path(), "/v1/namespaces/team%2Fa%3Fx=1%23frag/events");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_events_url_keeps_endpoint_path() {
        let client = HttpSearchClient::new(&SourceConfig {
            endpoint: "https://gateway.example.com/audit/".into(),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.events_url("default").path(),
            "/audit/v1/namespaces/default/events"
        );
    }

    #[test]
    fn test_status_error_classification() {
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!status_error(StatusCode::UNAUTHORIZED, "denied").is_transient());

        let long = "x".repeat(2000);
        let err = status_error(StatusCode::BAD_REQUEST, &long);
        assert!(err.to_string().len() < 600);
    }

    #[test]
    fn test_missing_ca_is_config_error() {
        let err = HttpSearchClient::new(&SourceConfig {
            endpoint: "https://auth.example.com".into(),
            ca_path: Some("/nonexistent/ca.pem".into()),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, FerryError::Config(_)));
    }

    #[test]
    fn test_response_defaults() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.events.is_empty());
        assert!(body.last_key.is_empty());
    }
}
