//! HTTP probe implementation.

use super::{Probe, ProbeError, ProbeOutcome, TargetSpec};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Probe that issues one HTTP request per check.
///
/// The underlying client is shared across all checks so connections can be
/// reused between rounds. Deadlines are applied per request.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        Ok(Self { client })
    }

    fn build_request(
        &self,
        target: &TargetSpec,
        deadline: Duration,
    ) -> Result<reqwest::RequestBuilder, ProbeError> {
        let method = if target.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(target.method.as_bytes())
                .map_err(|e| ProbeError::Request(format!("invalid method {:?}: {}", target.method, e)))?
        };

        let url = Url::parse(&target.url)
            .map_err(|e| ProbeError::Request(format!("invalid url {:?}: {}", target.url, e)))?;

        let mut headers = HeaderMap::with_capacity(target.headers.len());
        for (key, value) in &target.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ProbeError::Request(format!("invalid header name {:?}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProbeError::Request(format!("invalid value for header {}: {}", key, e)))?;
            headers.insert(name, value);
        }

        Ok(self
            .client
            .request(method, url)
            .headers(headers)
            .timeout(deadline))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(
        &self,
        target: &TargetSpec,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome {
        let start = Instant::now();

        let request = match self.build_request(target, deadline) {
            Ok(r) => r,
            Err(e) => {
                return ProbeOutcome::failed(target, e, "failed to create request", start.elapsed())
            }
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            res = request.send() => res.map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(deadline)
                } else {
                    ProbeError::Network(e.to_string())
                }
            }),
        };

        let response = match sent {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::failed(target, e, "request failed", start.elapsed()),
        };

        let response_time = start.elapsed();
        let status = response.status().as_u16();

        let mut outcome = ProbeOutcome {
            target_name: target.name.clone(),
            url: target.url.clone(),
            status,
            response_time,
            up: status == target.expected_status,
            message: String::new(),
            error: None,
            timestamp: Utc::now(),
        };

        outcome.message = if outcome.up {
            format!("status {} (as expected)", status)
        } else {
            format!("status {} (expected {})", status, target.expected_status)
        };

        let needle = target.check_content.as_deref().filter(|n| !n.is_empty());
        if let (Some(needle), true) = (needle, outcome.up) {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ProbeError::Cancelled),
                res = response.bytes() => res.map_err(|e| ProbeError::Body(e.to_string())),
            };

            match body {
                Ok(bytes) => {
                    if !String::from_utf8_lossy(&bytes).contains(needle) {
                        outcome.up = false;
                        outcome.message = format!("content check failed: '{}' not found", needle);
                    }
                }
                Err(e) => {
                    outcome.up = false;
                    outcome.error = Some(e);
                    outcome.message = "failed to read response body".to_string();
                }
            }
        } else {
            drop(response);
        }

        outcome.timestamp = Utc::now();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap as AxumHeaders, http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn spawn_server() -> SocketAddr {
        let app = Router::new()
            .route("/ok", get(|| async { "SYSTEM OK" }))
            .route("/error", get(|| async { "ERROR" }))
            .route(
                "/fail",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "SYSTEM OK") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/auth",
                get(|headers: AxumHeaders| async move {
                    match headers.get("x-token").and_then(|v| v.to_str().ok()) {
                        Some("secret") => (StatusCode::OK, "welcome"),
                        _ => (StatusCode::UNAUTHORIZED, "denied"),
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn target(addr: SocketAddr, path: &str) -> TargetSpec {
        TargetSpec::new("test", &format!("http://{}{}", addr, path))
    }

    async fn run(target: &TargetSpec) -> ProbeOutcome {
        let probe = HttpProbe::new().unwrap();
        probe
            .probe(target, Duration::from_secs(2), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_expected_status_is_up() {
        let addr = spawn_server().await;
        let outcome = run(&target(addr, "/ok")).await;

        assert!(outcome.up);
        assert_eq!(outcome.status, 200);
        assert!(outcome.message.contains("200"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_status_mismatch_is_down() {
        let addr = spawn_server().await;
        let outcome = run(&target(addr, "/fail")).await;

        assert!(!outcome.up);
        assert_eq!(outcome.status, 500);
        assert!(outcome.message.contains("500"));
        assert!(outcome.message.contains("200"));
    }

    #[tokio::test]
    async fn test_content_match() {
        let addr = spawn_server().await;

        let mut ok = target(addr, "/ok");
        ok.check_content = Some("OK".to_string());
        assert!(run(&ok).await.up);

        let mut error = target(addr, "/error");
        error.check_content = Some("OK".to_string());
        let outcome = run(&error).await;
        assert!(!outcome.up);
        assert_eq!(outcome.status, 200);
        assert!(outcome.message.contains("'OK' not found"));
    }

    #[tokio::test]
    async fn test_content_match_does_not_rescue_bad_status() {
        let addr = spawn_server().await;
        let mut t = target(addr, "/fail");
        t.check_content = Some("OK".to_string());

        let outcome = run(&t).await;
        assert!(!outcome.up);
        assert_eq!(outcome.message, "status 500 (expected 200)");
    }

    #[tokio::test]
    async fn test_custom_expected_status() {
        let addr = spawn_server().await;
        let mut t = target(addr, "/auth");
        t.expected_status = 401;

        assert!(run(&t).await.up);
    }

    #[tokio::test]
    async fn test_headers_are_sent() {
        let addr = spawn_server().await;
        let mut t = target(addr, "/auth");
        t.headers.insert("X-Token".to_string(), "secret".to_string());

        let outcome = run(&t).await;
        assert!(outcome.up, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let mut t = TargetSpec::new("bad", "http://127.0.0.1:1/");
        t.method = "BAD METHOD".to_string();

        let outcome = run(&t).await;
        assert!(!outcome.up);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.message, "failed to create request");
        assert!(matches!(outcome.error, Some(ProbeError::Request(_))));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let outcome = run(&TargetSpec::new("bad", "not a url")).await;
        assert_eq!(outcome.message, "failed to create request");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let outcome = run(&TargetSpec::new("refused", "http://127.0.0.1:1/")).await;

        assert!(!outcome.up);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.message, "request failed");
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let addr = spawn_server().await;
        let probe = HttpProbe::new().unwrap();

        let outcome = probe
            .probe(
                &target(addr, "/slow"),
                Duration::from_millis(100),
                &CancellationToken::new(),
            )
            .await;

        assert!(!outcome.up);
        assert_eq!(outcome.message, "request failed");
        assert_eq!(
            outcome.error,
            Some(ProbeError::Timeout(Duration::from_millis(100)))
        );
    }

    #[tokio::test]
    async fn test_cancelled_probe() {
        let addr = spawn_server().await;
        let probe = HttpProbe::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = probe
            .probe(&target(addr, "/slow"), Duration::from_secs(5), &cancel)
            .await;

        assert!(!outcome.up);
        assert_eq!(outcome.error, Some(ProbeError::Cancelled));
    }
}
