//! HTTP extraction machinery shared by all connectors.
//!
//! The transport is a capability — "fetch(path, params) → JSON or failure" —
//! injected into the extractors so connector pagination and backoff logic is
//! testable against a scripted transport. [`HttpTransport`] is the reqwest
//! implementation used in production.
//!
//! Extraction never fails the pipeline. Both loops fail closed: on a
//! transport or decode error they log and return whatever has been collected
//! so far, possibly nothing. HTTP 429 is flow control, not an error; each
//! loop applies its source's backoff policy and retries.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::error::PipelineError;

/// One fetch attempt. Rate limiting is surfaced as a distinct outcome so
/// callers can apply their backoff policy instead of treating it as failure.
#[derive(Debug)]
pub enum FetchOutcome {
    Json(Value),
    RateLimited,
}

/// Capability for GET-with-query-parameters against a JSON API.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<FetchOutcome, PipelineError>;
}

/// Production transport backed by a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, PipelineError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &http.api_token {
            let value = format!("Bearer {}", token)
                .parse()
                .map_err(|_| PipelineError::Transport("invalid api token".to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<FetchOutcome, PipelineError> {
        let url = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Ok(FetchOutcome::RateLimited);
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let json = response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        Ok(FetchOutcome::Json(json))
    }
}

/// Paged-retrieval loop over `_page`/`_limit` offset parameters.
///
/// `records_of` unwraps one page into records; an empty page terminates the
/// loop. Sources known not to paginate set `paginates = false` and the loop
/// exits after the first successful page regardless of content. On 429 the
/// backoff doubles and the same page is retried; a successful page resets it,
/// so pacing between pages stays at the configured base delay.
pub async fn fetch_paged<F>(
    transport: &dyn ApiTransport,
    path: &str,
    page_size: usize,
    paginates: bool,
    base_delay: Duration,
    records_of: F,
) -> Vec<Value>
where
    F: Fn(Value) -> Vec<Value>,
{
    let mut collected = Vec::new();
    let mut backoff = base_delay;
    let mut page: usize = 1;

    loop {
        let params = [
            ("_page", page.to_string()),
            ("_limit", page_size.to_string()),
        ];

        match transport.get_json(path, &params).await {
            Ok(FetchOutcome::RateLimited) => {
                backoff *= 2;
                warn!(path, page, delay_ms = backoff.as_millis() as u64, "rate limited, backing off");
                tokio::time::sleep(backoff).await;
                continue;
            }
            Ok(FetchOutcome::Json(body)) => {
                backoff = base_delay;
                let records = records_of(body);
                if records.is_empty() {
                    break;
                }
                collected.extend(records);

                if !paginates {
                    break;
                }
                page += 1;
                tokio::time::sleep(base_delay).await;
            }
            Err(e) => {
                warn!(path, page, error = %e, "extraction aborted, returning collected records");
                break;
            }
        }
    }

    info!(path, records = collected.len(), "extraction finished");
    collected
}

/// Single bounded-window request with a retry-once rate-limit policy: on
/// 429 sleep the fixed per-source delay and repeat the same request one time.
pub async fn fetch_window_once(
    transport: &dyn ApiTransport,
    path: &str,
    params: &[(&str, String)],
    retry_delay: Duration,
) -> Option<Value> {
    for attempt in 0..2 {
        match transport.get_json(path, params).await {
            Ok(FetchOutcome::Json(body)) => return Some(body),
            Ok(FetchOutcome::RateLimited) => {
                if attempt == 0 {
                    warn!(path, delay_ms = retry_delay.as_millis() as u64, "rate limited, retrying once");
                    tokio::time::sleep(retry_delay).await;
                } else {
                    warn!(path, "rate limited twice, giving up on this window");
                }
            }
            Err(e) => {
                warn!(path, error = %e, "window fetch failed");
                return None;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted transport: pops one canned response per call.
    struct ScriptedTransport {
        responses: Mutex<Vec<Result<FetchOutcome, PipelineError>>>,
    }

    impl ScriptedTransport {
        fn new(mut responses: Vec<Result<FetchOutcome, PipelineError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl ApiTransport for ScriptedTransport {
        async fn get_json(
            &self,
            _path: &str,
            _params: &[(&str, String)],
        ) -> Result<FetchOutcome, PipelineError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(FetchOutcome::Json(serde_json::json!([]))))
        }
    }

    fn array_records(body: Value) -> Vec<Value> {
        match body {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    fn page(ids: &[i64]) -> Result<FetchOutcome, PipelineError> {
        let items: Vec<Value> = ids.iter().map(|id| serde_json::json!({ "id": id })).collect();
        Ok(FetchOutcome::Json(Value::Array(items)))
    }

    #[tokio::test]
    async fn test_pagination_terminates_on_empty_page() {
        let transport = ScriptedTransport::new(vec![page(&[1, 2]), page(&[3]), page(&[])]);
        let records = fetch_paged(
            &transport,
            "posts",
            2,
            true,
            Duration::ZERO,
            array_records,
        )
        .await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_single_page_source_stops_after_first_page() {
        // More data is scripted, but the source is marked non-paginating.
        let transport = ScriptedTransport::new(vec![page(&[1, 2, 3]), page(&[4, 5])]);
        let records = fetch_paged(
            &transport,
            "posts",
            20,
            false,
            Duration::ZERO,
            array_records,
        )
        .await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_same_page() {
        let transport = ScriptedTransport::new(vec![
            Ok(FetchOutcome::RateLimited),
            page(&[1, 2]),
        ]);
        let records = fetch_paged(
            &transport,
            "posts",
            2,
            false,
            Duration::ZERO,
            array_records,
        )
        .await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_resets_after_successful_page() {
        // 429, page, 429, empty. The second 429 must back off from the base
        // delay again (200ms), not from the already-doubled value (400ms),
        // and the inter-page pause stays at the 100ms base.
        let transport = ScriptedTransport::new(vec![
            Ok(FetchOutcome::RateLimited),
            page(&[1]),
            Ok(FetchOutcome::RateLimited),
            page(&[]),
        ]);
        let start = tokio::time::Instant::now();
        let records = fetch_paged(
            &transport,
            "posts",
            1,
            true,
            Duration::from_millis(100),
            array_records,
        )
        .await;
        let elapsed = start.elapsed();
        assert_eq!(records.len(), 1);
        // 200ms backoff + 100ms inter-page + 200ms backoff
        assert!(elapsed >= Duration::from_millis(400), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_transport_error_returns_collected_so_far() {
        let transport = ScriptedTransport::new(vec![
            page(&[1, 2]),
            Err(PipelineError::Transport("boom".to_string())),
        ]);
        let records = fetch_paged(
            &transport,
            "posts",
            2,
            true,
            Duration::ZERO,
            array_records,
        )
        .await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_error_on_first_page_returns_empty() {
        let transport = ScriptedTransport::new(vec![Err(PipelineError::Decode(
            "bad json".to_string(),
        ))]);
        let records = fetch_paged(
            &transport,
            "posts",
            2,
            true,
            Duration::ZERO,
            array_records,
        )
        .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_window_retries_once_on_rate_limit() {
        let transport = ScriptedTransport::new(vec![
            Ok(FetchOutcome::RateLimited),
            Ok(FetchOutcome::Json(serde_json::json!({ "vulnerabilities": [] }))),
        ]);
        let body = fetch_window_once(&transport, "", &[], Duration::ZERO).await;
        assert!(body.is_some());
    }

    #[tokio::test]
    async fn test_window_gives_up_after_second_rate_limit() {
        let transport = ScriptedTransport::new(vec![
            Ok(FetchOutcome::RateLimited),
            Ok(FetchOutcome::RateLimited),
        ]);
        let body = fetch_window_once(&transport, "", &[], Duration::ZERO).await;
        assert!(body.is_none());
    }
}
