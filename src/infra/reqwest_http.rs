//! `Http` port over a shared reqwest client. Transport failures and non-2xx
//! statuses are folded into `FetchResult` instead of surfacing as errors.
use std::time::Duration;

use reqwest::{header, StatusCode};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::domain::model::{ErrorKind, FetchResult};
use crate::ports::http::Http;

const IDLE_POOL_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .pool_idle_timeout(IDLE_POOL_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn transport_error_kind(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_connect() || e.is_request() {
        ErrorKind::ConnectionFailure
    } else {
        ErrorKind::Unexpected
    }
}

fn status_error_kind(status: StatusCode) -> Option<ErrorKind> {
    let code = status.as_u16();
    if status.is_client_error() {
        Some(ErrorKind::Http4xx(code))
    } else if status.is_server_error() {
        Some(ErrorKind::Http5xx(code))
    } else {
        None
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait::async_trait]
impl Http for ReqwestHttp {
    async fn get(&self, url: &str) -> FetchResult {
        let start = Instant::now();
        trace!(url, "GET");

        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                // Dead channels and flaky proxies are routine; keep this quiet.
                debug!(url, error = %e, "GET failed");
                return FetchResult {
                    status: None,
                    body: None,
                    error: Some(transport_error_kind(&e)),
                    latency_ms: elapsed_ms(start),
                };
            }
        };

        let status = resp.status();
        let mut error = status_error_kind(status);
        let body = match resp.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(url, error = %e, "Failed reading body");
                error = error.or(Some(transport_error_kind(&e)));
                None
            }
        };

        let latency_ms = elapsed_ms(start);
        trace!(url, status = status.as_u16(), latency_ms, "GET done");
        FetchResult {
            status: Some(status.as_u16()),
            body,
            error,
            latency_ms,
        }
    }
}
