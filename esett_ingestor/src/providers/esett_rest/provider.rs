use std::{num::NonZeroU32, sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode, Url};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    codec::RawRecord,
    models::{range::TimeRange, series::Series, zone::Zone},
    providers::{
        ClientBuildSnafu, InvalidBaseUrlSnafu, PageStream, PayloadSnafu, ProviderError,
        ProviderInitError, RejectedSnafu, TransportSnafu, UpstreamSource,
        esett_rest::{
            params::{WindowCursor, construct_params},
            retry::{AttemptError, RetryPolicy, retry},
        },
    },
};

/// Public eSett Open Data endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.opendata.esett.com";

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Tunables for [`EsettProvider`].
#[derive(Debug, Clone)]
pub struct EsettSettings {
    /// Scheme and host, optionally with a path prefix.
    pub base_url: String,
    /// Widest time window requested in one HTTP call.
    pub page_span: chrono::Duration,
    /// Backoff for transient failures, applied per page.
    pub retry: RetryPolicy,
    /// Per-request timeout set on the HTTP client.
    pub request_timeout: Duration,
    /// Client-side cap on HTTP requests per second.
    pub requests_per_second: u32,
}

impl Default for EsettSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_span: chrono::Duration::days(7),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            requests_per_second: 5,
        }
    }
}

/// [`UpstreamSource`] over the eSett Open Data REST API, paginating by time
/// window.
pub struct EsettProvider {
    client: Client,
    base_url: String,
    page_span: chrono::Duration,
    retry: RetryPolicy,
    limiter: Arc<DirectLimiter>,
}

impl EsettProvider {
    /// Creates a new eSett provider. The open data API needs no credentials.
    pub fn new(settings: EsettSettings) -> Result<Self, ProviderInitError> {
        let parsed = Url::parse(&settings.base_url).map_err(|e| {
            InvalidBaseUrlSnafu {
                url: settings.base_url.clone(),
                message: e.to_string(),
            }
            .build()
        })?;
        if parsed.cannot_be_a_base() {
            return InvalidBaseUrlSnafu {
                url: settings.base_url,
                message: "URL cannot carry a path",
            }
            .fail();
        }

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context(ClientBuildSnafu)?;

        let rps = NonZeroU32::new(settings.requests_per_second).unwrap_or(nonzero!(1u32));

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            page_span: settings.page_span,
            retry: settings.retry,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }

    fn endpoint(&self, series: Series) -> String {
        format!("{}{}", self.base_url, series.dataset_path())
    }

    /// Fetch one window, retrying transient failures.
    async fn fetch_window(
        &self,
        series: Series,
        zone: Zone,
        window: TimeRange,
    ) -> Result<Vec<RawRecord>, ProviderError> {
        let url = self.endpoint(series);
        let params = construct_params(zone, window);
        retry(&self.retry, "eSett request", || self.attempt(&url, &params)).await
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<RawRecord>, AttemptError> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        if !status.is_success() {
            let raw_body = response.text().await.unwrap_or_default();
            let message = summarize_response_body(&raw_body);
            return Err(if is_transient_status(status) {
                AttemptError::Transient(format!("HTTP {status}: {message}"))
            } else {
                AttemptError::Fatal(
                    RejectedSnafu {
                        status: status.as_u16(),
                        message,
                    }
                    .build(),
                )
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(classify_transport_error)?;

        serde_json::from_slice::<Vec<RawRecord>>(&body).map_err(|e| {
            AttemptError::Fatal(
                PayloadSnafu {
                    message: format!(
                        "{e}; body: {}",
                        summarize_response_body(&String::from_utf8_lossy(&body))
                    ),
                }
                .build(),
            )
        })
    }
}

impl UpstreamSource for EsettProvider {
    fn fetch_page_sequence(&self, series: Series, zone: Zone, range: TimeRange) -> PageStream<'_> {
        let cursor = WindowCursor::new(range, self.page_span);
        stream::try_unfold(cursor, move |mut cursor| async move {
            let Some(window) = cursor.next() else {
                return Ok(None);
            };
            debug!(%series, %zone, %window, "requesting eSett page");
            let page = self.fetch_window(series, zone, window).await?;
            debug!(%series, %zone, rows = page.len(), "received eSett page");
            Ok(Some((page, cursor)))
        })
        .boxed()
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn classify_transport_error(err: reqwest::Error) -> AttemptError {
    let message = format_reqwest_error(&err);
    if err.is_builder() {
        AttemptError::Fatal(TransportSnafu { message }.build())
    } else {
        AttemptError::Transient(message)
    }
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    use std::error::Error as _;

    // Keep chained causes so DNS/TLS/socket failures are visible.
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }
    message
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact: String = raw
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if compact.chars().count() > MAX_CHARS {
        let head: String = compact.chars().take(MAX_CHARS).collect();
        format!("{head}…")
    } else {
        compact
    }
}
