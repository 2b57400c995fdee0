use std::time::Duration;

use aggregator_core::FailureKind;
use futures_util::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::body::decode_body;
use crate::challenge;
use crate::{EngineEvent, FetchError, FetchMetadata, FetchOutput, FetchStrategy, PipelineEvent};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const FALLBACK_USER_AGENT: &str = concat!("chapter-aggregator/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// `Cookie` header sent by the primary strategy, e.g. a clearance
    /// cookie copied from a browser session.
    pub cookie_header: Option<String>,
    pub referer: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: BROWSER_USER_AGENT.to_string(),
            cookie_header: None,
            referer: None,
        }
    }
}

/// Receives pipeline events as they happen.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: PipelineEvent) {
        self(event)
    }
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(EngineEvent::Pipeline(event));
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one page. Challenge responses come back as
    /// [`FailureKind::Challenge`] errors, never as output.
    async fn fetch(&self, url: &str, strategy: FetchStrategy) -> Result<FetchOutput, FetchError>;
}

/// Two long-lived clients, one per strategy. The primary client keeps a
/// cookie store for the whole session.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    primary: reqwest::Client,
    fallback: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let primary = build_client(&settings, primary_headers(&settings)?, true)?;
        let fallback = build_client(&settings, fallback_headers(), false)?;
        Ok(Self {
            settings,
            primary,
            fallback,
        })
    }

    fn client(&self, strategy: FetchStrategy) -> &reqwest::Client {
        match strategy {
            FetchStrategy::Primary => &self.primary,
            FetchStrategy::Fallback => &self.fallback,
        }
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(too_large(max_bytes, content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(max_bytes, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, strategy: FetchStrategy) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client(strategy)
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if challenge::is_challenge_status(status.as_u16()) {
            return Err(FetchError::new(
                FailureKind::Challenge {
                    status: Some(status.as_u16()),
                },
                format!("HTTP {status}"),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("HTTP {status}"),
            ));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = self.read_body(response).await?;
        let decoded = decode_body(&bytes, content_type.as_deref());
        if challenge::has_challenge_marker(&decoded.text) {
            return Err(FetchError::new(
                FailureKind::Challenge {
                    status: Some(status.as_u16()),
                },
                "challenge page served instead of chapter",
            ));
        }

        Ok(FetchOutput {
            body: decoded.text,
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                status: status.as_u16(),
                content_type,
                encoding_label: decoded.encoding_label,
                byte_len: bytes.len() as u64,
                strategy,
            },
        })
    }
}

fn build_client(
    settings: &FetchSettings,
    headers: HeaderMap,
    cookie_store: bool,
) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
        .default_headers(headers)
        .cookie_store(cookie_store)
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

fn primary_headers(settings: &FetchSettings) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, header_value(&settings.user_agent)?);
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    if let Some(cookie) = settings.cookie_header.as_deref() {
        headers.insert(header::COOKIE, header_value(cookie)?);
    }
    if let Some(referer) = settings.referer.as_deref() {
        headers.insert(header::REFERER, header_value(referer)?);
    }
    Ok(headers)
}

fn fallback_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(FALLBACK_USER_AGENT),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
    headers
}

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value)
        .map_err(|err| FetchError::new(FailureKind::Network, format!("bad header value: {err}")))
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
