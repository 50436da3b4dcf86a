use std::sync::Arc;
use std::time::Duration;

use churn_core::SessionCredentials;
use engine_logging::engine_trace;
use futures_util::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT,
};
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use url::Url;

use crate::decode::decode_page;
use crate::{FailureKind, FetchError, PageRequest, PageResult};

/// Simultaneous connections both list fetches may hold against the remote.
pub const MAX_CONCURRENT_CONNECTIONS: usize = 2;

/// Users requested per page.
pub const PAGE_SIZE: u32 = 25;

const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Largest response body accepted for one page.
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_bytes: 2 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Fetches a single page of a relationship list.
#[async_trait::async_trait]
pub trait ListClient: Send + Sync {
    async fn fetch_page(
        &self,
        session: &SessionCredentials,
        request: PageRequest<'_>,
    ) -> Result<PageResult, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestListClient {
    settings: ClientSettings,
    base_url: Url,
    http: reqwest::Client,
    connections: Arc<Semaphore>,
}

impl ReqwestListClient {
    pub fn new(settings: ClientSettings) -> Result<Self, FetchError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidRequest, err.to_string()))?;
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(MAX_CONCURRENT_CONNECTIONS)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            settings,
            base_url,
            http,
            connections: Arc::new(Semaphore::new(MAX_CONCURRENT_CONNECTIONS)),
        })
    }

    /// `{base}/api/v1/friendships/{user_id}/{kind}/?count=N[&max_id=cursor]`
    fn page_url(
        &self,
        session: &SessionCredentials,
        request: PageRequest<'_>,
    ) -> Result<Url, FetchError> {
        let path = format!(
            "api/v1/friendships/{}/{}/",
            session.numeric_account_id(),
            request.list.path_segment()
        );
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|err| FetchError::new(FailureKind::InvalidRequest, err.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("count", &PAGE_SIZE.to_string());
            if let Some(cursor) = request.cursor {
                query.append_pair("max_id", cursor);
            }
        }
        Ok(url)
    }

    fn headers(
        &self,
        session: &SessionCredentials,
        request: PageRequest<'_>,
    ) -> Result<HeaderMap, FetchError> {
        let referer = self
            .base_url
            .join(&format!(
                "{}/{}/",
                request.handle,
                request.list.path_segment()
            ))
            .map_err(|err| FetchError::new(FailureKind::InvalidRequest, err.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&self.settings.user_agent, false)?);
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(REFERER, header_value(referer.as_str(), false)?);
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(
            HeaderName::from_static("x-ig-app-id"),
            header_value(session.app_id(), true)?,
        );
        if !session.csrf_token().is_empty() {
            headers.insert(
                HeaderName::from_static("x-csrftoken"),
                header_value(session.csrf_token(), true)?,
            );
        }
        headers.insert(COOKIE, header_value(&session.cookie_header(), true)?);
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl ListClient for ReqwestListClient {
    async fn fetch_page(
        &self,
        session: &SessionCredentials,
        request: PageRequest<'_>,
    ) -> Result<PageResult, FetchError> {
        let url = self.page_url(session, request)?;
        let headers = self.headers(session, request)?;

        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| FetchError::new(FailureKind::Network, "connection pool closed"))?;
        engine_trace!(
            "[{}] GET {} (cursor present: {})",
            request.list,
            url.path(),
            request.cursor.is_some()
        );

        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::new(FailureKind::RateLimited, status.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: None,
                    },
                    "response exceeded size limit while streaming",
                ));
            }
            body.extend_from_slice(&chunk);
        }
        decode_page(&body)
    }
}

fn header_value(value: &str, sensitive: bool) -> Result<HeaderValue, FetchError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        FetchError::new(
            FailureKind::InvalidRequest,
            "header value contains invalid characters",
        )
    })?;
    header.set_sensitive(sensitive);
    Ok(header)
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Decode, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
