//! Requests, responses and the network the worker fetches through.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::trace;

use super::{Result, WorkerError};

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// Any other method, upper-cased.
    Other(String),
}

impl Method {
    /// The method name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request the page makes.
///
/// Cached responses are keyed by `url` after [`Network::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute URL, or a path relative to the app origin.
    pub url: String,
}

impl Request {
    /// Create a request.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    /// Create a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Whether this is a GET request.
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }
}

/// A response, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response was produced for.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers in received order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with no headers.
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that can perform requests.
///
/// An `Err` means no response arrived at all (connection refused, DNS
/// failure, timeout). Error statuses are successful fetches.
#[async_trait]
pub trait Network: Send + Sync + fmt::Debug {
    /// Perform `request` and buffer the whole response.
    async fn fetch(&self, request: &Request) -> Result<Response>;

    /// The absolute URL a request for `url` goes to.
    ///
    /// Cache entries are keyed by this, so `/` and the origin's root share one.
    fn resolve(&self, url: &str) -> String {
        url.to_string()
    }
}

/// [`Network`] backed by `reqwest`, resolving relative URLs against the app origin.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl HttpNetwork {
    /// Create a network client for the given origin.
    ///
    /// # Errors
    ///
    /// Returns an error if `origin` is not an absolute URL or the HTTP client
    /// cannot be built.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| WorkerError::network(format!("invalid origin {origin}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::network(e.to_string()))?;
        Ok(Self { client, origin })
    }

    /// The origin relative URLs are resolved against.
    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn join(&self, url: &str) -> Result<Url> {
        self.origin
            .join(url)
            .map_err(|e| WorkerError::network(format!("invalid URL {url}: {e}")))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = self.join(&request.url)?;
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| WorkerError::network(format!("invalid method {}: {e}", request.method)))?;

        trace!(method = %request.method, url = %url, "Fetching");
        let response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| WorkerError::network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::network(e.to_string()))?
            .to_vec();

        Ok(Response {
            url: request.url.clone(),
            status,
            headers,
            body,
        })
    }

    fn resolve(&self, url: &str) -> String {
        self.join(url).map_or_else(|_| url.to_string(), String::from)
    }
}
