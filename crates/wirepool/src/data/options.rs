use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use url::Url;

use super::request::{Payload, ProxyKind, ProxySpec, Request};
use crate::error::ConfigError;

/// Caller-facing request configuration.
///
/// Setters accumulate; [`RequestOptions::build`] validates everything
/// and produces the immutable [`Request`] the transport executes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wirepool::{Payload, RequestOptions};
///
/// let options = RequestOptions::new("https://example.com/submit")
///     .method(http::Method::POST)
///     .header("X-Token", "abc")
///     .data(Payload::Form(vec![("q".into(), "rust".into())]))
///     .connect_timeout(Duration::from_secs(2))
///     .timeout(Duration::from_secs(10));
///
/// let request = options.build().unwrap();
/// assert_eq!(request.method, http::Method::POST);
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    data: Option<Payload>,
    proxy: Option<String>,
    proxy_kind: ProxyKind,
    proxy_auth: Option<(String, String)>,
    resolve: HashMap<String, IpAddr>,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    content_encoding: Option<String>,
    decode_content: bool,
    content_read_limit: Option<usize>,
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: Vec::new(),
            data: None,
            proxy: None,
            proxy_kind: ProxyKind::Http,
            proxy_auth: None,
            resolve: HashMap::new(),
            connect_timeout: None,
            timeout: None,
            content_encoding: None,
            decode_content: true,
            content_read_limit: None,
        }
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a single request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    /// Route the request through a proxy at `host:port`.
    #[must_use]
    pub fn proxy(mut self, addr: impl Into<String>) -> Self {
        self.proxy = Some(addr.into());
        self
    }

    /// Proxy protocol; defaults to HTTP. String configuration can go
    /// through [`ProxyKind`]'s `FromStr` impl first.
    #[must_use]
    pub fn proxy_type(mut self, kind: ProxyKind) -> Self {
        self.proxy_kind = kind;
        self
    }

    #[must_use]
    pub fn proxy_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.proxy_auth = Some((user.into(), password.into()));
        self
    }

    /// Override DNS resolution for a hostname. Mutually exclusive with
    /// `proxy`; the transport rejects the combination before any
    /// socket activity.
    #[must_use]
    pub fn resolve(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.resolve.insert(host.into(), ip);
        self
    }

    /// Budget for establishing the underlying connection.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Total wall-clock budget for the request, body read included.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value offered as `Accept-Encoding` when no such header is set.
    #[must_use]
    pub fn content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    #[must_use]
    pub fn decode_content(mut self, decode: bool) -> Self {
        self.decode_content = decode;
        self
    }

    /// Maximum body bytes to retain; the rest is discarded without error.
    #[must_use]
    pub fn content_read_limit(mut self, limit: usize) -> Self {
        self.content_read_limit = Some(limit);
        self
    }

    /// Validate the accumulated options into a [`Request`].
    pub fn build(self) -> Result<Request, ConfigError> {
        let url = Url::parse(&self.url).map_err(ConfigError::InvalidUrl)?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    source: e.into(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    source: e.into(),
                })?;
            headers.append(header_name, header_value);
        }

        let proxy = self.proxy.map(|addr| ProxySpec {
            kind: self.proxy_kind,
            addr,
            auth: self.proxy_auth,
        });

        Ok(Request {
            url,
            method: self.method,
            headers,
            data: self.data,
            proxy,
            resolve: self.resolve,
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
            content_encoding: self.content_encoding,
            decode_content: self.decode_content,
            content_read_limit: self.content_read_limit,
        })
    }
}
