use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::error::ConfigError;

/// Outgoing request payload.
///
/// The form variants carry key/value pairs; [`Payload::Multipart`]
/// produces a `multipart/form-data` body, [`Payload::Form`] a
/// URL-encoded one. Raw bytes pass through unchanged and text is sent
/// as its UTF-8 bytes.
#[derive(Debug, Clone)]
pub enum Payload {
    Form(Vec<(String, String)>),
    Multipart(Vec<(String, String)>),
    Bytes(Bytes),
    Text(String),
}

/// Supported proxy protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Http,
    Socks5,
}

impl ProxyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyKind {
    type Err = ConfigError;

    /// Unrecognized values are a configuration error, raised strictly
    /// before any network attempt.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(ProxyKind::Http),
            "socks5" => Ok(ProxyKind::Socks5),
            other => Err(ConfigError::InvalidProxyType(other.to_string())),
        }
    }
}

/// A proxy target: protocol, `host:port` address and optional
/// basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySpec {
    pub kind: ProxyKind,
    pub addr: String,
    pub auth: Option<(String, String)>,
}

impl ProxySpec {
    /// The `scheme://host:port` form used both as the pool cache key
    /// and as the connect target.
    pub fn proxy_url(&self) -> String {
        format!("{}://{}", self.kind, self.addr)
    }
}

/// A fully validated request, read-only to the transport.
///
/// Built by [`crate::RequestOptions::build`]; every field that can be
/// malformed has already been rejected there.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub data: Option<Payload>,
    pub proxy: Option<ProxySpec>,
    /// Hostname to literal IP overrides, mutually exclusive with `proxy`.
    pub resolve: HashMap<String, IpAddr>,
    /// Budget for establishing the underlying connection.
    pub connect_timeout: Option<Duration>,
    /// Total wall-clock budget for the request, body read included.
    pub timeout: Option<Duration>,
    /// Value injected as `Accept-Encoding` when the caller did not set one.
    pub content_encoding: Option<String>,
    pub decode_content: bool,
    /// Maximum body bytes retained; the excess is discarded silently.
    pub content_read_limit: Option<usize>,
}
