//! The backend seam.
//!
//! The transport talks to connection pools only through these traits,
//! so production traffic and tests share one execution path. The
//! production implementation lives in [`crate::ReqwestBackend`]; tests
//! substitute scripted pools.

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::data::ProxySpec;
use crate::error::{BackendFault, ConfigError};

/// A boxed stream of response body chunks.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Shared hostname → literal IP overrides, consulted before system DNS.
///
/// The transport installs per-request overrides here; the direct pool's
/// resolver reads them. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct ResolverCache {
    inner: Arc<Mutex<HashMap<String, IpAddr>>>,
}

impl ResolverCache {
    pub fn insert(&self, host: impl Into<String>, ip: IpAddr) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.into(), ip);
    }

    pub fn lookup(&self, host: &str) -> Option<IpAddr> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .copied()
    }
}

/// One outgoing call, fully assembled by the transport.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub connect_timeout: Option<Duration>,
    /// Per-read budget; the total wall-clock budget is enforced by the
    /// transport's body reader, not the backend.
    pub read_timeout: Option<Duration>,
    pub decode_content: bool,
    /// Content coding to negotiate. With `decode_content` set the
    /// backend narrows its transparent decompression to this coding
    /// rather than sending a literal header, which would turn
    /// decompression off.
    pub content_encoding: Option<String>,
}

/// Response head plus the open body stream.
///
/// Dropping the reply (or finishing its stream) releases the borrowed
/// connection back to its pool; ownership makes the release happen
/// exactly once on every exit path.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// DER bytes of the peer's leaf certificate when TLS introspection
    /// is available. Intermediates are not exposed.
    pub peer_cert: Option<Vec<u8>>,
    pub body: BoxStream<'static, Result<Bytes, BackendFault>>,
}

/// One connection pool.
pub trait Pool: Send + Sync {
    /// Issue exactly one attempt. Retry policy lives with the caller.
    fn send(&self, call: SendRequest) -> impl Future<Output = Result<Reply, BackendFault>> + Send;
}

/// Factory for the pools a [`crate::PoolRegistry`] manages.
pub trait Backend: Send + Sync {
    type Pool: Pool + Send + Sync + 'static;

    /// Pool for direct traffic; honors the shared resolution overrides.
    fn direct(&self, resolver: ResolverCache) -> Result<Self::Pool, ConfigError>;

    /// Pool routing all traffic through the given proxy.
    fn proxied(&self, proxy: &ProxySpec) -> Result<Self::Pool, ConfigError>;
}
