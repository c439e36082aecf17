//! Production backend over reqwest.

use std::collections::HashMap;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;
use reqwest::tls::TlsInfo;

use crate::data::ProxySpec;
use crate::effects::backend::{Backend, Pool, Reply, ResolverCache, SendRequest};
use crate::error::{BackendFault, ConfigError, FaultKind};

/// Backend producing [`ReqwestPool`]s.
pub struct ReqwestBackend;

impl Backend for ReqwestBackend {
    type Pool = ReqwestPool;

    fn direct(&self, resolver: ResolverCache) -> Result<ReqwestPool, ConfigError> {
        ReqwestPool::new(None, Some(resolver))
    }

    fn proxied(&self, proxy: &ProxySpec) -> Result<ReqwestPool, ConfigError> {
        ReqwestPool::new(Some(proxy.clone()), None)
    }
}

/// Clients are cached per timeout/decoding configuration because
/// reqwest scopes those settings to a `Client`; requests with the same
/// configuration share a client and therefore its keep-alive
/// connections. Certificate validation is always on, against the
/// system trust roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    decode_content: bool,
    content_encoding: Option<String>,
}

/// One connection pool: direct, or routed through a single proxy.
#[derive(Debug)]
pub struct ReqwestPool {
    /// Parsed once at construction and cloned into each client.
    proxy: Option<reqwest::Proxy>,
    resolver: Option<Arc<OverlayResolver>>,
    clients: Mutex<HashMap<ClientKey, reqwest::Client>>,
}

impl ReqwestPool {
    fn new(proxy: Option<ProxySpec>, resolver: Option<ResolverCache>) -> Result<Self, ConfigError> {
        // A bad proxy address surfaces here, before any request.
        let proxy = proxy.as_ref().map(build_proxy).transpose()?;
        Ok(Self {
            proxy,
            resolver: resolver.map(|overrides| Arc::new(OverlayResolver { overrides })),
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, key: ClientKey) -> Result<reqwest::Client, BackendFault> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .tls_info(true);
        if let Some(timeout) = key.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = key.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if key.decode_content {
            // A declared coding narrows negotiation without touching the
            // request headers; decompression stays transparent.
            match key.content_encoding.as_deref() {
                Some("gzip") => builder = builder.no_deflate(),
                Some("deflate") => builder = builder.no_gzip(),
                Some("identity") => builder = builder.no_gzip().no_deflate(),
                _ => {}
            }
        } else {
            builder = builder.no_gzip().no_deflate();
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.clone());
        }
        if let Some(resolver) = &self.resolver {
            builder = builder.dns_resolver(Arc::clone(resolver));
        }

        tracing::debug!(?key, proxied = self.proxy.is_some(), "building pooled client");
        let client = builder
            .build()
            .map_err(|e| BackendFault::with_source(FaultKind::Other, e.to_string(), Box::new(e)))?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

impl Pool for ReqwestPool {
    fn send(&self, call: SendRequest) -> impl Future<Output = Result<Reply, BackendFault>> + Send {
        async move {
            let client = self.client_for(ClientKey {
                connect_timeout: call.connect_timeout,
                read_timeout: call.read_timeout,
                decode_content: call.decode_content,
                content_encoding: call.content_encoding,
            })?;

            let mut request = client.request(call.method, call.url).headers(call.headers);
            if let Some(body) = call.body {
                request = request.body(body);
            }

            let via_proxy = self.proxy.is_some();
            let response = request.send().await.map_err(|e| classify(via_proxy, e))?;

            let peer_cert = response
                .extensions()
                .get::<TlsInfo>()
                .and_then(|tls| tls.peer_certificate().map(<[u8]>::to_vec));
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes_stream()
                .map(move |item| item.map_err(|e| classify(via_proxy, e)))
                .boxed();

            Ok(Reply {
                status,
                headers,
                peer_cert,
                body,
            })
        }
    }
}

fn build_proxy(spec: &ProxySpec) -> Result<reqwest::Proxy, ConfigError> {
    let mut proxy =
        reqwest::Proxy::all(spec.proxy_url()).map_err(|e| ConfigError::InvalidProxyAddress {
            addr: spec.addr.clone(),
            source: Some(Box::new(e)),
        })?;
    if let Some((user, password)) = &spec.auth {
        proxy = proxy.basic_auth(user, password);
    }
    Ok(proxy)
}

/// Describe a reqwest error for the fault mapper.
///
/// Connect-phase failures on a proxied pool are attributed to the
/// proxy: with CONNECT-style or SOCKS routing the connection being
/// established is the one to the intermediary. Anything reqwest does
/// not categorize keeps its source chain so the mapper can inspect it.
fn classify(via_proxy: bool, err: reqwest::Error) -> BackendFault {
    let kind = if err.is_timeout() {
        if err.is_connect() {
            FaultKind::ConnectTimeout
        } else {
            FaultKind::ReadTimeout
        }
    } else if err.is_connect() {
        if via_proxy {
            FaultKind::Proxy
        } else {
            FaultKind::Protocol
        }
    } else if err.is_decode() {
        FaultKind::Decode
    } else if err.is_body() {
        FaultKind::Protocol
    } else if err.is_redirect() {
        FaultKind::Redirect
    } else {
        FaultKind::Other
    };
    let message = err.to_string();
    BackendFault::with_source(kind, message, Box::new(err))
}

/// DNS resolver consulting the shared override map before falling back
/// to system resolution.
#[derive(Debug)]
struct OverlayResolver {
    overrides: ResolverCache,
}

impl Resolve for OverlayResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let overrides = self.overrides.clone();
        Box::pin(async move {
            if let Some(ip) = overrides.lookup(name.as_str()) {
                // Port 0 is replaced by the connector with the real port.
                let addrs: Addrs = Box::new(std::iter::once(SocketAddr::new(ip, 0)));
                return Ok(addrs);
            }
            let host = format!("{}:0", name.as_str());
            let resolved: Vec<SocketAddr> = tokio::task::spawn_blocking(move || {
                host.to_socket_addrs().map(|addrs| addrs.collect())
            })
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            Ok(Box::new(resolved.into_iter()) as Addrs)
        })
    }
}
