//! Pool selection and caching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::data::Request;
use crate::effects::backend::{Backend, ResolverCache};
use crate::error::ConfigError;

/// Owns the default pool plus lazily created per-proxy pools.
///
/// The registry lives and dies with the transport that created it; it
/// is never a process-wide singleton. Pools themselves are the shared
/// concurrency-safe resource and may be handed to multiple tasks.
pub struct PoolRegistry<B: Backend> {
    backend: B,
    direct: Arc<B::Pool>,
    /// Keyed by `scheme://host:port`. Creation is guarded by the lock;
    /// pool construction does no I/O, so holding it across construction
    /// is cheap and keeps creation single-shot.
    proxies: Mutex<HashMap<String, Arc<B::Pool>>>,
}

impl<B: Backend> PoolRegistry<B> {
    pub fn new(backend: B, resolver: ResolverCache) -> Result<Self, ConfigError> {
        let direct = Arc::new(backend.direct(resolver)?);
        Ok(Self {
            backend,
            direct,
            proxies: Mutex::new(HashMap::new()),
        })
    }

    /// The pool this request should use: the shared direct pool, or a
    /// per-proxy pool created on first use and cached for the registry
    /// lifetime.
    pub fn select(&self, req: &Request) -> Result<Arc<B::Pool>, ConfigError> {
        let Some(spec) = &req.proxy else {
            return Ok(Arc::clone(&self.direct));
        };

        let key = spec.proxy_url();
        let mut proxies = self.proxies.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = proxies.get(&key) {
            return Ok(Arc::clone(pool));
        }

        tracing::debug!(proxy = %key, "creating proxy pool");
        let pool = Arc::new(self.backend.proxied(spec)?);
        proxies.insert(key, Arc::clone(&pool));
        Ok(pool)
    }
}
