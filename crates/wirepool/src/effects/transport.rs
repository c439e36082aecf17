//! Request execution and response finalization.

use std::time::Instant;

use http::header::{self, HeaderValue};

use crate::core::{body, map_fault};
use crate::data::{Request, Response};
use crate::effects::backend::{Backend, Pool, Reply, ResolverCache, SendRequest};
use crate::effects::pool::PoolRegistry;
use crate::effects::reader::drain_body;
use crate::error::{ConfigError, Error, NetError};

/// Call-scoped execution state for one request.
///
/// Holding the reply here (instead of on the transport) keeps the
/// transport free of per-call state, so one value can serve multiple
/// in-flight requests concurrently.
pub struct InFlight {
    reply: Reply,
    started: Instant,
}

/// Executes one request against a pooled connection.
///
/// Owns the pool registry and the shared resolution overrides; both
/// are torn down with the transport.
pub struct Transport<B: Backend> {
    pools: PoolRegistry<B>,
    resolver: ResolverCache,
}

impl<B: Backend> Transport<B> {
    pub fn new(backend: B) -> Result<Self, ConfigError> {
        let resolver = ResolverCache::default();
        let pools = PoolRegistry::new(backend, resolver.clone())?;
        Ok(Self { pools, resolver })
    }

    pub fn pools(&self) -> &PoolRegistry<B> {
        &self.pools
    }

    /// Pre-send hook. Currently a no-op; kept as the mutation point
    /// for callers layering behavior on top of the transport.
    pub fn prepare_request(&self, _req: &Request, _res: &mut Response) {}

    /// Select a pool, build the outgoing body and issue the call.
    ///
    /// Returns the open reply plus the recorded start instant; network
    /// faults come back as [`Error::Net`], unmapped backend faults as
    /// [`Error::Backend`], and caller mistakes as [`Error::Config`].
    pub async fn request(&self, req: &Request) -> Result<InFlight, Error> {
        let started = Instant::now();

        if !req.resolve.is_empty() {
            if req.proxy.is_some() {
                return Err(ConfigError::ResolveWithProxy.into());
            }
            for (host, ip) in &req.resolve {
                self.resolver.insert(host.clone(), *ip);
            }
        }

        let pool = self.pools.select(req)?;

        let mut headers = req.headers.clone();
        if let Some(encoding) = &req.content_encoding {
            // A literal Accept-Encoding header makes backends skip
            // transparent decompression, so it is only written when the
            // caller asked for raw bytes. With decoding on, the declared
            // coding reaches the backend as client configuration instead.
            if !req.decode_content && !headers.contains_key(header::ACCEPT_ENCODING) {
                let value =
                    HeaderValue::from_str(encoding).map_err(|e| ConfigError::InvalidHeader {
                        name: header::ACCEPT_ENCODING.to_string(),
                        source: e.into(),
                    })?;
                headers.insert(header::ACCEPT_ENCODING, value);
            }
        }

        let mut outgoing_body = None;
        if let Some(payload) = &req.data {
            let encoded = body::encode_payload(payload);
            if let Some(ctype) = encoded.content_type {
                let value =
                    HeaderValue::from_str(&ctype).map_err(|e| ConfigError::InvalidHeader {
                        name: header::CONTENT_TYPE.to_string(),
                        source: e.into(),
                    })?;
                headers.insert(header::CONTENT_TYPE, value);
            }
            headers.insert(
                header::CONTENT_LENGTH,
                HeaderValue::from(encoded.bytes.len() as u64),
            );
            outgoing_body = Some(encoded.bytes);
        }

        let call = SendRequest {
            method: req.method.clone(),
            url: req.url.clone(),
            headers,
            body: outgoing_body,
            connect_timeout: req.connect_timeout,
            read_timeout: req.timeout,
            decode_content: req.decode_content,
            content_encoding: req.content_encoding.clone(),
        };

        tracing::debug!(method = %req.method, url = %req.url, "sending request");
        let reply = pool.send(call).await.map_err(|fault| match map_fault(fault) {
            Ok(net) => Error::Net(net),
            Err(raw) => Error::Backend(raw),
        })?;

        Ok(InFlight { reply, started })
    }

    /// Finalize the response: copy the head, capture the peer
    /// certificate and drain the body under the timeout reader.
    ///
    /// A send-phase fault is stored on the response without further
    /// I/O. A read-phase fault propagates when `raise_on_read_fault`
    /// is set and is stored on the response otherwise, leaving
    /// whatever body bytes had already arrived in place. The borrowed
    /// connection is released exactly once on every path: the reply is
    /// consumed here and dropping it returns the connection.
    pub async fn prepare_response(
        &self,
        req: &Request,
        res: &mut Response,
        outcome: Result<InFlight, NetError>,
        raise_on_read_fault: bool,
    ) -> Result<(), Error> {
        let InFlight { reply, started } = match outcome {
            Err(fault) => {
                res.error = Some(fault);
                return Ok(());
            }
            Ok(inflight) => inflight,
        };

        let Reply {
            status,
            headers,
            peer_cert,
            mut body,
        } = reply;
        res.status = Some(status);
        res.headers = headers;
        res.peer_cert = peer_cert;

        let drained = drain_body(
            &mut body,
            &mut res.body,
            req.content_read_limit,
            started,
            req.timeout,
        )
        .await;

        match drained {
            Ok(()) => Ok(()),
            Err(Error::Net(fault)) if !raise_on_read_fault => {
                res.error = Some(fault);
                Ok(())
            }
            Err(other) => Err(other),
        }
    }
}
