//! The caller-facing orchestrator.

use crate::data::{RequestOptions, Response};
use crate::effects::backend::Backend;
use crate::effects::transport::Transport;
use crate::error::{ConfigError, Error};

#[cfg(feature = "reqwest")]
use crate::effects::client::ReqwestBackend;

/// Builds requests, drives the transport and guarantees that no
/// taxonomy fault escapes as an `Err`: whatever happens on the wire
/// ends up on the returned [`Response`].
pub struct Session<B: Backend> {
    transport: Transport<B>,
}

#[cfg(feature = "reqwest")]
impl Session<ReqwestBackend> {
    /// Session over the production reqwest backend.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_backend(ReqwestBackend)
    }
}

impl<B: Backend> Session<B> {
    pub fn with_backend(backend: B) -> Result<Self, ConfigError> {
        Ok(Self {
            transport: Transport::new(backend)?,
        })
    }

    pub fn transport(&self) -> &Transport<B> {
        &self.transport
    }

    /// Execute one request.
    ///
    /// Network faults from the taxonomy are always folded into
    /// `response.error`; `Err` is reserved for configuration mistakes
    /// and backend faults outside the mapping table.
    pub async fn request(&self, options: RequestOptions) -> Result<Response, Error> {
        let req = options.build()?;
        let mut res = Response::default();

        self.transport.prepare_request(&req, &mut res);

        let outcome = match self.transport.request(&req).await {
            Ok(inflight) => Ok(inflight),
            Err(Error::Net(fault)) => Err(fault),
            Err(other) => return Err(other),
        };

        self.transport
            .prepare_response(&req, &mut res, outcome, false)
            .await?;
        Ok(res)
    }
}
