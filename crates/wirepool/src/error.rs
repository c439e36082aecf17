//! Error types for wirepool.
//!
//! Faults are split into two tiers. [`ConfigError`] covers caller
//! mistakes detected before any I/O; these are returned synchronously
//! and never stored on a response. [`NetError`] is the stable
//! caller-facing taxonomy for environment failures during send or
//! read; [`crate::Session`] folds these into the returned response.
//! Backend faults that match no mapping rule travel unchanged in
//! [`Error::Backend`] so genuinely unexpected conditions stay visible.

use thiserror::Error;

/// Boxed cause carried alongside a taxonomy kind.
pub type BoxSource = Box<dyn std::error::Error + Send + Sync>;

/// Caller mistakes detected before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[source] url::ParseError),

    #[error("invalid header `{name}`")]
    InvalidHeader {
        name: String,
        #[source]
        source: http::Error,
    },

    #[error("invalid value of request option `proxy_type`: {0}")]
    InvalidProxyType(String),

    #[error("invalid proxy address: {addr}")]
    InvalidProxyAddress {
        addr: String,
        #[source]
        source: Option<BoxSource>,
    },

    #[error("request option `resolve` cannot be used along option `proxy`")]
    ResolveWithProxy,
}

/// The stable taxonomy kinds, for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetErrorKind {
    Connect,
    OperationTimeout,
    MalformedResponse,
    Proxy,
}

/// A network fault during send or body read.
///
/// Each variant carries a human-readable message and, where the
/// backend supplied one, the underlying cause.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("connect failed: {message}")]
    Connect {
        message: String,
        #[source]
        source: Option<BoxSource>,
    },

    #[error("operation timed out: {message}")]
    OperationTimeout {
        message: String,
        #[source]
        source: Option<BoxSource>,
    },

    #[error("malformed response: {message}")]
    MalformedResponse {
        message: String,
        #[source]
        source: Option<BoxSource>,
    },

    #[error("proxy failure: {message}")]
    Proxy {
        message: String,
        #[source]
        source: Option<BoxSource>,
    },
}

impl NetError {
    pub(crate) fn from_parts(kind: NetErrorKind, message: String, source: Option<BoxSource>) -> Self {
        match kind {
            NetErrorKind::Connect => NetError::Connect { message, source },
            NetErrorKind::OperationTimeout => NetError::OperationTimeout { message, source },
            NetErrorKind::MalformedResponse => NetError::MalformedResponse { message, source },
            NetErrorKind::Proxy => NetError::Proxy { message, source },
        }
    }

    pub fn kind(&self) -> NetErrorKind {
        match self {
            NetError::Connect { .. } => NetErrorKind::Connect,
            NetError::OperationTimeout { .. } => NetErrorKind::OperationTimeout,
            NetError::MalformedResponse { .. } => NetErrorKind::MalformedResponse,
            NetError::Proxy { .. } => NetErrorKind::Proxy,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            NetError::Connect { message, .. }
            | NetError::OperationTimeout { message, .. }
            | NetError::MalformedResponse { message, .. }
            | NetError::Proxy { message, .. } => message,
        }
    }
}

/// What a backend observed when a unit of I/O failed.
///
/// This is the input to the fault mapper; it deliberately mirrors the
/// backend's own categories rather than the caller-facing taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The connect-phase budget elapsed.
    ConnectTimeout,
    /// A single read exceeded the read-phase budget.
    ReadTimeout,
    /// Transport or protocol level failure (reset, broken pipe, ...).
    Protocol,
    /// TLS handshake or certificate failure.
    Tls,
    /// Malformed URL or Location during redirect handling.
    Redirect,
    /// Response body decoding failure.
    Decode,
    /// Malformed or invalid header value.
    InvalidHeader,
    /// Proxy-specific failure (auth, connect-through).
    Proxy,
    /// Anything the backend could not categorize.
    Other,
}

/// A backend fault description, consumed by [`crate::map_fault`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendFault {
    pub kind: FaultKind,
    pub message: String,
    #[source]
    pub source: Option<BoxSource>,
}

impl BackendFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(kind: FaultKind, message: impl Into<String>, source: BoxSource) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Top-level error for transport operations.
///
/// [`crate::Session::request`] only ever returns the `Config` and
/// `Backend` variants; taxonomy faults are stored on the response.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error("unexpected backend fault: {0}")]
    Backend(BackendFault),
}
