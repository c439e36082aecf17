use std::borrow::Cow;

use http::{HeaderMap, StatusCode};

use crate::error::NetError;

/// The result of one executed request.
///
/// Either `error` is set and the remaining fields are absent or
/// partial, or `error` is unset and status, headers and body are fully
/// populated. The one exception is a read fault after a successful
/// response head: the fault is stored alongside whatever body bytes
/// had already arrived.
#[derive(Debug, Default)]
pub struct Response {
    /// Absent when no reply was received at all.
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    /// DER bytes of the peer's leaf certificate, present only when the
    /// connection exposed TLS introspection. The rest of the chain is
    /// not captured.
    pub peer_cert: Option<Vec<u8>>,
    /// Accumulated body, possibly truncated at the configured read limit.
    pub body: Vec<u8>,
    pub error: Option<NetError>,
}

impl Response {
    pub fn status_u16(&self) -> Option<u16> {
        self.status.map(|s| s.as_u16())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
