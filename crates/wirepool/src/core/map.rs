//! The fault-mapping boundary.
//!
//! Backend fault descriptions are translated here into the stable
//! caller-facing taxonomy. The mapping is a pure function; anything it
//! does not recognize is handed back unchanged so unexpected backend
//! conditions stay visible to the caller.

use crate::error::{BackendFault, FaultKind, NetError, NetErrorKind};

/// Translate a backend fault into a taxonomy kind.
///
/// Returns `Err` with the original fault when no mapping rule applies;
/// the caller propagates it unchanged rather than absorbing it.
pub fn map_fault(fault: BackendFault) -> Result<NetError, BackendFault> {
    let kind = match fault.kind {
        FaultKind::ReadTimeout => NetErrorKind::OperationTimeout,
        FaultKind::ConnectTimeout | FaultKind::Protocol | FaultKind::Tls => NetErrorKind::Connect,
        FaultKind::Redirect | FaultKind::Decode | FaultKind::InvalidHeader => {
            NetErrorKind::MalformedResponse
        }
        FaultKind::Proxy => NetErrorKind::Proxy,
        FaultKind::Other => {
            // Compatibility shim: some backends surface an unparsable
            // host literal in a redirect Location header (typically a
            // malformed IPv6 address) as a generic fault instead of a
            // protocol fault. The condition is detected by type, never
            // by message text.
            if unparsable_redirect_location(&fault) {
                return Ok(NetError::MalformedResponse {
                    message: "invalid redirect Location header".to_string(),
                    source: fault.source,
                });
            }
            return Err(fault);
        }
    };
    Ok(NetError::from_parts(kind, fault.message, fault.source))
}

fn unparsable_redirect_location(fault: &BackendFault) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> =
        fault.source.as_ref().map(|e| &**e as _);
    while let Some(err) = source {
        if err.downcast_ref::<url::ParseError>().is_some() {
            return true;
        }
        source = err.source();
    }
    false
}
