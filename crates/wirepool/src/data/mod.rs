//! Immutable request and response types.
//!
//! A [`RequestOptions`] builder is validated into a [`Request`] before
//! the transport sees it; the [`Response`] is write-once per request
//! and owned by the caller after return.

pub mod options;
pub mod request;
pub mod response;

pub use options::RequestOptions;
pub use request::{Payload, ProxyKind, ProxySpec, Request};
pub use response::Response;
