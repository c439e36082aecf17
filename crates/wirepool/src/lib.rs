//! Pooled HTTP client transport with layered timeouts and a stable
//! fault taxonomy.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable request and response types
//! - `core` - Pure transformations (body encoding, fault mapping)
//! - `effects` - I/O: the backend seam, pool registry, transport and session
//!
//! # Key Guarantees
//!
//! - **Uniform returns**: [`Session::request`] folds every taxonomy
//!   fault into the returned response instead of raising it
//! - **Layered timeouts**: the connect budget and the total wall-clock
//!   budget (body read included) are enforced independently
//! - **Single release**: the borrowed connection goes back to its pool
//!   exactly once on every exit path, by ownership
//! - **Mechanism-only**: no retries; retry policy belongs to the caller
//!
//! # Examples
//!
//! ```no_run
//! use wirepool::{RequestOptions, Session};
//!
//! # async fn run() -> Result<(), wirepool::Error> {
//! let session = Session::new()?;
//! let response = session
//!     .request(RequestOptions::new("https://example.com/"))
//!     .await?;
//!
//! if let Some(err) = &response.error {
//!     eprintln!("request failed: {err}");
//! } else {
//!     println!("{} bytes, status {:?}", response.body.len(), response.status);
//! }
//! # Ok(())
//! # }
//! ```

mod core;
mod error;

pub mod data;
pub mod effects;

pub use crate::core::map_fault;
pub use data::{Payload, ProxyKind, ProxySpec, Request, RequestOptions, Response};
pub use effects::{
    Backend, BoxStream, InFlight, Pool, PoolRegistry, Reply, ResolverCache, SendRequest, Session,
    Transport,
};
pub use error::{BackendFault, BoxSource, ConfigError, Error, FaultKind, NetError, NetErrorKind};

#[cfg(feature = "reqwest")]
pub use effects::{ReqwestBackend, ReqwestPool};
