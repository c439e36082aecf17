//! I/O operations: the backend seam, pool registry, transport and session.

mod backend;
mod pool;
mod reader;
mod session;
mod transport;

#[cfg(feature = "reqwest")]
mod client;

pub use backend::{Backend, BoxStream, Pool, Reply, ResolverCache, SendRequest};
pub use pool::PoolRegistry;
pub use session::Session;
pub use transport::{InFlight, Transport};

#[cfg(feature = "reqwest")]
pub use client::{ReqwestBackend, ReqwestPool};
