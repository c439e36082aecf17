//! Timeout-aware body reader.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;

use crate::core::map_fault;
use crate::effects::backend::BoxStream;
use crate::error::{BackendFault, Error, NetError};

/// Drain a response body into `sink`, honoring the byte cap and the
/// wall-clock budget measured from the request's start instant.
///
/// Stopping at the byte cap is silent truncation; only an exhausted
/// time budget is a fault. Each pull awaits at most the remaining
/// budget, so a sender that dribbles data fast enough to satisfy every
/// per-read timeout still fails once the aggregate exceeds the
/// caller's budget.
pub(crate) async fn drain_body(
    body: &mut BoxStream<'static, Result<Bytes, BackendFault>>,
    sink: &mut Vec<u8>,
    limit: Option<usize>,
    started: Instant,
    budget: Option<Duration>,
) -> Result<(), Error> {
    let mut taken = 0usize;
    loop {
        let pulled = match budget {
            Some(total) => {
                let remaining = total
                    .checked_sub(started.elapsed())
                    .ok_or_else(budget_exhausted)?;
                tokio::time::timeout(remaining, body.next())
                    .await
                    .map_err(|_| budget_exhausted())?
            }
            None => body.next().await,
        };

        // Stream end is normal completion, not an error.
        let Some(item) = pulled else {
            return Ok(());
        };
        let chunk = item.map_err(|fault| match map_fault(fault) {
            Ok(net) => Error::Net(net),
            Err(raw) => Error::Backend(raw),
        })?;

        let allowance = match limit {
            Some(cap) => cap.saturating_sub(taken),
            None => chunk.len(),
        };
        let take = chunk.len().min(allowance);
        sink.extend_from_slice(&chunk[..take]);
        taken += take;

        if limit.is_some_and(|cap| taken >= cap) {
            return Ok(());
        }
    }
}

fn budget_exhausted() -> Error {
    Error::Net(NetError::OperationTimeout {
        message: "timed out while reading response".to_string(),
        source: None,
    })
}
