//! Concurrent delivery of one notification to many device tokens.
//!
//! All deliveries run to completion; a failing token never cancels the rest.
//! Outcomes come back in input-token order whichever mode is used.

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;

use crate::gateway::{DeliveryOutcome, PushGateway, PushPayload};
use crate::summary::ResultSummary;

/// Outcomes of one fan-out plus their grouping.
#[derive(Debug, Clone)]
pub struct FanOutResult {
    pub outcomes: Vec<DeliveryOutcome>,
    pub summary: ResultSummary,
}

/// Fan-out coordinator.
///
/// Unbounded by default: a user rarely has more than a handful of devices, so
/// every delivery starts at once. `bounded(n)` keeps at most `n` in flight.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    limit: Option<usize>,
}

impl FanOut {
    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
        }
    }

    /// `None` means unbounded.
    pub fn from_limit(limit: Option<usize>) -> Self {
        limit.map_or_else(Self::unbounded, Self::bounded)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Deliver `payload` to every token and wait for all of them.
    pub async fn dispatch(
        &self,
        gateway: &dyn PushGateway,
        tokens: &[String],
        payload: &PushPayload,
        credential: &str,
    ) -> FanOutResult {
        let deliveries: Vec<_> = tokens
            .iter()
            .map(|token| gateway.deliver(token, payload, credential))
            .collect();

        let outcomes: Vec<DeliveryOutcome> = match self.limit {
            None => join_all(deliveries).await,
            Some(limit) => stream::iter(deliveries).buffered(limit).collect().await,
        };

        let summary = ResultSummary::from_outcomes(&outcomes);

        tracing::debug!(
            tokens = tokens.len(),
            succeeded = summary.bucket("SUCCESS").map_or(0, <[String]>::len),
            "Fan-out complete"
        );

        FanOutResult { outcomes, summary }
    }
}
