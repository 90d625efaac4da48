//! End-to-end handling of one notification-insertion event.
//!
//! ```text
//! RECEIVED → TOKENS_RESOLVED → CREDENTIAL_READY → DELIVERING → SUMMARIZED → PERSISTED
//!          ↘ NO_TOKENS ─────────────────────────────────────↗ (NOT_EXIST_USER)
//!                             ↘ credential failure ─────────↗ (SEND_ERROR for all)
//! ```
//!
//! The result is written exactly once per invocation, after every delivery has
//! finished. A failed write is reported in the returned [`DispatchReport`]
//! rather than aborting it, since the devices may already have been reached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use pushgate_common::types::NotificationRecord;

use crate::credential::CredentialCache;
use crate::error::{CredentialError, PersistenceError};
use crate::fanout::{FanOut, FanOutResult};
use crate::gateway::{Classification, DeliveryOutcome, PushGateway, PushPayload};
use crate::store::NotificationStore;
use crate::summary::ResultSummary;
use crate::tokens::TokenStore;

/// How far a dispatch got before it was summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Every token was attempted; see the outcomes for per-token results.
    Delivered,
    /// The recipient had no tokens, or they could not be looked up.
    NoTokens,
    /// No access token could be issued, so nothing was sent.
    CredentialFailed,
}

/// Everything a caller needs to report on one dispatch.
#[derive(Debug)]
pub struct DispatchReport {
    pub record_id: Uuid,
    pub status: DispatchStatus,
    /// Per-token outcomes in lookup order
    pub outcomes: Vec<DeliveryOutcome>,
    pub summary: ResultSummary,
    pub completed_at: DateTime<Utc>,
    pub credential_error: Option<CredentialError>,
    /// Set when the result could not be written back onto the record
    pub persistence_error: Option<PersistenceError>,
}

impl DispatchReport {
    pub fn persisted(&self) -> bool {
        self.persistence_error.is_none()
    }
}

/// Drives token lookup, credential retrieval, fan-out and persistence.
pub struct Dispatcher {
    tokens: Arc<dyn TokenStore>,
    credentials: Arc<CredentialCache>,
    gateway: Arc<dyn PushGateway>,
    store: Arc<dyn NotificationStore>,
    fanout: FanOut,
}

impl Dispatcher {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        credentials: Arc<CredentialCache>,
        gateway: Arc<dyn PushGateway>,
        store: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            tokens,
            credentials,
            gateway,
            store,
            fanout: FanOut::unbounded(),
        }
    }

    pub fn with_fanout(mut self, fanout: FanOut) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// Send `record` to every device of its recipient and record the outcome.
    ///
    /// Re-dispatching the same record sends again and overwrites its result.
    pub async fn dispatch(&self, record: &NotificationRecord) -> DispatchReport {
        tracing::info!(record_id = %record.id, user_id = %record.user_id, "Dispatch started");

        let tokens = match self.tokens.tokens_for(record.user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(
                    record_id = %record.id,
                    user_id = %record.user_id,
                    error = %e,
                    "Error fetching FCM tokens"
                );
                Vec::new()
            }
        };

        if tokens.is_empty() {
            tracing::warn!(
                record_id = %record.id,
                user_id = %record.user_id,
                "No FCM tokens found for the user"
            );
            return self
                .finish(
                    record.id,
                    DispatchStatus::NoTokens,
                    Vec::new(),
                    ResultSummary::not_exist_user(),
                    None,
                )
                .await;
        }

        let credential = match self.credentials.get().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::error!(
                    record_id = %record.id,
                    tokens = tokens.len(),
                    error = %e,
                    "Could not obtain FCM access token"
                );
                let outcomes = tokens
                    .iter()
                    .map(|t| DeliveryOutcome::new(t.as_str(), Classification::SendError))
                    .collect();
                return self
                    .finish(
                        record.id,
                        DispatchStatus::CredentialFailed,
                        outcomes,
                        ResultSummary::send_error(&tokens),
                        Some(e),
                    )
                    .await;
            }
        };

        let payload = PushPayload::new(record.title.clone(), record.body.clone());
        let FanOutResult { outcomes, summary } = self
            .fanout
            .dispatch(self.gateway.as_ref(), &tokens, &payload, &credential)
            .await;

        if outcomes.iter().any(DeliveryOutcome::is_unauthorized)
            && self.credentials.invalidate(&credential).await
        {
            tracing::warn!(
                record_id = %record.id,
                "FCM rejected the access token; evicted it from the cache"
            );
        }

        self.finish(record.id, DispatchStatus::Delivered, outcomes, summary, None)
            .await
    }

    async fn finish(
        &self,
        record_id: Uuid,
        status: DispatchStatus,
        outcomes: Vec<DeliveryOutcome>,
        summary: ResultSummary,
        credential_error: Option<CredentialError>,
    ) -> DispatchReport {
        let completed_at = Utc::now();

        let persistence_error = match self.store.complete(record_id, completed_at, &summary).await
        {
            Ok(()) => {
                tracing::info!(
                    record_id = %record_id,
                    status = ?status,
                    tokens = summary.token_count(),
                    "Notification result persisted"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    record_id = %record_id,
                    error = %e,
                    "Error updating notification result"
                );
                Some(e)
            }
        };

        DispatchReport {
            record_id,
            status,
            outcomes,
            summary,
            completed_at,
            credential_error,
            persistence_error,
        }
    }
}
