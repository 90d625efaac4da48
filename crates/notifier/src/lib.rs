//! Push-notification dispatch engine.
//!
//! Given a freshly inserted `NotificationRecord`, the [`Dispatcher`] resolves
//! the recipient's device tokens, obtains a cached FCM access token, delivers
//! to every device concurrently, and writes the grouped outcome back onto the
//! record.

pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod gateway;
pub mod store;
pub mod summary;
pub mod tokens;

pub use credential::{CachedCredential, CredentialCache, CredentialIssuer, ServiceAccountIssuer};
pub use dispatcher::{DispatchReport, DispatchStatus, Dispatcher};
pub use error::{CredentialError, DeliveryError, LookupError, PersistenceError};
pub use fanout::{FanOut, FanOutResult};
pub use gateway::{Classification, DeliveryOutcome, FcmGateway, PushGateway, PushPayload};
pub use store::{NotificationService, NotificationStore, PgNotificationStore};
pub use summary::ResultSummary;
pub use tokens::{DeviceTokenService, PgTokenStore, TokenStore};
