use thiserror::Error;

/// Device-token lookup failed. The dispatcher treats this like "no tokens".
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Token lookup failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Token lookup failed: {0}")]
    Unavailable(String),
}

/// The identity provider could not issue an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to parse private key: {0}")]
    KeyParse(String),

    #[error("Failed to encode JWT: {0}")]
    JwtEncode(String),

    #[error("Failed to get access token: {0}")]
    Transport(String),

    #[error("Token request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to parse token response: {0}")]
    Parse(String),
}

/// Transport-level failure of a single delivery. Never leaves the gateway:
/// it is always folded into a `SEND_ERROR` classification.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("FCM send request failed: {0}")]
    Request(String),

    #[error("Failed to parse FCM response (status {status}): {reason}")]
    Response { status: u16, reason: String },
}

impl DeliveryError {
    /// HTTP status of the response, if one arrived before the failure.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DeliveryError::Request(_) => None,
            DeliveryError::Response { status, .. } => Some(*status),
        }
    }
}

/// Writing the dispatch result back onto the notification failed.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Failed to update notification result: {0}")]
    Database(String),

    #[error("Notification {0} not found")]
    RecordNotFound(uuid::Uuid),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::Database(err.to_string())
    }
}
