use std::net::SocketAddr;

/// Default OAuth2 token endpoint for Google service accounts.
pub const DEFAULT_GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default base URL of the FCM HTTP v1 API.
pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Address the HTTP server binds to (default: 0.0.0.0:3000)
    pub bind_addr: SocketAddr,

    /// HS256 secret used to verify user JWTs on the token routes
    pub jwt_secret: String,

    /// Expected `aud` claim of user JWTs (default: "authenticated")
    pub jwt_audience: String,

    /// Shared secret the database webhook must present in `x-webhook-secret`
    pub webhook_secret: Option<String>,

    /// Firebase project that owns the messaging sender
    pub firebase_project_id: String,

    /// Service-account e-mail used as the OAuth issuer identity
    pub firebase_client_email: String,

    /// Service-account RSA private key (PEM)
    pub firebase_private_key: String,

    /// OAuth2 token endpoint
    pub google_token_uri: String,

    /// FCM API base URL (overridable for staging/emulators)
    pub fcm_base_url: String,

    /// Per-request timeout for gateway and token-exchange calls, in seconds
    pub fcm_http_timeout_secs: u64,

    /// Optional cap on concurrent deliveries per dispatch (unset = unbounded)
    pub fanout_concurrency: Option<usize>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BIND_ADDR must be a socket address"))?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".to_string()),
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            firebase_project_id: required("FB_PROJECT_ID")?,
            firebase_client_email: required("FB_CLIENT_EMAIL")?,
            firebase_private_key: unescape_private_key(&required("FB_PRIVATE_KEY")?),
            google_token_uri: std::env::var("GOOGLE_TOKEN_URI")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_TOKEN_URI.to_string()),
            fcm_base_url: std::env::var("FCM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_FCM_BASE_URL.to_string()),
            fcm_http_timeout_secs: std::env::var("FCM_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FCM_HTTP_TIMEOUT_SECS must be a valid u64"))?,
            fanout_concurrency: parse_fanout(std::env::var("FANOUT_CONCURRENCY").ok())?,
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

/// Private keys pasted into a single-line env var carry literal `\n` sequences.
pub fn unescape_private_key(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn parse_fanout(raw: Option<String>) -> anyhow::Result<Option<usize>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let n: usize = value
                .parse()
                .map_err(|_| anyhow::anyhow!("FANOUT_CONCURRENCY must be a valid usize"))?;
            if n == 0 {
                return Err(anyhow::anyhow!("FANOUT_CONCURRENCY must be at least 1"));
            }
            Ok(Some(n))
        }
    }
}
