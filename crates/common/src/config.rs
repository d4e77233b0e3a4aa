
/// Sender used when `EMAIL_FROM` is not set.
pub const DEFAULT_EMAIL_FROM: &str = "Storefront <notifications@localhost>";

/// Base URL of the Resend-compatible email API.
pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared secret expected in the `x-internal-auth` header.
    /// When absent, every notification request is rejected.
    pub internal_auth_secret: Option<String>,

    /// Resend API key for email delivery. When absent, deliveries are dry-runs.
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: String,

    /// Recipient for ops-facing notifications (failures, fulfillment issues)
    pub ops_email: Option<String>,

    /// Base URL of the email provider API
    pub email_api_url: String,

    /// Upper bound on a single provider call, in seconds (default: 10)
    pub email_timeout_secs: u64,

    /// Interface the HTTP server binds to
    pub host: String,

    /// Port the HTTP server listens on
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let email_timeout_secs: u64 = var("EMAIL_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("EMAIL_TIMEOUT_SECS must be a valid u64"))?;
        if email_timeout_secs == 0 {
            anyhow::bail!("EMAIL_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            internal_auth_secret: var("INTERNAL_AUTH_SECRET"),
            resend_api_key: var("RESEND_API_KEY"),
            email_from: var("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            ops_email: var("OPS_EMAIL"),
            email_api_url: var("EMAIL_API_URL")
                .unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            email_timeout_secs,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid u16"))?,
        })
    }

    /// Whether outbound email can actually be sent.
    pub fn email_enabled(&self) -> bool {
        self.resend_api_key.is_some()
    }
}
