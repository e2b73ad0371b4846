use anyhow::Result;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub mpesa: Option<MpesaConfig>,
}

/// Daraja gateway credentials, loaded once at process start and read-only
/// thereafter. `shortcode`/`passkey` are only needed by the STK push flow;
/// the B2C flow runs on the client credentials alone.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: Option<String>,
    pub passkey: Option<String>,
    pub api_base_url: String,
    pub callback_url: String,
    pub timeout_secs: u64,
}

const DEFAULT_API_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            mpesa: MpesaConfig::from_env(),
        })
    }
}

impl MpesaConfig {
    /// Returns `None` when the client credentials or the public base URL
    /// are absent; payment routes then answer with the not-configured
    /// error instead of reaching for the gateway.
    pub fn from_env() -> Option<Self> {
        let consumer_key = env::var("MPESA_CONSUMER_KEY").ok()?;
        let consumer_secret = env::var("MPESA_CONSUMER_SECRET").ok()?;
        let public_base_url = env::var("PUBLIC_BASE_URL").ok()?;

        Some(MpesaConfig {
            consumer_key,
            consumer_secret,
            shortcode: env::var("MPESA_SHORTCODE").ok(),
            passkey: env::var("MPESA_PASSKEY").ok(),
            api_base_url: env::var("MPESA_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            callback_url: format!(
                "{}/payments/callback",
                public_base_url.trim_end_matches('/')
            ),
            timeout_secs: env::var("MPESA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}
