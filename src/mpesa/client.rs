use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bigdecimal::ToPrimitive;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use std::time::Duration;
use thiserror::Error;

use crate::config::MpesaConfig;

pub const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

#[derive(Error, Debug)]
pub enum MpesaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gateway unreachable: {0}")]
    Unavailable(String),
    #[error("Token request failed with status {0}")]
    AuthFailed(reqwest::StatusCode),
    #[error("{0}")]
    Rejected(String),
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("Amount not representable in whole shillings: {0}")]
    InvalidAmount(String),
    #[error("STK credentials (shortcode/passkey) not configured")]
    NotConfigured,
}

impl MpesaError {
    /// Deadline expiry and connect failures are the bounded-latency
    /// failure mode; everything else stays a plain transport error.
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            MpesaError::Unavailable(err.to_string())
        } else {
            MpesaError::Http(err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: String,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "PartyA")]
    party_a: String,
    #[serde(rename = "PartyB")]
    party_b: String,
    #[serde(rename = "PhoneNumber")]
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    callback_url: String,
    #[serde(rename = "AccountReference")]
    account_reference: String,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: String,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// An accepted push request. Acceptance only means the prompt reached the
/// payer's device; the real outcome arrives later on the callback route.
#[derive(Debug, Clone)]
pub struct StkAccepted {
    pub checkout_request_id: String,
}

/// HTTP client for the Daraja mobile-money gateway. Every request carries
/// the configured per-call deadline.
#[derive(Clone)]
pub struct MpesaClient {
    http: Client,
    config: MpesaConfig,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        MpesaClient { http, config }
    }

    /// Whether the push-collection flow has everything it needs.
    pub fn stk_configured(&self) -> bool {
        self.config.shortcode.is_some() && self.config.passkey.is_some()
    }

    fn stk_credentials(&self) -> Result<(&str, &str), MpesaError> {
        match (&self.config.shortcode, &self.config.passkey) {
            (Some(shortcode), Some(passkey)) => Ok((shortcode, passkey)),
            _ => Err(MpesaError::NotConfigured),
        }
    }

    /// Acquires a bearer token from the credential endpoint using
    /// basic-auth-encoded client credentials.
    pub async fn access_token(&self) -> Result<String, MpesaError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.api_base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(MpesaError::from_transport)?;

        if !response.status().is_success() {
            return Err(MpesaError::AuthFailed(response.status()));
        }

        let token: TokenResponse = response.json().await.map_err(MpesaError::from_transport)?;
        Ok(token.access_token)
    }

    /// Submits a push-payment request. The password is a digest of
    /// shortcode, passkey and a `YYYYMMDDHHMMSS` timestamp; the same
    /// instant goes into both fields.
    pub async fn stk_push(
        &self,
        access_token: &str,
        phone_number: &str,
        amount: &BigDecimal,
        account_reference: String,
        description: &str,
    ) -> Result<StkAccepted, MpesaError> {
        let (shortcode, passkey) = self.stk_credentials()?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp));

        let request = StkPushRequest {
            business_short_code: shortcode.to_string(),
            password,
            timestamp,
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount: whole_shillings(amount)?,
            party_a: phone_number.to_string(),
            party_b: shortcode.to_string(),
            phone_number: phone_number.to_string(),
            callback_url: self.config.callback_url.clone(),
            account_reference,
            transaction_desc: description.to_string(),
        };

        let url = format!(
            "{}/mpesa/stkpush/v1/processrequest",
            self.config.api_base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(MpesaError::from_transport)?;

        // The gateway reports rejection in the body, not the status line.
        let body: StkPushResponse = response.json().await.map_err(MpesaError::from_transport)?;

        if body.response_code.as_deref() == Some("0") {
            let checkout_request_id = body.checkout_request_id.ok_or_else(|| {
                MpesaError::InvalidResponse("accepted response without CheckoutRequestID".to_string())
            })?;
            Ok(StkAccepted {
                checkout_request_id,
            })
        } else {
            Err(MpesaError::Rejected(
                body.error_message
                    .unwrap_or_else(|| "STK push failed".to_string()),
            ))
        }
    }

    /// B2C payout stand-in. The sandbox flow treats submission as
    /// disbursement; a locally generated reference stands in for the
    /// gateway receipt.
    pub async fn payout(
        &self,
        phone_number: &str,
        amount: &BigDecimal,
    ) -> Result<String, MpesaError> {
        tracing::info!(%phone_number, %amount, "simulating B2C payout");
        Ok(format!("SIM{}", Utc::now().timestamp_millis()))
    }
}

/// The gateway takes whole shillings only.
fn whole_shillings(amount: &BigDecimal) -> Result<i64, MpesaError> {
    amount
        .round(0)
        .to_i64()
        .ok_or_else(|| MpesaError::InvalidAmount(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn test_config(api_base_url: String) -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: Some("174379".to_string()),
            passkey: Some("passkey".to_string()),
            api_base_url,
            callback_url: "https://example.com/payments/callback".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn reports_stk_configuration() {
        let configured = MpesaClient::new(test_config("http://localhost".to_string()));
        assert!(configured.stk_configured());

        let mut config = test_config("http://localhost".to_string());
        config.passkey = None;
        let unconfigured = MpesaClient::new(config);
        assert!(!unconfigured.stk_configured());
    }

    #[test]
    fn rounds_amounts_to_whole_shillings() {
        assert_eq!(
            whole_shillings(&BigDecimal::from_str("2500.75").unwrap()).unwrap(),
            2501
        );
        assert_eq!(
            whole_shillings(&BigDecimal::from_str("2500.25").unwrap()).unwrap(),
            2500
        );
        assert_eq!(whole_shillings(&BigDecimal::from(100)).unwrap(), 100);
    }

    #[tokio::test]
    async fn acquires_access_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/oauth/v1/generate.*".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "abc123", "expires_in": "3599"}"#)
            .create_async()
            .await;

        let client = MpesaClient::new(test_config(server.url()));
        let token = client.access_token().await.unwrap();
        assert_eq!(token, "abc123");
    }

    #[tokio::test]
    async fn token_failure_maps_to_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/oauth/v1/generate.*".into()))
            .with_status(401)
            .create_async()
            .await;

        let client = MpesaClient::new(test_config(server.url()));
        let result = client.access_token().await;
        assert!(matches!(result, Err(MpesaError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn accepted_push_carries_checkout_request_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResponseCode": "0",
                    "ResponseDescription": "Success. Request accepted for processing",
                    "CustomerMessage": "Success. Request accepted for processing"
                }"#,
            )
            .create_async()
            .await;

        let client = MpesaClient::new(test_config(server.url()));
        let accepted = client
            .stk_push(
                "token",
                "254712345678",
                &BigDecimal::from(1000),
                "abcdef123456".to_string(),
                "Chama contribution",
            )
            .await
            .unwrap();

        assert_eq!(accepted.checkout_request_id, "ws_CO_191220191020363925");
    }

    #[tokio::test]
    async fn rejected_push_passes_gateway_message_through() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "requestId": "29115-34620561-1",
                    "errorCode": "400.002.02",
                    "errorMessage": "Bad Request - Invalid Amount"
                }"#,
            )
            .create_async()
            .await;

        let client = MpesaClient::new(test_config(server.url()));
        let result = client
            .stk_push(
                "token",
                "254712345678",
                &BigDecimal::from(1000),
                "abcdef123456".to_string(),
                "Chama contribution",
            )
            .await;

        match result {
            Err(MpesaError::Rejected(message)) => {
                assert_eq!(message, "Bad Request - Invalid Amount");
            }
            other => panic!("expected rejection, got {:?}", other.map(|a| a.checkout_request_id)),
        }
    }

    #[tokio::test]
    async fn push_without_stk_credentials_fails_closed() {
        let mut config = test_config("http://localhost:1".to_string());
        config.shortcode = None;
        let client = MpesaClient::new(config);

        let result = client
            .stk_push(
                "token",
                "254712345678",
                &BigDecimal::from(1000),
                "abcdef123456".to_string(),
                "Chama contribution",
            )
            .await;

        assert!(matches!(result, Err(MpesaError::NotConfigured)));
    }

    #[tokio::test]
    async fn payout_reference_is_locally_tagged() {
        let client = MpesaClient::new(test_config("http://localhost:1".to_string()));
        let reference = client
            .payout("254712345678", &BigDecimal::from(5000))
            .await
            .unwrap();
        assert!(reference.starts_with("SIM"));
    }
}
