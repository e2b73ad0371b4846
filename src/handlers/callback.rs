use axum::{Json, body::Bytes, extract::State};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::AppState;
use crate::services::reconcile;

#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

/// Inbound webhook fired by the gateway with the real payment outcome.
///
/// The gateway delivers at most once and never retries an acknowledged
/// delivery, so every invocation terminates with the acceptance payload;
/// only the side effects differ. The raw body is parsed leniently for the
/// same reason: a malformed delivery is logged and dropped, not bounced.
pub async fn mpesa_callback(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    match serde_json::from_slice::<CallbackEnvelope>(&body) {
        Ok(envelope) => {
            if let Err(e) = reconcile::apply_callback(&state.db, envelope.body.stk_callback).await {
                error!("callback reconciliation failed: {}", e);
            }
        }
        Err(e) => warn!("discarding malformed callback payload: {}", e),
    }

    Json(json!({ "ResultCode": 0, "ResultDesc": "Accepted" }))
}
