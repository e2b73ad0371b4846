use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use tracing::error;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::Transaction;
use crate::db::queries;
use crate::error::AppError;
use crate::mpesa::MpesaError;
use crate::validation::{normalize_msisdn, require, require_amount};

/// Fields arrive optional so that absence maps to the typed missing-field
/// error rather than a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct CollectionRequest {
    pub phone_number: Option<String>,
    pub amount: Option<BigDecimal>,
    pub chama_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: Uuid,
    pub checkout_request_id: String,
}

/// Initiates a push collection. The response only says the prompt went
/// out; completion is decided later by the callback reconciler, and the
/// caller re-queries transaction state out of band.
pub async fn initiate_collection(
    State(state): State<AppState>,
    Json(payload): Json<CollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let phone_number = require("phone_number", payload.phone_number)?;
    let amount = require_amount("amount", payload.amount)?;
    let chama_id = require("chama_id", payload.chama_id)?;
    let user_id = require("user_id", payload.user_id)?;
    let description = payload
        .description
        .unwrap_or_else(|| "Chama contribution".to_string());

    let phone_number = normalize_msisdn(&phone_number);

    let client = state.mpesa.as_ref().ok_or(AppError::GatewayNotConfigured)?;
    if !client.stk_configured() {
        return Err(AppError::GatewayNotConfigured);
    }

    let token = client.access_token().await.map_err(|e| match e {
        MpesaError::Unavailable(message) => AppError::GatewayUnavailable(message),
        _ => AppError::GatewayAuthFailed,
    })?;

    // A durable record must exist before the push request leaves the
    // process, even if that request never completes.
    let tx = Transaction::new_contribution(user_id, chama_id, amount, phone_number, description);
    let tx = queries::insert_transaction(&state.db, &tx).await?;

    match client
        .stk_push(
            &token,
            &tx.phone_number,
            &tx.amount,
            tx.account_reference(),
            &tx.description,
        )
        .await
    {
        Ok(accepted) => {
            if let Err(e) =
                queries::set_gateway_ref(&state.db, tx.id, &accepted.checkout_request_id).await
            {
                // The prompt is already on the payer's device; the caller
                // still gets a success, but this callback can never be
                // matched. Known inconsistency window.
                error!(
                    transaction_id = %tx.id,
                    "failed to persist checkout request id: {}", e
                );
            }

            Ok(Json(CollectionResponse {
                success: true,
                message: "STK push sent. Please enter your M-Pesa PIN.".to_string(),
                transaction_id: tx.id,
                checkout_request_id: accepted.checkout_request_id,
            }))
        }
        Err(MpesaError::Rejected(message)) => {
            queries::mark_failed(&state.db, tx.id).await?;
            Err(AppError::GatewayRejected(message))
        }
        // No usable outcome from the gateway; the transaction stays pending.
        Err(MpesaError::Unavailable(message)) => Err(AppError::GatewayUnavailable(message)),
        Err(e) => Err(AppError::GatewayUnavailable(e.to_string())),
    }
}
