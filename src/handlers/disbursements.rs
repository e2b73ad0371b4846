use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::Transaction;
use crate::db::queries;
use crate::error::AppError;
use crate::mpesa::MpesaError;
use crate::validation::{normalize_msisdn, require, require_amount};

#[derive(Debug, Deserialize)]
pub struct DisbursementRequest {
    pub loan_id: Option<Uuid>,
    pub phone_number: Option<String>,
    pub amount: Option<BigDecimal>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DisbursementResponse {
    pub success: bool,
    pub message: String,
}

/// Disburses an approved loan. One-shot: submission is treated as
/// disbursement, no confirmation callback follows.
pub async fn initiate_disbursement(
    State(state): State<AppState>,
    Json(payload): Json<DisbursementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let loan_id = require("loan_id", payload.loan_id)?;
    let phone_number = require("phone_number", payload.phone_number)?;
    let amount = require_amount("amount", payload.amount)?;
    let user_id = require("user_id", payload.user_id)?;

    let phone_number = normalize_msisdn(&phone_number);

    let client = state.mpesa.as_ref().ok_or(AppError::GatewayNotConfigured)?;

    // The loan flips to disbursed before the payout leaves the process; a
    // storage failure here aborts before any money moves.
    let loan = queries::disburse_loan(&state.db, loan_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan {} not found or not approved", loan_id)))?;

    let reference = client.payout(&phone_number, &amount).await.map_err(|e| match e {
        MpesaError::Unavailable(message) => AppError::GatewayUnavailable(message),
        other => AppError::GatewayRejected(other.to_string()),
    })?;

    let tx = Transaction::new_disbursement(user_id, loan.chama_id, amount, phone_number, reference);
    queries::insert_transaction(&state.db, &tx).await?;

    Ok(Json(DisbursementResponse {
        success: true,
        message: "Loan disbursed successfully. Check your M-Pesa for the funds.".to_string(),
    }))
}
