//! Callback reconciliation: the only transition function for the
//! `pending` branch of a collection transaction.

use bigdecimal::FromPrimitive;
use sqlx::PgPool;
use sqlx::types::BigDecimal;
use tracing::{info, warn};

use crate::db::models::Contribution;
use crate::db::queries;
use crate::handlers::callback::{MetadataItem, StkCallback};

const RESULT_SUCCESS: i64 = 0;

#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Transaction completed and exactly one contribution materialized.
    Completed,
    /// Transaction marked failed with the gateway's stated reason.
    Failed,
    /// The transaction was already terminal; a redelivered callback
    /// changes nothing.
    AlreadySettled,
    /// No transaction carries this correlation id; accepted and dropped.
    Unmatched,
}

pub async fn apply_callback(
    pool: &PgPool,
    callback: StkCallback,
) -> Result<ReconcileOutcome, sqlx::Error> {
    let Some(tx) = queries::find_by_gateway_ref(pool, &callback.checkout_request_id).await? else {
        // The gateway will not redeliver; dropping an unmatched callback
        // is preferable to bouncing it into gateway-side retries.
        warn!(
            checkout_request_id = %callback.checkout_request_id,
            "callback matches no transaction"
        );
        return Ok(ReconcileOutcome::Unmatched);
    };

    if callback.result_code != RESULT_SUCCESS {
        let transitioned = queries::fail_transaction(pool, tx.id, &callback.result_desc).await?;
        if !transitioned {
            return Ok(ReconcileOutcome::AlreadySettled);
        }
        info!(
            transaction_id = %tx.id,
            result_desc = %callback.result_desc,
            "payment failed"
        );
        return Ok(ReconcileOutcome::Failed);
    }

    let items = callback
        .metadata
        .as_ref()
        .map(|m| m.items.as_slice())
        .unwrap_or(&[]);
    let receipt =
        receipt_number(items).unwrap_or_else(|| callback.checkout_request_id.clone());
    let amount = settlement_amount(items).unwrap_or_else(|| tx.amount.clone());

    // The terminal transition and the ledger entry land atomically; a
    // redelivered success callback finds no pending row and no-ops.
    let mut db_tx = pool.begin().await?;
    let Some(completed) = queries::complete_transaction(&mut db_tx, tx.id, &receipt).await? else {
        db_tx.rollback().await?;
        return Ok(ReconcileOutcome::AlreadySettled);
    };
    let contribution = Contribution::for_transaction(&completed, amount, &receipt);
    queries::insert_contribution(&mut db_tx, &contribution).await?;
    db_tx.commit().await?;

    info!(transaction_id = %completed.id, receipt = %receipt, "payment completed");
    Ok(ReconcileOutcome::Completed)
}

pub fn receipt_number(items: &[MetadataItem]) -> Option<String> {
    items
        .iter()
        .find(|item| item.name == "MpesaReceiptNumber")
        .and_then(|item| item.value.as_str().map(str::to_string))
}

/// The gateway may settle a corrected amount; it arrives as a metadata
/// item, usually a JSON number.
pub fn settlement_amount(items: &[MetadataItem]) -> Option<BigDecimal> {
    let value = &items.iter().find(|item| item.name == "Amount")?.value;

    if let Some(n) = value.as_i64() {
        return BigDecimal::from_i64(n);
    }
    if let Some(n) = value.as_f64() {
        return BigDecimal::from_f64(n);
    }
    value.as_str().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(name: &str, value: serde_json::Value) -> MetadataItem {
        MetadataItem {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn finds_receipt_number() {
        let items = vec![
            item("Amount", json!(1000)),
            item("MpesaReceiptNumber", json!("SFC9XK72LM")),
            item("PhoneNumber", json!(254712345678u64)),
        ];
        assert_eq!(receipt_number(&items).as_deref(), Some("SFC9XK72LM"));
    }

    #[test]
    fn missing_receipt_yields_none() {
        let items = vec![item("Amount", json!(1000))];
        assert_eq!(receipt_number(&items), None);
        assert_eq!(receipt_number(&[]), None);
    }

    #[test]
    fn reads_integer_and_fractional_amounts() {
        let items = vec![item("Amount", json!(1000))];
        assert_eq!(settlement_amount(&items), Some(BigDecimal::from(1000)));

        let items = vec![item("Amount", json!(1000.5))];
        assert_eq!(
            settlement_amount(&items),
            BigDecimal::from_f64(1000.5)
        );
    }

    #[test]
    fn reads_string_amounts() {
        let items = vec![item("Amount", json!("750"))];
        assert_eq!(settlement_amount(&items), Some(BigDecimal::from(750)));
    }

    #[test]
    fn missing_amount_yields_none() {
        let items = vec![item("MpesaReceiptNumber", json!("SFC9XK72LM"))];
        assert_eq!(settlement_amount(&items), None);
        assert_eq!(settlement_amount(&[]), None);
    }
}
