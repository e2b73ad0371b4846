use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use uuid::Uuid;

/// The Daraja `AccountReference` field caps out at 12 characters.
pub const ACCOUNT_REF_MAX_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Contribution,
    LoanDisbursement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Disbursed,
    Rejected,
}

/// The unit of money movement tracked by the orchestration core.
///
/// `gateway_ref` holds the gateway's correlation identifier once the push
/// request is accepted, and is overwritten with the settlement receipt
/// identifier when the callback lands. It identifies at most one
/// transaction at any time (unique index).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chama_id: Uuid,
    pub amount: BigDecimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub phone_number: String,
    pub description: String,
    pub gateway_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A collection transaction starts `pending`; the callback reconciler
    /// owns its terminal transition.
    pub fn new_contribution(
        user_id: Uuid,
        chama_id: Uuid,
        amount: BigDecimal,
        phone_number: String,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            chama_id,
            amount,
            kind: TransactionKind::Contribution,
            status: TransactionStatus::Pending,
            phone_number,
            description,
            gateway_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// A disbursement transaction is final on creation; there is no
    /// confirmation callback for payouts.
    pub fn new_disbursement(
        user_id: Uuid,
        chama_id: Uuid,
        amount: BigDecimal,
        phone_number: String,
        gateway_ref: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            chama_id,
            amount,
            kind: TransactionKind::LoanDisbursement,
            status: TransactionStatus::Completed,
            phone_number,
            description: "Loan disbursement".to_string(),
            gateway_ref: Some(gateway_ref),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn account_reference(&self) -> String {
        self.id.to_string().chars().take(ACCOUNT_REF_MAX_LEN).collect()
    }
}

/// Ledger entry materialized only when a collection transaction reaches
/// `completed`. Never created speculatively, never updated afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contribution {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chama_id: Uuid,
    pub amount: BigDecimal,
    pub status: String,
    pub payment_method: String,
    pub transaction_ref: String,
    pub created_at: DateTime<Utc>,
}

impl Contribution {
    pub fn for_transaction(tx: &Transaction, amount: BigDecimal, reference: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: tx.user_id,
            chama_id: tx.chama_id,
            amount,
            status: "completed".to_string(),
            payment_method: "mpesa".to_string(),
            transaction_ref: reference.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Owned by the membership/loan CRUD layer; this core only performs the
/// `approved -> disbursed` transition.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chama_id: Uuid,
    pub amount: BigDecimal,
    pub status: LoanStatus,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
