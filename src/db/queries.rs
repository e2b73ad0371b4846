use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{Contribution, Loan, Transaction};

// --- Transaction queries ---

pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, chama_id, amount, kind, status,
            phone_number, description, gateway_ref, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.chama_id)
    .bind(&tx.amount)
    .bind(tx.kind)
    .bind(tx.status)
    .bind(&tx.phone_number)
    .bind(&tx.description)
    .bind(&tx.gateway_ref)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn list_transactions(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn find_by_gateway_ref(pool: &PgPool, gateway_ref: &str) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE gateway_ref = $1")
        .bind(gateway_ref)
        .fetch_optional(pool)
        .await
}

pub async fn set_gateway_ref(pool: &PgPool, id: Uuid, gateway_ref: &str) -> Result<()> {
    sqlx::query("UPDATE transactions SET gateway_ref = $1, updated_at = NOW() WHERE id = $2")
        .bind(gateway_ref)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Marks an initiation that the gateway declined. Only a pending
/// transaction can transition.
pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE transactions SET status = 'failed', updated_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Compare-and-update `pending -> completed`, overwriting `gateway_ref`
/// with the settlement receipt. Returns `None` when the transaction was
/// already terminal, which is how a redelivered callback no-ops.
pub async fn complete_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    receipt_ref: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = 'completed', gateway_ref = $1, updated_at = NOW()
        WHERE id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(receipt_ref)
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

/// Compare-and-update `pending -> failed`, appending the gateway's stated
/// reason to the description. Returns whether a row transitioned.
pub async fn fail_transaction(pool: &PgPool, id: Uuid, reason: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'failed',
            description = description || ' - Failed: ' || $1,
            updated_at = NOW()
        WHERE id = $2 AND status = 'pending'
        "#,
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// --- Contribution queries ---

pub async fn insert_contribution(
    executor: &mut SqlxTransaction<'_, Postgres>,
    contribution: &Contribution,
) -> Result<Contribution> {
    sqlx::query_as::<_, Contribution>(
        r#"
        INSERT INTO contributions (
            id, user_id, chama_id, amount, status, payment_method, transaction_ref, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(contribution.id)
    .bind(contribution.user_id)
    .bind(contribution.chama_id)
    .bind(&contribution.amount)
    .bind(&contribution.status)
    .bind(&contribution.payment_method)
    .bind(&contribution.transaction_ref)
    .bind(contribution.created_at)
    .fetch_one(&mut **executor)
    .await
}

// --- Loan queries ---

/// Compare-and-update `approved -> disbursed`, stamping `disbursed_at`
/// exactly once. Returns `None` when no approved loan matched.
pub async fn disburse_loan(pool: &PgPool, id: Uuid) -> Result<Option<Loan>> {
    sqlx::query_as::<_, Loan>(
        r#"
        UPDATE loans
        SET status = 'disbursed', disbursed_at = NOW()
        WHERE id = $1 AND status = 'approved'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
