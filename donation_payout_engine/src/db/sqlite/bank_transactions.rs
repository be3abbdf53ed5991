use chrono::{DateTime, Utc};
use dpg_common::{CurrencyCode, Money};
use log::debug;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
    db::sqlite::{parse_status, SqliteDatabaseError},
    db_types::{BankTransaction, NewBankTransaction},
    traits::TransactionResolution,
};

fn transaction_from_row(row: &SqliteRow) -> Result<BankTransaction, SqliteDatabaseError> {
    let currency: CurrencyCode = row.try_get("currency")?;
    Ok(BankTransaction {
        id: row.try_get("id")?,
        fingerprint: row.try_get("fingerprint")?,
        amount: Money::from_minor_units(row.try_get("amount")?, currency),
        book_date: row.try_get("book_date")?,
        description: row.try_get("description")?,
        status: parse_status(row.try_get::<String, _>("status")?)?,
        payout_id: row.try_get("payout_id")?,
        donation_id: row.try_get("donation_id")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Inserts a statement line unless its fingerprint is already present; returns the stored record and
/// whether it was inserted.
pub async fn idempotent_insert(
    tx: NewBankTransaction,
    conn: &mut SqliteConnection,
) -> Result<(BankTransaction, bool), SqliteDatabaseError> {
    let fingerprint = tx.fingerprint();
    let existing = sqlx::query("SELECT * FROM bank_transactions WHERE fingerprint = $1")
        .bind(&fingerprint)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok((transaction_from_row(&row)?, false));
    }
    let row = sqlx::query(
        r#"
            INSERT INTO bank_transactions (fingerprint, amount, currency, book_date, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&fingerprint)
    .bind(tx.amount.minor_units())
    .bind(tx.amount.currency())
    .bind(tx.book_date)
    .bind(&tx.description)
    .fetch_one(&mut *conn)
    .await?;
    let tx = transaction_from_row(&row)?;
    debug!("🗃️ Bank transaction {} saved ({} on {})", tx.id, tx.amount, tx.book_date);
    Ok((tx, true))
}

pub async fn fetch_transaction(
    tx_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<BankTransaction>, SqliteDatabaseError> {
    let row = sqlx::query("SELECT * FROM bank_transactions WHERE id = $1")
        .bind(tx_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(transaction_from_row).transpose()
}

/// All transactions still awaiting manual resolution, oldest book date first.
pub async fn fetch_unresolved(
    conn: &mut SqliteConnection,
) -> Result<Vec<BankTransaction>, SqliteDatabaseError> {
    let rows = sqlx::query(
        "SELECT * FROM bank_transactions WHERE status = 'Unknown' ORDER BY book_date ASC, id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(transaction_from_row).collect()
}

/// Marks a transaction `Valid` and links its resolution. Only `Unknown` transactions can be resolved;
/// the WHERE clause makes re-resolution a no-op that surfaces as an error.
pub(crate) async fn resolve(
    tx_id: i64,
    resolution: TransactionResolution,
    conn: &mut SqliteConnection,
) -> Result<BankTransaction, SqliteDatabaseError> {
    let (payout_id, donation_id) = match resolution {
        TransactionResolution::ManualDonation { donation_id } => (None, Some(donation_id)),
        TransactionResolution::PayoutMatch { payout_id } => (Some(payout_id), None),
    };
    let res = sqlx::query(
        r#"
            UPDATE bank_transactions
            SET status = 'Valid',
                payout_id = $1,
                donation_id = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'Unknown';
        "#,
    )
    .bind(payout_id)
    .bind(donation_id)
    .bind(tx_id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::TransactionNotFound(tx_id));
    }
    fetch_transaction(tx_id, conn).await?.ok_or(SqliteDatabaseError::TransactionNotFound(tx_id))
}
