use chrono::{DateTime, Utc};
use dpg_common::{CurrencyCode, Money};
use log::debug;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
    db::sqlite::{parse_status, SqliteDatabaseError},
    db_types::{Donation, DonationRecord, NewDonation, OrderId},
};

fn donation_from_row(row: &SqliteRow) -> Result<Donation, SqliteDatabaseError> {
    let currency: CurrencyCode = row.try_get("currency")?;
    Ok(Donation {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        order_id: row.try_get("order_id")?,
        amount: Money::from_minor_units(row.try_get("amount")?, currency),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Stores a donation. The parent order is referenced by its external id and must already exist.
pub async fn insert_donation(
    donation: NewDonation,
    conn: &mut SqliteConnection,
) -> Result<Donation, SqliteDatabaseError> {
    let order_row = sqlx::query("SELECT id FROM orders WHERE order_id = $1")
        .bind(&donation.order_id)
        .fetch_optional(&mut *conn)
        .await?;
    let order_pk: i64 = match order_row {
        Some(row) => row.try_get("id")?,
        None => return Err(SqliteDatabaseError::OrderNotFound(donation.order_id.0)),
    };
    let row = sqlx::query(
        r#"
            INSERT INTO donations (project_id, order_id, amount, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(donation.project_id)
    .bind(order_pk)
    .bind(donation.amount.minor_units())
    .bind(donation.amount.currency())
    .fetch_one(&mut *conn)
    .await?;
    let donation = donation_from_row(&row)?;
    debug!("🗃️ Donation {} saved for project {}", donation.id, donation.project_id);
    Ok(donation)
}

/// Donation amounts joined with the current status of their parent order. This is the row shape the
/// pure projection functions consume.
pub async fn fetch_donation_records_for_project(
    project_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DonationRecord>, SqliteDatabaseError> {
    let rows = sqlx::query(
        r#"
            SELECT d.amount, d.currency, o.status
            FROM donations d
            JOIN orders o ON o.id = d.order_id
            WHERE d.project_id = $1
            ORDER BY d.id ASC;
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|row| {
            let currency: CurrencyCode = row.try_get("currency")?;
            Ok(DonationRecord {
                amount: Money::from_minor_units(row.try_get("amount")?, currency),
                order_status: parse_status(row.try_get::<String, _>("status")?)?,
            })
        })
        .collect()
}

pub async fn fetch_project_ids_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<i64>, SqliteDatabaseError> {
    let rows = sqlx::query(
        r#"
            SELECT DISTINCT d.project_id
            FROM donations d
            JOIN orders o ON o.id = d.order_id
            WHERE o.order_id = $1;
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(|row| Ok(row.try_get("project_id")?)).collect()
}
