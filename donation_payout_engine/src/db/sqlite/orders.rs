use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
    db::sqlite::{parse_status, SqliteDatabaseError},
    db_types::{NewOrder, Order, OrderId, OrderStatus},
};

pub(crate) fn order_from_row(row: &SqliteRow) -> Result<Order, SqliteDatabaseError> {
    Ok(Order {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        status: parse_status(row.try_get::<String, _>("status")?)?,
        payment_method: parse_status(row.try_get::<String, _>("payment_method")?)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Inserts the order if its external id is unseen; returns the stored order and whether it was inserted.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), SqliteDatabaseError> {
    if let Some(existing) = fetch_order_by_order_id(&order.order_id, conn).await? {
        return Ok((existing, false));
    }
    let inserted = insert_order(order, conn).await?;
    Ok((inserted, true))
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let id: i64 = sqlx::query(
        r#"
            INSERT INTO orders (order_id, payment_method)
            VALUES ($1, $2)
            RETURNING id;
        "#,
    )
    .bind(&order.order_id)
    .bind(order.payment_method.to_string())
    .fetch_one(&mut *conn)
    .await?
    .try_get("id")?;
    debug!("🗃️ Order {} has been saved in the DB with id {id}", order.order_id);
    fetch_order_by_order_id(&order.order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order.order_id.0))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let row = sqlx::query("SELECT * FROM orders WHERE order_id = $1 LIMIT 1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(order_from_row).transpose()
}

pub(crate) async fn update_order_status(
    order_id: &OrderId,
    status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let res =
        sqlx::query("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2")
            .bind(status.to_string())
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(order_id.0.clone()));
    }
    fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order_id.0.clone()))
}
