use chrono::{DateTime, Utc};
use dpg_common::{CurrencyCode, Money};
use log::debug;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
    db::sqlite::{parse_status, SqliteDatabaseError},
    db_types::{OrganizationPayout, ProjectPayout},
    traits::SettlementWindow,
};

pub(crate) fn payout_from_row(row: &SqliteRow) -> Result<ProjectPayout, SqliteDatabaseError> {
    let currency: CurrencyCode = row.try_get("currency")?;
    Ok(ProjectPayout::from_stored(
        row.try_get("id")?,
        row.try_get("project_id")?,
        parse_status(row.try_get::<String, _>("status")?)?,
        row.try_get::<bool, _>("protected")?,
        parse_status(row.try_get::<String, _>("payout_rule")?)?,
        Money::from_minor_units(row.try_get("amount_raised")?, currency.clone()),
        Money::from_minor_units(row.try_get("organization_fee")?, currency.clone()),
        Money::from_minor_units(row.try_get("amount_payable")?, currency),
        row.try_get::<Option<DateTime<Utc>>, _>("completed")?,
        row.try_get::<DateTime<Utc>, _>("created_at")?,
        row.try_get::<DateTime<Utc>, _>("updated_at")?,
    ))
}

pub async fn insert_payout(
    project_id: i64,
    currency: CurrencyCode,
    conn: &mut SqliteConnection,
) -> Result<ProjectPayout, SqliteDatabaseError> {
    let id: i64 = sqlx::query(
        r#"
            INSERT INTO project_payouts (project_id, currency)
            VALUES ($1, $2)
            RETURNING id;
        "#,
    )
    .bind(project_id)
    .bind(&currency)
    .fetch_one(&mut *conn)
    .await?
    .try_get("id")?;
    debug!("🗃️ Payout {id} created for project {project_id}");
    fetch_payout(id, conn).await?.ok_or(SqliteDatabaseError::PayoutNotFound(id))
}

pub async fn fetch_payout(
    payout_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProjectPayout>, SqliteDatabaseError> {
    let row = sqlx::query("SELECT * FROM project_payouts WHERE id = $1")
        .bind(payout_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(payout_from_row).transpose()
}

/// The project's most recent non-settled payout, if any.
pub async fn open_payout_for_project(
    project_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProjectPayout>, SqliteDatabaseError> {
    let row = sqlx::query(
        r#"
            SELECT * FROM project_payouts
            WHERE project_id = $1 AND status != 'Settled'
            ORDER BY id DESC
            LIMIT 1;
        "#,
    )
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(payout_from_row).transpose()
}

pub async fn fetch_payouts_for_project(
    project_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProjectPayout>, SqliteDatabaseError> {
    let rows = sqlx::query("SELECT * FROM project_payouts WHERE project_id = $1 ORDER BY id ASC")
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(payout_from_row).collect()
}

pub(crate) async fn save_payout(
    payout: &ProjectPayout,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let res = sqlx::query(
        r#"
            UPDATE project_payouts
            SET status = $1,
                protected = $2,
                payout_rule = $3,
                amount_raised = $4,
                organization_fee = $5,
                amount_payable = $6,
                completed = $7,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $8;
        "#,
    )
    .bind(payout.status().to_string())
    .bind(payout.protected())
    .bind(payout.payout_rule().to_string())
    .bind(payout.amount_raised().minor_units())
    .bind(payout.organization_fee().minor_units())
    .bind(payout.amount_payable().minor_units())
    .bind(payout.completed())
    .bind(payout.id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::PayoutNotFound(payout.id));
    }
    Ok(())
}

/// Settled payouts whose completion date falls in the window, for the organization roll-up.
pub async fn fetch_settled_between(
    window: &SettlementWindow,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProjectPayout>, SqliteDatabaseError> {
    let rows = sqlx::query(
        r#"
            SELECT * FROM project_payouts
            WHERE status = 'Settled'
              AND completed IS NOT NULL
              AND date(completed) >= date($1)
              AND date(completed) <= date($2)
            ORDER BY completed ASC;
        "#,
    )
    .bind(window.start_date)
    .bind(window.end_date)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(payout_from_row).collect()
}

/// Exported payouts whose payable amount equals the given amount, for bounce-match hinting.
pub async fn fetch_by_payable_amount(
    amount: &Money,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProjectPayout>, SqliteDatabaseError> {
    let rows = sqlx::query(
        r#"
            SELECT * FROM project_payouts
            WHERE amount_payable = $1
              AND currency = $2
              AND status IN ('InProgress', 'Settled')
            ORDER BY id ASC;
        "#,
    )
    .bind(amount.minor_units())
    .bind(amount.currency())
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(payout_from_row).collect()
}

//------------------------------------ Organization payouts ----------------------------------------------------------

fn organization_payout_from_row(row: &SqliteRow) -> Result<OrganizationPayout, SqliteDatabaseError> {
    let currency: CurrencyCode = row.try_get("currency")?;
    Ok(OrganizationPayout {
        id: row.try_get("id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        payable_amount_excl: Money::from_minor_units(row.try_get("payable_amount_excl")?, currency.clone()),
        payable_amount_incl: Money::from_minor_units(row.try_get("payable_amount_incl")?, currency),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

pub async fn insert_organization_payout(
    window: &SettlementWindow,
    currency: CurrencyCode,
    conn: &mut SqliteConnection,
) -> Result<OrganizationPayout, SqliteDatabaseError> {
    let id: i64 = sqlx::query(
        r#"
            INSERT INTO organization_payouts (start_date, end_date, currency)
            VALUES ($1, $2, $3)
            RETURNING id;
        "#,
    )
    .bind(window.start_date)
    .bind(window.end_date)
    .bind(&currency)
    .fetch_one(&mut *conn)
    .await?
    .try_get("id")?;
    fetch_organization_payout(id, conn).await?.ok_or(SqliteDatabaseError::OrganizationPayoutNotFound(id))
}

pub async fn fetch_organization_payout(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OrganizationPayout>, SqliteDatabaseError> {
    let row = sqlx::query("SELECT * FROM organization_payouts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(organization_payout_from_row).transpose()
}

pub(crate) async fn save_organization_payout(
    payout: &OrganizationPayout,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let res = sqlx::query(
        r#"
            UPDATE organization_payouts
            SET payable_amount_excl = $1,
                payable_amount_incl = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3;
        "#,
    )
    .bind(payout.payable_amount_excl.minor_units())
    .bind(payout.payable_amount_incl.minor_units())
    .bind(payout.id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrganizationPayoutNotFound(payout.id));
    }
    Ok(())
}
