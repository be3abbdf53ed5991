use chrono::{DateTime, Utc};
use dpg_common::{CurrencyCode, Money};
use log::debug;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
    db::sqlite::{parse_status, SqliteDatabaseError},
    db_types::{NewProject, Project, ProjectPhase},
};

pub(crate) fn project_from_row(row: &SqliteRow) -> Result<Project, SqliteDatabaseError> {
    let currency: CurrencyCode = row.try_get("currency")?;
    Ok(Project {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        phase: parse_status(row.try_get::<String, _>("phase")?)?,
        amount_asked: Money::from_minor_units(row.try_get("amount_asked")?, currency.clone()),
        amount_donated: Money::from_minor_units(row.try_get("amount_donated")?, currency),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

pub async fn insert_project(
    project: NewProject,
    conn: &mut SqliteConnection,
) -> Result<Project, SqliteDatabaseError> {
    let id: i64 = sqlx::query(
        r#"
            INSERT INTO projects (slug, title, amount_asked, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING id;
        "#,
    )
    .bind(&project.slug)
    .bind(&project.title)
    .bind(project.amount_asked.minor_units())
    .bind(project.amount_asked.currency())
    .fetch_one(&mut *conn)
    .await?
    .try_get("id")?;
    debug!("🗃️ Project '{}' has been saved in the DB with id {id}", project.slug);
    fetch_project(id, conn).await?.ok_or(SqliteDatabaseError::ProjectNotFound(id))
}

pub async fn fetch_project(
    project_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Project>, SqliteDatabaseError> {
    let row = sqlx::query("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(project_from_row).transpose()
}

pub(crate) async fn update_phase(
    project_id: i64,
    phase: ProjectPhase,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let res = sqlx::query("UPDATE projects SET phase = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(phase.to_string())
        .bind(project_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ProjectNotFound(project_id));
    }
    Ok(())
}

pub(crate) async fn save_amounts(
    project_id: i64,
    amount_donated: &Money,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let res =
        sqlx::query("UPDATE projects SET amount_donated = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
            .bind(amount_donated.minor_units())
            .bind(project_id)
            .execute(&mut *conn)
            .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ProjectNotFound(project_id));
    }
    Ok(())
}
