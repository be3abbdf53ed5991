pub mod db;
mod errors;

pub mod bank_transactions;
pub mod donations;
pub mod orders;
pub mod payouts;
pub mod projects;

use std::{env, fmt::Display, str::FromStr};

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

const SQLITE_DB_URL: &str = "sqlite://data/dpg_store.db";

pub fn db_url() -> String {
    let result = env::var("DPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("DPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Parse a TEXT status column into its enum, surfacing bad data as a query error rather than a panic.
pub(crate) fn parse_status<T>(value: String) -> Result<T, SqliteDatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| SqliteDatabaseError::QueryError(e.to_string()))
}
