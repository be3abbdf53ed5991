use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{PayoutGatewayError, ReportingError},
};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Project not found: {0}")]
    ProjectNotFound(i64),
    #[error("There is no order with order_id {0}")]
    OrderNotFound(String),
    #[error("Payout not found: {0}")]
    PayoutNotFound(i64),
    #[error("Bank transaction not found or already resolved: {0}")]
    TransactionNotFound(i64),
    #[error("Organization payout not found: {0}")]
    OrganizationPayoutNotFound(i64),
}

impl From<SqliteDatabaseError> for PayoutGatewayError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::ProjectNotFound(id) => PayoutGatewayError::ProjectNotFound(id),
            SqliteDatabaseError::OrderNotFound(oid) => PayoutGatewayError::OrderNotFound(OrderId(oid)),
            SqliteDatabaseError::PayoutNotFound(id) => PayoutGatewayError::PayoutNotFound(id),
            SqliteDatabaseError::TransactionNotFound(id) => PayoutGatewayError::TransactionNotFound(id),
            SqliteDatabaseError::OrganizationPayoutNotFound(id) => {
                PayoutGatewayError::OrganizationPayoutNotFound(id)
            },
            e => PayoutGatewayError::DatabaseError(e.to_string()),
        }
    }
}

impl From<SqliteDatabaseError> for ReportingError {
    fn from(e: SqliteDatabaseError) -> Self {
        ReportingError::DatabaseError(e.to_string())
    }
}
