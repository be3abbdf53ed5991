use dpg_common::{Money, MoneyError};
use thiserror::Error;

use crate::{
    db_types::{BankTransaction, DonationRecord, Project, ProjectPayout},
    traits::SettlementWindow,
};

#[derive(Debug, Clone, Error)]
pub enum ReportingError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl From<sqlx::Error> for ReportingError {
    fn from(e: sqlx::Error) -> Self {
        ReportingError::DatabaseError(e.to_string())
    }
}

/// The read side of the engine: donation projections, payout history and the reconciliation worklist.
///
/// These queries stay available for any payout, protected or not — freezing a payout's amounts never
/// freezes the real-time pending/safe/failed views over its project's donations.
#[allow(async_fn_in_trait)]
pub trait DonationReporting {
    /// All donations for the project, paired with their parent order's current status. This is the raw
    /// input for the pure projection functions in [`crate::helpers`].
    async fn fetch_donations_for_project(&self, project_id: i64) -> Result<Vec<DonationRecord>, ReportingError>;

    async fn fetch_project(&self, project_id: i64) -> Result<Option<Project>, ReportingError>;

    /// Full payout history for a project, oldest first.
    async fn fetch_payouts_for_project(&self, project_id: i64) -> Result<Vec<ProjectPayout>, ReportingError>;

    /// All settled payouts whose `completed` date falls in the window. Feeds the organization roll-up.
    async fn fetch_settled_payouts_between(
        &self,
        window: &SettlementWindow,
    ) -> Result<Vec<ProjectPayout>, ReportingError>;

    /// The admin worklist: bank transactions still in the `Unknown` integrity state, oldest first.
    async fn fetch_unresolved_transactions(&self) -> Result<Vec<BankTransaction>, ReportingError>;

    /// Payouts whose payable amount equals the given amount. Used for match hinting only; the engine
    /// never matches a bank transaction automatically.
    async fn fetch_payouts_with_payable_amount(&self, amount: &Money) -> Result<Vec<ProjectPayout>, ReportingError>;
}
