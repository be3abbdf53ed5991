use dpg_common::{CurrencyCode, Money, MoneyError};
use thiserror::Error;

use crate::{
    db_types::{
        BankTransaction,
        Donation,
        NewBankTransaction,
        NewDonation,
        NewOrder,
        NewProject,
        Order,
        OrderId,
        OrderStatus,
        OrderTransitionError,
        OrganizationPayout,
        PayoutError,
        Project,
        ProjectPayout,
        ProjectPhase,
    },
    traits::{donation_reporting::ReportingError, DonationReporting, SettlementWindow, TransactionResolution},
};

/// This trait defines the highest level of behaviour for backends supporting the donation payout engine.
///
/// This behaviour includes:
/// * Storing projects, orders and donations as they enter the system
/// * Persisting payout records and their guarded amount changes
/// * Recording bank transactions and their reconciliation outcomes
///
/// Backends store and fetch; they never calculate. The ordering of the side-effect chain (insert donation,
/// refresh aggregates, payout upkeep, ...) lives in the API layer, where it is explicit and testable.
#[allow(async_fn_in_trait)]
pub trait PayoutGatewayDatabase: Clone + DonationReporting {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn insert_project(&self, project: NewProject) -> Result<Project, PayoutGatewayError>;

    async fn update_project_phase(&self, project_id: i64, phase: ProjectPhase) -> Result<Project, PayoutGatewayError>;

    /// Persist the derived `amount_donated` for a project after re-aggregation.
    async fn save_project_amounts(&self, project_id: i64, amount_donated: &Money) -> Result<(), PayoutGatewayError>;

    /// Takes a new order and stores it in the database. This call is idempotent.
    /// Returns the order and `true` if it was inserted, or the existing order and `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PayoutGatewayError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PayoutGatewayError>;

    /// Writes the new status for an order. Transition validation happens in the API layer; the backend
    /// stores whatever it is told.
    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order, PayoutGatewayError>;

    /// Stores a donation against an existing project and order.
    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, PayoutGatewayError>;

    /// Internal ids of all projects that received a donation under the given order. An order may fund
    /// more than one project.
    async fn fetch_project_ids_for_order(&self, order_id: &OrderId) -> Result<Vec<i64>, PayoutGatewayError>;

    /// The project's single open (non-settled) payout, if any. The payout creation policy guarantees at
    /// most one open payout per project; the most recent one wins if the data disagrees.
    async fn open_payout_for_project(&self, project_id: i64) -> Result<Option<ProjectPayout>, PayoutGatewayError>;

    /// Creates a fresh, zeroed payout for the project.
    async fn create_payout(&self, project_id: i64, currency: CurrencyCode) -> Result<ProjectPayout, PayoutGatewayError>;

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<ProjectPayout>, PayoutGatewayError>;

    /// Persists the payout's amounts, rule, status, protection flag and completion date.
    async fn save_payout(&self, payout: &ProjectPayout) -> Result<(), PayoutGatewayError>;

    /// Stores a bank statement line, keyed on its fingerprint. This call is idempotent.
    /// Returns the transaction and `true` if it was inserted, or the existing record and `false`.
    async fn insert_bank_transaction(
        &self,
        tx: NewBankTransaction,
    ) -> Result<(BankTransaction, bool), PayoutGatewayError>;

    async fn fetch_bank_transaction(&self, tx_id: i64) -> Result<Option<BankTransaction>, PayoutGatewayError>;

    /// Marks the transaction `Valid` and links it to the donation or payout that resolved it.
    async fn resolve_bank_transaction(
        &self,
        tx_id: i64,
        resolution: TransactionResolution,
    ) -> Result<BankTransaction, PayoutGatewayError>;

    async fn create_organization_payout(
        &self,
        window: &SettlementWindow,
        currency: CurrencyCode,
    ) -> Result<OrganizationPayout, PayoutGatewayError>;

    async fn fetch_organization_payout(&self, id: i64) -> Result<Option<OrganizationPayout>, PayoutGatewayError>;

    async fn save_organization_payout(&self, payout: &OrganizationPayout) -> Result<(), PayoutGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PayoutGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PayoutGatewayError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested payout {0} does not exist")]
    PayoutNotFound(i64),
    #[error("The requested bank transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("Bank transaction {0} has already been resolved")]
    TransactionAlreadyResolved(i64),
    #[error("The requested organization payout {0} does not exist")]
    OrganizationPayoutNotFound(i64),
    #[error("{0} is not a done phase, so it cannot trigger payout creation")]
    PhaseNotDone(ProjectPhase),
    #[error("{0}")]
    OrderTransition(#[from] OrderTransitionError),
    #[error("{0}")]
    Payout(#[from] PayoutError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("{0}")]
    Reporting(#[from] ReportingError),
}

impl From<sqlx::Error> for PayoutGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PayoutGatewayError::DatabaseError(e.to_string())
    }
}
