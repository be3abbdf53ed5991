use std::fmt::Debug;

use dpg_common::{CurrencyCode, Money};
use sqlx::SqlitePool;

use crate::{
    db::sqlite::{bank_transactions, donations, new_pool, orders, payouts, projects},
    db_types::{
        BankTransaction,
        Donation,
        DonationRecord,
        NewBankTransaction,
        NewDonation,
        NewOrder,
        NewProject,
        Order,
        OrderId,
        OrderStatus,
        OrganizationPayout,
        Project,
        ProjectPayout,
        ProjectPhase,
    },
    traits::{
        DonationReporting,
        PayoutGatewayDatabase,
        PayoutGatewayError,
        ReportingError,
        SettlementWindow,
        TransactionResolution,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PayoutGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PayoutGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_project(&self, project: NewProject) -> Result<Project, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(projects::insert_project(project, &mut conn).await?)
    }

    async fn update_project_phase(
        &self,
        project_id: i64,
        phase: ProjectPhase,
    ) -> Result<Project, PayoutGatewayError> {
        let mut tx = self.pool.begin().await?;
        projects::update_phase(project_id, phase, &mut tx).await?;
        let project = projects::fetch_project(project_id, &mut tx)
            .await?
            .ok_or(PayoutGatewayError::ProjectNotFound(project_id))?;
        tx.commit().await?;
        Ok(project)
    }

    async fn save_project_amounts(
        &self,
        project_id: i64,
        amount_donated: &Money,
    ) -> Result<(), PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(projects::save_amounts(project_id, amount_donated, &mut conn).await?)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PayoutGatewayError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::update_order_status(order_id, status, &mut conn).await?)
    }

    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, PayoutGatewayError> {
        let mut tx = self.pool.begin().await?;
        let donation = donations::insert_donation(donation, &mut tx).await?;
        tx.commit().await?;
        Ok(donation)
    }

    async fn fetch_project_ids_for_order(&self, order_id: &OrderId) -> Result<Vec<i64>, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(donations::fetch_project_ids_for_order(order_id, &mut conn).await?)
    }

    async fn open_payout_for_project(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectPayout>, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::open_payout_for_project(project_id, &mut conn).await?)
    }

    async fn create_payout(
        &self,
        project_id: i64,
        currency: CurrencyCode,
    ) -> Result<ProjectPayout, PayoutGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::insert_payout(project_id, currency, &mut tx).await?;
        tx.commit().await?;
        Ok(payout)
    }

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<ProjectPayout>, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout(payout_id, &mut conn).await?)
    }

    async fn save_payout(&self, payout: &ProjectPayout) -> Result<(), PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::save_payout(payout, &mut conn).await?)
    }

    async fn insert_bank_transaction(
        &self,
        tx: NewBankTransaction,
    ) -> Result<(BankTransaction, bool), PayoutGatewayError> {
        let mut db_tx = self.pool.begin().await?;
        let result = bank_transactions::idempotent_insert(tx, &mut db_tx).await?;
        db_tx.commit().await?;
        Ok(result)
    }

    async fn fetch_bank_transaction(&self, tx_id: i64) -> Result<Option<BankTransaction>, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(bank_transactions::fetch_transaction(tx_id, &mut conn).await?)
    }

    async fn resolve_bank_transaction(
        &self,
        tx_id: i64,
        resolution: TransactionResolution,
    ) -> Result<BankTransaction, PayoutGatewayError> {
        let mut db_tx = self.pool.begin().await?;
        let result = bank_transactions::resolve(tx_id, resolution, &mut db_tx).await?;
        db_tx.commit().await?;
        Ok(result)
    }

    async fn create_organization_payout(
        &self,
        window: &SettlementWindow,
        currency: CurrencyCode,
    ) -> Result<OrganizationPayout, PayoutGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::insert_organization_payout(window, currency, &mut tx).await?;
        tx.commit().await?;
        Ok(payout)
    }

    async fn fetch_organization_payout(&self, id: i64) -> Result<Option<OrganizationPayout>, PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_organization_payout(id, &mut conn).await?)
    }

    async fn save_organization_payout(&self, payout: &OrganizationPayout) -> Result<(), PayoutGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::save_organization_payout(payout, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), PayoutGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl DonationReporting for SqliteDatabase {
    async fn fetch_donations_for_project(&self, project_id: i64) -> Result<Vec<DonationRecord>, ReportingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(donations::fetch_donation_records_for_project(project_id, &mut conn).await?)
    }

    async fn fetch_project(&self, project_id: i64) -> Result<Option<Project>, ReportingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(projects::fetch_project(project_id, &mut conn).await?)
    }

    async fn fetch_payouts_for_project(&self, project_id: i64) -> Result<Vec<ProjectPayout>, ReportingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payouts_for_project(project_id, &mut conn).await?)
    }

    async fn fetch_settled_payouts_between(
        &self,
        window: &SettlementWindow,
    ) -> Result<Vec<ProjectPayout>, ReportingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_settled_between(window, &mut conn).await?)
    }

    async fn fetch_unresolved_transactions(&self) -> Result<Vec<BankTransaction>, ReportingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(bank_transactions::fetch_unresolved(&mut conn).await?)
    }

    async fn fetch_payouts_with_payable_amount(
        &self,
        amount: &Money,
    ) -> Result<Vec<ProjectPayout>, ReportingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_by_payable_amount(amount, &mut conn).await?)
    }
}
