use std::fmt::Debug;

use dpg_common::Money;
use log::*;

use crate::{
    db_types::{
        BankTransaction,
        Donation,
        NewBankTransaction,
        NewDonation,
        NewOrder,
        OrderId,
        OrderStatus,
        ProjectPayout,
        TransactionIntegrityStatus,
    },
    dpe_api::payout_flow_api::PayoutFlowApi,
    tenant::TenantContext,
    traits::{ImportResult, MatchCandidate, PayoutGatewayDatabase, PayoutGatewayError, TransactionResolution},
};

/// `ReconciliationApi` handles external bank records: statement import, the admin worklist, match
/// hinting, and the two manual resolution commands.
///
/// There is deliberately no automatic matching. A bank record alone does not reliably indicate intent
/// beyond its amount, so resolution is always an admin decision; the engine only keeps the worklist and
/// offers amount-equality hints.
pub struct ReconciliationApi<B> {
    db: B,
    flow: PayoutFlowApi<B>,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B: Clone> ReconciliationApi<B> {
    pub fn new(db: B) -> Self {
        let flow = PayoutFlowApi::new(db.clone());
        Self { db, flow }
    }
}

impl<B> ReconciliationApi<B>
where B: PayoutGatewayDatabase
{
    /// Import a batch of bank statement lines. Lines already present (same fingerprint) are skipped, so
    /// re-importing an overlapping statement is harmless.
    pub async fn import_statement(&self, lines: Vec<NewBankTransaction>) -> Result<ImportResult, PayoutGatewayError> {
        let mut result = ImportResult::default();
        for line in lines {
            let (tx, created) = self.db.insert_bank_transaction(line).await?;
            if created {
                trace!("🏦️ Imported bank transaction {}: {} on {}", tx.id, tx.amount, tx.book_date);
                result.imported += 1;
            } else {
                result.duplicates += 1;
            }
        }
        info!("🏦️ Statement import complete. {} new, {} duplicates", result.imported, result.duplicates);
        Ok(result)
    }

    /// The admin worklist: every transaction still in the `Unknown` integrity state. Transactions that
    /// cannot be resolved stay here indefinitely.
    pub async fn worklist(&self) -> Result<Vec<BankTransaction>, PayoutGatewayError> {
        Ok(self.db.fetch_unresolved_transactions().await?)
    }

    /// Offer payouts whose payable amount equals the transaction amount as match candidates, closest in
    /// date first. A hint for the operator, nothing more.
    pub async fn suggest_matches(&self, tx_id: i64) -> Result<Vec<MatchCandidate>, PayoutGatewayError> {
        let tx = self.fetch_unresolved(tx_id).await?;
        let payouts = self.db.fetch_payouts_with_payable_amount(&tx.amount).await?;
        let mut candidates: Vec<MatchCandidate> = payouts
            .into_iter()
            .map(|payout| {
                let reference = payout.completed().unwrap_or(payout.updated_at).date_naive();
                let days_apart = (tx.book_date - reference).num_days().abs();
                MatchCandidate { payout, days_apart }
            })
            .collect();
        candidates.sort_by_key(|c| c.days_apart);
        debug!("🏦️ {} match candidate(s) for bank transaction {tx_id}", candidates.len());
        Ok(candidates)
    }

    /// Resolve a bank transaction by creating a manual donation for a project the admin picked. The
    /// steps, in order:
    ///
    /// 1. A manual order is created and walked through `Created → Locked → Success`.
    /// 2. A donation for the transaction amount is recorded under that order, which re-aggregates the
    ///    project and runs payout upkeep.
    /// 3. The transaction is marked `Valid`, linked to the new donation.
    pub async fn create_manual_donation(
        &self,
        tx_id: i64,
        project_id: i64,
        ctx: &TenantContext,
    ) -> Result<Donation, PayoutGatewayError> {
        let tx = self.fetch_unresolved(tx_id).await?;
        let order_id = OrderId::from(format!("bank-tx-{tx_id}"));
        let order = self.flow.submit_order(NewOrder::manual(order_id.clone())).await?;
        self.flow.update_order_status(&order.order_id, OrderStatus::Locked, ctx).await?;
        self.flow.update_order_status(&order.order_id, OrderStatus::Success, ctx).await?;
        let donation =
            self.flow.process_new_donation(NewDonation::new(project_id, order_id, tx.amount.clone()), ctx).await?;
        self.db
            .resolve_bank_transaction(tx_id, TransactionResolution::ManualDonation { donation_id: donation.id })
            .await?;
        info!(
            "🏦️ Bank transaction {tx_id} resolved: manual donation {} of {} for project {project_id}",
            donation.id, donation.amount
        );
        Ok(donation)
    }

    /// Resolve a bank transaction by matching it to an existing payout (the bounce path). The payout
    /// moves to `Retry` with the admin-entered bank costs deducted, and the transaction becomes `Valid`.
    pub async fn match_to_payout(
        &self,
        tx_id: i64,
        payout_id: i64,
        bank_costs: &Money,
    ) -> Result<ProjectPayout, PayoutGatewayError> {
        let _tx = self.fetch_unresolved(tx_id).await?;
        let payout = self.flow.retry_payout(payout_id, bank_costs).await?;
        self.db.resolve_bank_transaction(tx_id, TransactionResolution::PayoutMatch { payout_id }).await?;
        info!("🏦️ Bank transaction {tx_id} matched to payout {payout_id} with {bank_costs} in bank costs");
        Ok(payout)
    }

    async fn fetch_unresolved(&self, tx_id: i64) -> Result<BankTransaction, PayoutGatewayError> {
        let tx = self
            .db
            .fetch_bank_transaction(tx_id)
            .await?
            .ok_or(PayoutGatewayError::TransactionNotFound(tx_id))?;
        if tx.status != TransactionIntegrityStatus::Unknown {
            return Err(PayoutGatewayError::TransactionAlreadyResolved(tx_id));
        }
        Ok(tx)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
