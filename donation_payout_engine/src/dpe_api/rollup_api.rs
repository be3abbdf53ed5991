use std::fmt::Debug;

use log::*;

use crate::{
    db_types::OrganizationPayout,
    tenant::TenantContext,
    traits::{PayoutGatewayDatabase, PayoutGatewayError, SettlementWindow},
};

/// `RollupApi` produces the organization-level VAT roll-up: the sum of all project payouts settled within
/// a date window, split into VAT-exclusive and VAT-inclusive figures.
///
/// Unlike project payouts, a roll-up is a read-style aggregation and can be recomputed at any time.
pub struct RollupApi<B> {
    db: B,
}

impl<B> Debug for RollupApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RollupApi")
    }
}

impl<B> RollupApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> RollupApi<B>
where B: PayoutGatewayDatabase
{
    /// Create an organization payout for the window and compute its amounts.
    pub async fn create_for_window(
        &self,
        window: SettlementWindow,
        ctx: &TenantContext,
    ) -> Result<OrganizationPayout, PayoutGatewayError> {
        let payout = self.db.create_organization_payout(&window, ctx.currency.clone()).await?;
        let payout = self.recalculate(payout.id, ctx).await?;
        info!(
            "🗂️ Organization payout {} created for {} .. {}: {} excl / {} incl",
            payout.id, window.start_date, window.end_date, payout.payable_amount_excl, payout.payable_amount_incl
        );
        Ok(payout)
    }

    /// Recompute the VAT split from the currently settled project payouts in the window.
    pub async fn recalculate(
        &self,
        organization_payout_id: i64,
        ctx: &TenantContext,
    ) -> Result<OrganizationPayout, PayoutGatewayError> {
        let mut payout = self
            .db
            .fetch_organization_payout(organization_payout_id)
            .await?
            .ok_or(PayoutGatewayError::OrganizationPayoutNotFound(organization_payout_id))?;
        let window = SettlementWindow::new(payout.start_date, payout.end_date);
        let settled = self.db.fetch_settled_payouts_between(&window).await?;
        payout.calculate_amounts(&settled, ctx)?;
        self.db.save_organization_payout(&payout).await?;
        debug!(
            "🗂️ Organization payout {} recalculated over {} settled payout(s): {} excl / {} incl",
            payout.id,
            settled.len(),
            payout.payable_amount_excl,
            payout.payable_amount_incl
        );
        Ok(payout)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
