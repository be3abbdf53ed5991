use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dpg_common::{CurrencyCode, Money};
use log::*;

use crate::{
    db_types::{
        Donation,
        NewDonation,
        NewOrder,
        NewProject,
        Order,
        OrderId,
        OrderStatus,
        PayoutStatus,
        Project,
        ProjectPayout,
        ProjectPhase,
    },
    dpe_api::flow_objects::{OrderChanged, ProjectTotals},
    helpers::{donation_total, Projection},
    tenant::TenantContext,
    traits::{PayoutGatewayDatabase, PayoutGatewayError},
};

/// `PayoutFlowApi` is the primary API for the donation and payout lifecycle: donations coming in, order
/// status changes, and payout creation, calculation, export and settlement.
///
/// Every state change runs its side effects as an explicit, ordered list of steps (persist, re-aggregate,
/// payout upkeep) rather than through signal dispatch, so the chain is visible here and nowhere else.
pub struct PayoutFlowApi<B> {
    db: B,
}

impl<B> Debug for PayoutFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutFlowApi")
    }
}

impl<B> PayoutFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> PayoutFlowApi<B>
where B: PayoutGatewayDatabase
{
    pub async fn create_project(&self, project: NewProject) -> Result<Project, PayoutGatewayError> {
        let project = self.db.insert_project(project).await?;
        debug!("💸️ Project '{}' created with id {}", project.slug, project.id);
        Ok(project)
    }

    /// Submit a new order. Idempotent: re-submitting an existing order id returns the stored order.
    pub async fn submit_order(&self, order: NewOrder) -> Result<Order, PayoutGatewayError> {
        let (order, created) = self.db.insert_order(order).await?;
        if created {
            debug!("💸️ Order {} created", order.order_id);
        } else {
            debug!("💸️ Order {} already existed, returning the stored record", order.order_id);
        }
        Ok(order)
    }

    /// Record a new donation against an existing order and project, then bring the project's aggregates
    /// and payouts up to date:
    ///
    /// 1. The donation is stored.
    /// 2. The project's `amount_donated` is recomputed from the Raised projection.
    /// 3. Payout upkeep runs (see [`Self::refresh_project`]).
    pub async fn process_new_donation(
        &self,
        donation: NewDonation,
        ctx: &TenantContext,
    ) -> Result<Donation, PayoutGatewayError> {
        let order = self
            .db
            .fetch_order_by_order_id(&donation.order_id)
            .await?
            .ok_or_else(|| PayoutGatewayError::OrderNotFound(donation.order_id.clone()))?;
        let project_id = donation.project_id;
        let donation = self.db.insert_donation(donation).await?;
        debug!(
            "💸️ Donation of {} recorded for project {project_id} under order {} ({})",
            donation.amount, order.order_id, order.status
        );
        self.refresh_project(project_id, ctx).await?;
        Ok(donation)
    }

    /// Changes the status of an order.
    ///
    /// The transition is validated against the order state machine first; an illegal change returns an
    /// error and nothing is touched. A legal change runs these steps, in order:
    ///
    /// 1. The new status is stored.
    /// 2. Every project with a donation under this order has its `amount_donated` recomputed.
    /// 3. Payout upkeep runs for each of those projects.
    ///
    /// ## Returns
    /// The old and new status, with the updated order.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
        ctx: &TenantContext,
    ) -> Result<OrderChanged, PayoutGatewayError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| PayoutGatewayError::OrderNotFound(order_id.clone()))?;
        let old_status = order.status;
        old_status.verify_transition(new_status)?;
        let order = self.db.update_order_status(order_id, new_status).await?;
        debug!("💸️ Order {order_id} moved from {old_status} to {new_status}");
        let projects = self.db.fetch_project_ids_for_order(order_id).await?;
        for project_id in projects {
            self.refresh_project(project_id, ctx).await?;
        }
        Ok(OrderChanged { order, old_status, new_status })
    }

    /// Move a project into one of the done phases. This is the transition that starts the payout process:
    /// after the phase is stored, payout upkeep runs and will create the project's first payout.
    pub async fn complete_project(
        &self,
        project_id: i64,
        phase: ProjectPhase,
        ctx: &TenantContext,
    ) -> Result<Project, PayoutGatewayError> {
        if !phase.is_done() {
            return Err(PayoutGatewayError::PhaseNotDone(phase));
        }
        let project = self.db.update_project_phase(project_id, phase).await?;
        info!("🧾️ Project '{}' reached {phase}. Starting payout upkeep.", project.slug);
        self.refresh_project(project_id, ctx).await?;
        let project =
            self.db.fetch_project(project_id).await?.ok_or(PayoutGatewayError::ProjectNotFound(project_id))?;
        Ok(project)
    }

    /// Re-aggregate a project and keep its payouts in step. The steps, in order:
    ///
    /// 1. Fetch the project's donations with their order statuses.
    /// 2. Recompute `amount_donated` (Raised projection) and persist it.
    /// 3. If the project is in a done phase:
    ///    * an open, unprotected payout is recalculated in place;
    ///    * an open, protected payout is left alone (money is moving; the new donations roll into the
    ///      next payout);
    ///    * with no open payout — first arrival in a done phase, or all prior payouts settled — a fresh
    ///      payout is created and calculated. A settled payout is never mutated.
    pub async fn refresh_project(&self, project_id: i64, ctx: &TenantContext) -> Result<(), PayoutGatewayError> {
        let project =
            self.db.fetch_project(project_id).await?.ok_or(PayoutGatewayError::ProjectNotFound(project_id))?;
        let donations = self.db.fetch_donations_for_project(project_id).await?;
        let currency = project.amount_asked.currency().clone();
        let raised = donation_total(&donations, Projection::Raised, currency.clone())?;
        self.db.save_project_amounts(project_id, &raised).await?;
        trace!("💸️ Project '{}' amount_donated refreshed to {raised}", project.slug);

        if !project.phase.is_done() {
            return Ok(());
        }
        let settled = self.settled_raised(project_id, currency.clone()).await?;
        match self.db.open_payout_for_project(project_id).await? {
            Some(mut payout) if !payout.protected() => {
                payout.calculate_amounts(&donations, &project.amount_asked, &settled, ctx)?;
                self.db.save_payout(&payout).await?;
                debug!(
                    "🧾️ Payout {} recalculated for project '{}': raised {}, rule {}, payable {}",
                    payout.id,
                    project.slug,
                    payout.amount_raised(),
                    payout.payout_rule(),
                    payout.amount_payable()
                );
            },
            Some(payout) => {
                debug!(
                    "🧾️ Payout {} for project '{}' is protected ({}); leaving it alone",
                    payout.id,
                    project.slug,
                    payout.status()
                );
            },
            None => {
                let mut payout = self.db.create_payout(project_id, currency).await?;
                payout.calculate_amounts(&donations, &project.amount_asked, &settled, ctx)?;
                self.db.save_payout(&payout).await?;
                info!(
                    "🧾️ New payout {} created for project '{}': raised {}, rule {}, payable {}",
                    payout.id,
                    project.slug,
                    payout.amount_raised(),
                    payout.payout_rule(),
                    payout.amount_payable()
                );
            },
        }
        Ok(())
    }

    /// The real-time donation projections for a project. These stay queryable whatever state the
    /// project's payouts are in; freezing a payout's amounts never freezes these views.
    pub async fn project_totals(&self, project_id: i64) -> Result<ProjectTotals, PayoutGatewayError> {
        let project =
            self.db.fetch_project(project_id).await?.ok_or(PayoutGatewayError::ProjectNotFound(project_id))?;
        let donations = self.db.fetch_donations_for_project(project_id).await?;
        let currency = project.amount_asked.currency().clone();
        Ok(ProjectTotals {
            raised: donation_total(&donations, Projection::Raised, currency.clone())?,
            safe: donation_total(&donations, Projection::Safe, currency.clone())?,
            pending: donation_total(&donations, Projection::Pending, currency.clone())?,
            failed: donation_total(&donations, Projection::Failed, currency)?,
        })
    }

    /// Recalculate a single payout on demand (the admin bulk action). Fails on protected payouts.
    pub async fn recalculate_payout(
        &self,
        payout_id: i64,
        ctx: &TenantContext,
    ) -> Result<ProjectPayout, PayoutGatewayError> {
        let mut payout =
            self.db.fetch_payout(payout_id).await?.ok_or(PayoutGatewayError::PayoutNotFound(payout_id))?;
        let project = self
            .db
            .fetch_project(payout.project_id)
            .await?
            .ok_or(PayoutGatewayError::ProjectNotFound(payout.project_id))?;
        let donations = self.db.fetch_donations_for_project(payout.project_id).await?;
        let currency = project.amount_asked.currency().clone();
        let settled = self.settled_raised(payout.project_id, currency).await?;
        payout.calculate_amounts(&donations, &project.amount_asked, &settled, ctx)?;
        self.db.save_payout(&payout).await?;
        Ok(payout)
    }

    /// The raised amount already covered by the project's settled payouts. Every fresh calculation
    /// subtracts this so a donation is paid out at most once.
    async fn settled_raised(&self, project_id: i64, currency: CurrencyCode) -> Result<Money, PayoutGatewayError> {
        let payouts = self.db.fetch_payouts_for_project(project_id).await?;
        let amounts =
            payouts.iter().filter(|p| p.status() == PayoutStatus::Settled).map(|p| p.amount_raised());
        Ok(Money::try_sum(amounts, currency)?)
    }

    /// Freeze a payout's amounts and hand it to the bank export. From here on the payout is protected.
    pub async fn begin_payout_export(&self, payout_id: i64) -> Result<ProjectPayout, PayoutGatewayError> {
        let mut payout =
            self.db.fetch_payout(payout_id).await?.ok_or(PayoutGatewayError::PayoutNotFound(payout_id))?;
        payout.begin_export()?;
        self.db.save_payout(&payout).await?;
        info!("🧾️ Payout {payout_id} exported; amounts are now frozen");
        Ok(payout)
    }

    /// The bank confirmed the transfer for a payout.
    pub async fn settle_payout(
        &self,
        payout_id: i64,
        completed: DateTime<Utc>,
    ) -> Result<ProjectPayout, PayoutGatewayError> {
        let mut payout =
            self.db.fetch_payout(payout_id).await?.ok_or(PayoutGatewayError::PayoutNotFound(payout_id))?;
        payout.settle(completed)?;
        self.db.save_payout(&payout).await?;
        info!("🧾️ Payout {payout_id} settled on {}", completed.date_naive());
        Ok(payout)
    }

    /// The bank bounced the transfer for a payout. The payable amount drops by the bank costs and the
    /// payout waits for re-export.
    pub async fn retry_payout(
        &self,
        payout_id: i64,
        bank_costs: &Money,
    ) -> Result<ProjectPayout, PayoutGatewayError> {
        let mut payout =
            self.db.fetch_payout(payout_id).await?.ok_or(PayoutGatewayError::PayoutNotFound(payout_id))?;
        payout.retry(bank_costs)?;
        self.db.save_payout(&payout).await?;
        info!("🧾️ Payout {payout_id} bounced. Payable adjusted to {} for re-export", payout.amount_payable());
        Ok(payout)
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
