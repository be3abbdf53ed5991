use chrono::{DateTime, Utc};
use dpg_common::Money;
use serde::Serialize;
use thiserror::Error;

use crate::{
    db_types::ProjectPayout,
    traits::{DonationReporting, ReportingError},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    Reporting(#[from] ReportingError),
    #[error("Could not serialize export: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutExportRow {
    pub payout_id: i64,
    pub project_id: i64,
    pub status: String,
    pub payout_rule: String,
    pub amount_raised: Money,
    pub organization_fee: Money,
    pub amount_payable: Money,
    pub completed: Option<DateTime<Utc>>,
}

impl From<&ProjectPayout> for PayoutExportRow {
    fn from(p: &ProjectPayout) -> Self {
        Self {
            payout_id: p.id,
            project_id: p.project_id,
            status: p.status().to_string(),
            payout_rule: p.payout_rule().to_string(),
            amount_raised: p.amount_raised().clone(),
            organization_fee: p.organization_fee().clone(),
            amount_payable: p.amount_payable().clone(),
            completed: p.completed(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationExportRow {
    pub amount: Money,
    pub order_status: String,
}

/// JSON exports of payouts and donations, the engine-side half of the platform's export commands.
pub struct ExportApi<B> {
    db: B,
}

impl<B> ExportApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ExportApi<B>
where B: DonationReporting
{
    pub async fn export_payouts_for_project(&self, project_id: i64) -> Result<String, ExportError> {
        let payouts = self.db.fetch_payouts_for_project(project_id).await?;
        let rows: Vec<PayoutExportRow> = payouts.iter().map(PayoutExportRow::from).collect();
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    pub async fn export_donations_for_project(&self, project_id: i64) -> Result<String, ExportError> {
        let donations = self.db.fetch_donations_for_project(project_id).await?;
        let rows: Vec<DonationExportRow> = donations
            .into_iter()
            .map(|d| DonationExportRow { amount: d.amount, order_status: d.order_status.to_string() })
            .collect();
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}
