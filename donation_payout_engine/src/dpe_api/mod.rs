//! The public API of the donation payout engine.
//!
//! * [`PayoutFlowApi`] — donation, order and payout lifecycle flows.
//! * [`ReconciliationApi`] — bank statement import, the admin worklist and the two manual resolution
//!   commands.
//! * [`RollupApi`] — organization-level VAT roll-ups over settlement windows.
//! * [`ExportApi`] — JSON exports of payouts and donations.
mod export;
mod flow_objects;
mod payout_flow_api;
mod reconciliation_api;
mod rollup_api;

pub use export::{ExportApi, ExportError};
pub use flow_objects::{OrderChanged, ProjectTotals};
pub use payout_flow_api::PayoutFlowApi;
pub use reconciliation_api::ReconciliationApi;
pub use rollup_api::RollupApi;
