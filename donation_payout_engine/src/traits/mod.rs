//! Database backend contracts for the donation payout engine.
//!
//! The engine never touches a database driver directly. Backends expose two trait surfaces:
//!
//! * [`PayoutGatewayDatabase`] defines the state-changing flows: projects, orders, donations, payout
//!   persistence and bank-transaction resolution. The API layer composes these into the explicit,
//!   ordered side-effect chains the platform needs (recompute aggregates, payout upkeep, and so on).
//! * [`DonationReporting`] provides the read side: donation projections for dashboards, payout history,
//!   settlement windows and the reconciliation worklist.
//!
//! All monetary calculation stays out of the backends; they shuttle rows in and out while the pure
//! functions in [`crate::helpers`] and the guarded operations on [`crate::db_types::ProjectPayout`] do
//! the arithmetic.
mod data_objects;
mod donation_reporting;
mod payout_gateway_database;

pub use data_objects::{ImportResult, MatchCandidate, SettlementWindow, TransactionResolution};
pub use donation_reporting::{DonationReporting, ReportingError};
pub use payout_gateway_database::{PayoutGatewayDatabase, PayoutGatewayError};
