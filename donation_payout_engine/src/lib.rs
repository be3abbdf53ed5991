//! Donation Payout Engine
//!
//! The donation payout engine turns a stream of crowdfunding orders and donations into the amounts a
//! platform owes its projects and, ultimately, the roll-up it pays its parent organization. This library
//! contains the core logic for the engine. It is presentation-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). Currently, Sqlite is the supported backend. You should
//!    never need to access the database directly. Instead, use the public API provided by the engine. The
//!    exception is the data types used in the database. These are defined in the `db_types` module and are
//!    public.
//! 2. The engine public API ([`mod@dpe_api`]). This provides the public-facing functionality of the engine.
//!    It is responsible for managing projects, orders, donations, payouts and bank reconciliation. Specific
//!    backends need to implement the traits in the [`mod@traits`] module in order to act as a backend for
//!    the engine.
//!
//! Every flow in the API layer is an explicit, ordered sequence of steps. There is no event bus: when a
//! donation lands, the same function that stores it re-aggregates the project and brings its payout up to
//! date, in that order, every time.
mod db;

pub mod db_types;
pub mod helpers;
pub mod tenant;
pub mod traits;

mod dpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use dpe_api::{ExportApi, ExportError, OrderChanged, PayoutFlowApi, ProjectTotals, ReconciliationApi, RollupApi};
pub use traits::{DonationReporting, PayoutGatewayDatabase, PayoutGatewayError, ReportingError};
