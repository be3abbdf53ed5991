use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db_types::ProjectPayout;

/// An inclusive date window over payout settlement (`completed`) dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl SettlementWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// How an admin resolved a bank transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionResolution {
    /// A manual donation was created for the transaction amount.
    ManualDonation { donation_id: i64 },
    /// The transaction was matched to an existing payout (the bounce/retry path).
    PayoutMatch { payout_id: i64 },
}

/// The outcome of a bank statement import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported: usize,
    /// Statement lines that were already present, keyed on their fingerprint.
    pub duplicates: usize,
}

/// A payout offered to the operator as a possible match for an unresolved bank transaction. The hint is
/// amount equality; `days_apart` lets the worklist sort candidates by date proximity.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub payout: ProjectPayout,
    pub days_apart: i64,
}
