mod aggregation;
mod rules;

pub use aggregation::{donation_total, Projection};
pub use rules::select_payout_rule;
