//! Per-tenant configuration for the financial calculations.
//!
//! Every deployment (tenant) runs the same engine with its own fee percentages, VAT rate, currency and
//! minimum payout threshold. The context is passed explicitly into every computation rather than living in
//! ambient state, so the calculation code stays pure and testable.

use std::env;

use dpg_common::{CurrencyCode, Money, Rate};
use log::*;

use crate::db_types::PayoutRule;

const DEFAULT_MINIMUM_PAYOUT_THRESHOLD: &str = "20.00";
const DEFAULT_FEE_PERCENT: i64 = 5;
const DEFAULT_VAT_PERCENT: i64 = 21;

/// The fee percentage per payout rule.
///
/// `BeneathThreshold` is pinned at 100% so that the generic fee formula yields a zero payable amount
/// without a special case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeTable {
    fully_funded: Rate,
    not_fully_funded: Rate,
}

impl Default for FeeTable {
    fn default() -> Self {
        Self {
            fully_funded: Rate::from_percent(DEFAULT_FEE_PERCENT),
            not_fully_funded: Rate::from_percent(DEFAULT_FEE_PERCENT),
        }
    }
}

impl FeeTable {
    pub fn new(fully_funded: Rate, not_fully_funded: Rate) -> Self {
        Self { fully_funded, not_fully_funded }
    }

    pub fn rate(&self, rule: PayoutRule) -> Rate {
        match rule {
            PayoutRule::BeneathThreshold => Rate::from_percent(100),
            PayoutRule::FullyFunded => self.fully_funded,
            PayoutRule::NotFullyFunded => self.not_fully_funded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    pub currency: CurrencyCode,
    /// Projects that raise less than this amount pay out nothing.
    pub minimum_payout_threshold: Money,
    pub fee_table: FeeTable,
    pub vat_rate: Rate,
}

impl TenantContext {
    pub fn new<S: Into<String>>(tenant_id: S, currency: CurrencyCode) -> Self {
        let threshold = Money::parse_major(DEFAULT_MINIMUM_PAYOUT_THRESHOLD, currency.clone())
            .unwrap_or_else(|_| Money::zero(currency.clone()));
        Self {
            tenant_id: tenant_id.into(),
            currency,
            minimum_payout_threshold: threshold,
            fee_table: FeeTable::default(),
            vat_rate: Rate::from_percent(DEFAULT_VAT_PERCENT),
        }
    }

    /// Build a tenant context from environment variables, falling back to documented defaults with a logged
    /// message for any value that is missing or fails to parse.
    ///
    /// * `DPG_CURRENCY` — three-letter currency code. Default: EUR.
    /// * `DPG_MINIMUM_PAYOUT_THRESHOLD` — in major units, e.g. "20.00".
    /// * `DPG_FEE_FULLY_FUNDED`, `DPG_FEE_NOT_FULLY_FUNDED` — fee percentages, e.g. "5" or "6.75".
    /// * `DPG_VAT_RATE` — VAT percentage. Default: 21.
    pub fn from_env_or_default(tenant_id: &str) -> Self {
        let currency = env::var("DPG_CURRENCY")
            .ok()
            .map(|s| {
                s.parse::<CurrencyCode>().unwrap_or_else(|e| {
                    error!("🪛️ {e}. Using the default, {DEFAULT_CURRENCY}, instead.", DEFAULT_CURRENCY = CurrencyCode::default());
                    CurrencyCode::default()
                })
            })
            .unwrap_or_default();
        let mut ctx = Self::new(tenant_id, currency.clone());
        if let Ok(s) = env::var("DPG_MINIMUM_PAYOUT_THRESHOLD") {
            match Money::parse_major(&s, currency) {
                Ok(threshold) => ctx.minimum_payout_threshold = threshold,
                Err(e) => error!(
                    "🪛️ {s} is not a valid value for DPG_MINIMUM_PAYOUT_THRESHOLD. {e} Using {}.",
                    ctx.minimum_payout_threshold
                ),
            }
        }
        let fully_funded = parse_rate_var("DPG_FEE_FULLY_FUNDED", DEFAULT_FEE_PERCENT);
        let not_fully_funded = parse_rate_var("DPG_FEE_NOT_FULLY_FUNDED", DEFAULT_FEE_PERCENT);
        ctx.fee_table = FeeTable::new(fully_funded, not_fully_funded);
        ctx.vat_rate = parse_rate_var("DPG_VAT_RATE", DEFAULT_VAT_PERCENT);
        debug!(
            "🪛️ Tenant context for '{tenant_id}': currency {}, threshold {}, fees {}/{}, VAT {}",
            ctx.currency, ctx.minimum_payout_threshold, fully_funded, not_fully_funded, ctx.vat_rate
        );
        ctx
    }

    pub fn fee_rate(&self, rule: PayoutRule) -> Rate {
        self.fee_table.rate(rule)
    }
}

fn parse_rate_var(var: &str, default_percent: i64) -> Rate {
    match env::var(var) {
        Ok(s) => s.parse::<Rate>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default_percent}%, instead.");
            Rate::from_percent(default_percent)
        }),
        Err(_) => Rate::from_percent(default_percent),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let ctx = TenantContext::new("demo", CurrencyCode::default());
        assert_eq!(ctx.minimum_payout_threshold, Money::from_minor_units(2000, CurrencyCode::default()));
        assert_eq!(ctx.fee_rate(PayoutRule::FullyFunded), Rate::from_percent(5));
        assert_eq!(ctx.fee_rate(PayoutRule::BeneathThreshold), Rate::from_percent(100));
        assert_eq!(ctx.vat_rate, Rate::from_percent(21));
    }

    #[test]
    fn custom_fee_table() {
        let table = FeeTable::new(Rate::from_percent(5), Rate::from_percent(12));
        assert_eq!(table.rate(PayoutRule::NotFullyFunded), Rate::from_percent(12));
        assert_eq!(table.rate(PayoutRule::BeneathThreshold), Rate::from_percent(100));
    }
}
