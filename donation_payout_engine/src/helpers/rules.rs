use std::cmp::Ordering;

use dpg_common::{Money, MoneyError};

use crate::db_types::PayoutRule;

/// Select the fee tier for a payout from the current aggregates. Pure; no side effects.
///
/// * below the minimum payout threshold → `BeneathThreshold` (the 100% fee rate forces the payable
///   amount to zero)
/// * at or above the campaign target → `FullyFunded`
/// * otherwise → `NotFullyFunded`
pub fn select_payout_rule(
    amount_raised: &Money,
    amount_asked: &Money,
    minimum_payout_threshold: &Money,
) -> Result<PayoutRule, MoneyError> {
    if amount_raised.try_cmp(minimum_payout_threshold)? == Ordering::Less {
        return Ok(PayoutRule::BeneathThreshold);
    }
    let rule = match amount_raised.try_cmp(amount_asked)? {
        Ordering::Less => PayoutRule::NotFullyFunded,
        Ordering::Equal | Ordering::Greater => PayoutRule::FullyFunded,
    };
    Ok(rule)
}

#[cfg(test)]
mod test {
    use dpg_common::CurrencyCode;

    use super::*;

    fn eur(minor: i64) -> Money {
        Money::from_minor_units(minor, CurrencyCode::default())
    }

    #[test]
    fn tier_selection() {
        let asked = eur(20_000);
        let threshold = eur(2000);
        assert_eq!(select_payout_rule(&eur(1999), &asked, &threshold).unwrap(), PayoutRule::BeneathThreshold);
        assert_eq!(select_payout_rule(&eur(2000), &asked, &threshold).unwrap(), PayoutRule::NotFullyFunded);
        assert_eq!(select_payout_rule(&eur(7500), &asked, &threshold).unwrap(), PayoutRule::NotFullyFunded);
        assert_eq!(select_payout_rule(&eur(20_000), &asked, &threshold).unwrap(), PayoutRule::FullyFunded);
        assert_eq!(select_payout_rule(&eur(25_000), &asked, &threshold).unwrap(), PayoutRule::FullyFunded);
    }

    #[test]
    fn threshold_wins_over_target() {
        // A tiny campaign that reached its target but not the payout threshold still pays nothing
        let asked = eur(1000);
        let threshold = eur(2000);
        assert_eq!(select_payout_rule(&eur(1500), &asked, &threshold).unwrap(), PayoutRule::BeneathThreshold);
    }

    #[test]
    fn currency_mismatch_is_an_error() {
        let usd = Money::from_minor_units(100, "USD".parse().unwrap());
        assert!(select_payout_rule(&eur(100), &usd, &eur(0)).is_err());
    }
}
