use dpg_common::{CurrencyCode, Money, MoneyError};

use crate::db_types::{DonationRecord, OrderStatus};

/// The four non-overlapping views over a project's donation set, keyed on the parent order's status.
///
/// `Raised` drives payout calculation; the other three exist for reporting. `Created`, `Locked` and
/// `Pledged` orders count towards none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Money that has cleared or is clearing: `Pending` + `Success`. This is "amount raised".
    Raised,
    /// Money that has cleared: `Success` only.
    Safe,
    /// Money still clearing at the payment service provider.
    Pending,
    /// Money that reverted: failed, refunded, cancelled or charged back.
    Failed,
}

impl Projection {
    pub fn counts(&self, status: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Projection::Raised => matches!(status, Pending | Success),
            Projection::Safe => matches!(status, Success),
            Projection::Pending => matches!(status, Pending),
            Projection::Failed => matches!(status, Failed | Refunded | Cancelled | ChargedBack),
        }
    }
}

/// Sum the donations that fall in the given projection. The currency anchors the empty sum and guards
/// against donations recorded in a different currency sneaking into a total.
pub fn donation_total<'a, I>(
    donations: I,
    projection: Projection,
    currency: CurrencyCode,
) -> Result<Money, MoneyError>
where
    I: IntoIterator<Item = &'a DonationRecord>,
{
    let amounts = donations.into_iter().filter(|d| projection.counts(d.order_status)).map(|d| &d.amount);
    Money::try_sum(amounts, currency)
}

#[cfg(test)]
mod test {
    use super::*;

    fn eur(minor: i64) -> Money {
        Money::from_minor_units(minor, CurrencyCode::default())
    }

    fn record(minor: i64, status: OrderStatus) -> DonationRecord {
        DonationRecord { amount: eur(minor), order_status: status }
    }

    fn total(donations: &[DonationRecord], projection: Projection) -> Money {
        donation_total(donations, projection, CurrencyCode::default()).unwrap()
    }

    #[test]
    fn projections_partition_the_donation_set() {
        let donations = vec![
            record(7500, OrderStatus::Success),
            record(2500, OrderStatus::Pending),
            record(1000, OrderStatus::Pending),
            record(9999, OrderStatus::Created),
            record(1234, OrderStatus::Pledged),
        ];
        let raised = total(&donations, Projection::Raised);
        let safe = total(&donations, Projection::Safe);
        let pending = total(&donations, Projection::Pending);
        assert_eq!(raised, eur(11_000));
        assert_eq!(safe, eur(7500));
        assert_eq!(pending, eur(3500));
        // Raised = Pending + Safe when nothing has reverted
        assert_eq!(pending.try_add(&safe).unwrap(), raised);
        assert_eq!(total(&donations, Projection::Failed), eur(0));
    }

    #[test]
    fn reverted_orders_count_as_failed_only() {
        let donations = vec![
            record(7500, OrderStatus::Success),
            record(5000, OrderStatus::Refunded),
            record(2000, OrderStatus::ChargedBack),
            record(1000, OrderStatus::Failed),
            record(500, OrderStatus::Cancelled),
        ];
        assert_eq!(total(&donations, Projection::Raised), eur(7500));
        assert_eq!(total(&donations, Projection::Failed), eur(8500));
    }

    #[test]
    fn empty_set_sums_to_zero() {
        assert_eq!(total(&[], Projection::Raised), eur(0));
    }

    #[test]
    fn mixed_currencies_are_rejected() {
        let donations = vec![
            record(7500, OrderStatus::Success),
            DonationRecord { amount: Money::from_minor_units(100, "USD".parse().unwrap()), order_status: OrderStatus::Success },
        ];
        assert!(donation_total(&donations, Projection::Raised, CurrencyCode::default()).is_err());
    }
}
