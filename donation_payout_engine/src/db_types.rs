use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use dpg_common::{CurrencyCode, Money, MoneyError};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::{
    helpers::{donation_total, select_payout_rule, Projection},
    tenant::TenantContext,
};

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    ProjectPhase     ---------------------------------------------------------
/// The lifecycle phase of a project. Payouts are only created once a project reaches one of the done phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectPhase {
    Campaign,
    DoneComplete,
    DoneIncomplete,
    Closed,
}

impl ProjectPhase {
    pub fn is_done(&self) -> bool {
        matches!(self, ProjectPhase::DoneComplete | ProjectPhase::DoneIncomplete)
    }
}

impl Display for ProjectPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectPhase::Campaign => write!(f, "Campaign"),
            ProjectPhase::DoneComplete => write!(f, "DoneComplete"),
            ProjectPhase::DoneIncomplete => write!(f, "DoneIncomplete"),
            ProjectPhase::Closed => write!(f, "Closed"),
        }
    }
}

impl FromStr for ProjectPhase {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Campaign" => Ok(Self::Campaign),
            "DoneComplete" => Ok(Self::DoneComplete),
            "DoneIncomplete" => Ok(Self::DoneIncomplete),
            "Closed" => Ok(Self::Closed),
            s => Err(ConversionError(format!("Invalid project phase: {s}"))),
        }
    }
}

//--------------------------------------     OrderStatus     ---------------------------------------------------------
/// The state of a donation order. Only `Pending` and `Success` orders count towards payout totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been created but the donor has not started payment yet.
    Created,
    /// The donor has committed to the order and payment is underway.
    Locked,
    /// The payment service provider has accepted the payment but the funds have not cleared yet.
    Pending,
    /// The payment has cleared.
    Success,
    /// The payment failed at the payment service provider.
    Failed,
    /// A successful payment was returned to the donor.
    Refunded,
    /// The order was abandoned by the donor or cancelled by an admin.
    Cancelled,
    /// The donor pledged the amount out-of-band; no money flows through the platform.
    Pledged,
    /// The donor's bank reversed a successful payment.
    ChargedBack,
}

#[derive(Debug, Clone, Error)]
#[error("Illegal order status change from {from} to {to}")]
pub struct OrderTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Validates a status transition against the order state machine.
    ///
    /// | From \ To | Locked | Pending | Success | Failed | Refunded | Cancelled | Pledged | ChargedBack |
    /// |-----------|--------|---------|---------|--------|----------|-----------|---------|-------------|
    /// | Created   | ✓      |         |         |        |          | ✓         |         |             |
    /// | Locked    |        | ✓       | ✓       | ✓      |          | ✓         | ✓       |             |
    /// | Pending   |        |         | ✓       | ✓      |          | ✓         |         |             |
    /// | Success   |        |         |         |        | ✓        |           |         | ✓           |
    /// | Failed    |        | ✓       |         |        |          |           |         |             |
    /// | Pledged   |        |         | ✓       | ✓      |          |           |         |             |
    ///
    /// `Refunded`, `Cancelled` and `ChargedBack` are terminal. A transition to the current status is also an error.
    pub fn verify_transition(self, to: OrderStatus) -> Result<(), OrderTransitionError> {
        use OrderStatus::*;
        let allowed = match (self, to) {
            (Created, Locked | Cancelled) => true,
            (Locked, Pending | Success | Failed | Cancelled | Pledged) => true,
            (Pending, Success | Failed | Cancelled) => true,
            (Success, Refunded | ChargedBack) => true,
            (Failed, Pending) => true,
            (Pledged, Success | Failed) => true,
            (_, _) => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(OrderTransitionError { from: self, to })
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "Created"),
            OrderStatus::Locked => write!(f, "Locked"),
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Success => write!(f, "Success"),
            OrderStatus::Failed => write!(f, "Failed"),
            OrderStatus::Refunded => write!(f, "Refunded"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Pledged => write!(f, "Pledged"),
            OrderStatus::ChargedBack => write!(f, "ChargedBack"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Locked" => Ok(Self::Locked),
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            "Cancelled" => Ok(Self::Cancelled),
            "Pledged" => Ok(Self::Pledged),
            "ChargedBack" => Ok(Self::ChargedBack),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// The order was paid through the payment service provider.
    Gateway,
    /// The order was entered by an admin, typically while reconciling a bank transaction.
    Manual,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Gateway => write!(f, "Gateway"),
            PaymentMethod::Manual => write!(f, "Manual"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Gateway" => Ok(Self::Gateway),
            "Manual" => Ok(Self::Manual),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
/// The external identifier of an order, as assigned by the storefront or generated for manual orders.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The order_id as assigned by the storefront
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id, payment_method: PaymentMethod::Gateway }
    }

    pub fn manual(order_id: OrderId) -> Self {
        Self { order_id, payment_method: PaymentMethod::Manual }
    }
}

//--------------------------------------       Project       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub phase: ProjectPhase,
    /// The campaign target.
    pub amount_asked: Money,
    /// Derived: the Raised projection over the project's donations, refreshed whenever an order changes status.
    pub amount_donated: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub slug: String,
    pub title: String,
    pub amount_asked: Money,
}

impl NewProject {
    pub fn new<S: Into<String>>(slug: S, title: S, amount_asked: Money) -> Self {
        Self { slug: slug.into(), title: title.into(), amount_asked }
    }
}

//--------------------------------------      Donation       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Donation {
    pub id: i64,
    pub project_id: i64,
    /// Internal id of the parent order.
    pub order_id: i64,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub project_id: i64,
    /// External id of the parent order, which must already exist.
    pub order_id: OrderId,
    pub amount: Money,
}

impl NewDonation {
    pub fn new(project_id: i64, order_id: OrderId, amount: Money) -> Self {
        Self { project_id, order_id, amount }
    }
}

/// A donation amount paired with its parent order's status. This is the row shape the pure aggregation
/// functions consume, so the calculation logic carries no database dependency.
#[derive(Debug, Clone)]
pub struct DonationRecord {
    pub amount: Money,
    pub order_status: OrderStatus,
}

//--------------------------------------     PayoutRule      ---------------------------------------------------------
/// The fee tier applied to a payout, selected from the funding level at calculation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutRule {
    /// The amount raised is below the minimum payout threshold; nothing is paid out.
    BeneathThreshold,
    /// The project reached its target; the lower fee applies.
    FullyFunded,
    /// The project missed its target; the deployment's higher fee applies.
    NotFullyFunded,
}

impl Display for PayoutRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutRule::BeneathThreshold => write!(f, "BeneathThreshold"),
            PayoutRule::FullyFunded => write!(f, "FullyFunded"),
            PayoutRule::NotFullyFunded => write!(f, "NotFullyFunded"),
        }
    }
}

impl FromStr for PayoutRule {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BeneathThreshold" => Ok(Self::BeneathThreshold),
            "FullyFunded" => Ok(Self::FullyFunded),
            "NotFullyFunded" => Ok(Self::NotFullyFunded),
            s => Err(ConversionError(format!("Invalid payout rule: {s}"))),
        }
    }
}

//--------------------------------------     PayoutStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Freshly created; amounts may still be recalculated.
    New,
    /// Exported to the bank; the amounts are frozen.
    InProgress,
    /// The bank confirmed the transfer.
    Settled,
    /// The bank bounced the transfer; the payout needs re-export.
    Retry,
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::New => write!(f, "New"),
            PayoutStatus::InProgress => write!(f, "InProgress"),
            PayoutStatus::Settled => write!(f, "Settled"),
            PayoutStatus::Retry => write!(f, "Retry"),
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "InProgress" => Ok(Self::InProgress),
            "Settled" => Ok(Self::Settled),
            "Retry" => Ok(Self::Retry),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

//--------------------------------------     PayoutError     ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum PayoutError {
    #[error("Payout {0} is protected and its amounts cannot be recalculated")]
    Protected(i64),
    #[error("Illegal payout status change from {from} to {to}")]
    IllegalTransition { from: PayoutStatus, to: PayoutStatus },
    #[error("Bank costs of {costs} exceed the payable amount of {payable}")]
    CostsExceedPayable { costs: Money, payable: Money },
    #[error(transparent)]
    Money(#[from] MoneyError),
}

//--------------------------------------    ProjectPayout    ---------------------------------------------------------
/// The amount owed to a project after fees, derived from its donations.
///
/// The amount and status fields are private. They can only change through [`calculate_amounts`],
/// [`begin_export`], [`settle`] and [`retry`], so a payout that has been exported to the bank
/// (`protected == true`) can never be silently recalculated.
///
/// Invariants, maintained by `calculate_amounts`:
/// * `amount_raised` covers only donations not already covered by the project's settled payouts, so
///   money that has been paid out is never paid out again
/// * `organization_fee == amount_raised × fee_rate(payout_rule)` (rounded half-up to minor units)
/// * `amount_payable == amount_raised − organization_fee`
///
/// [`calculate_amounts`]: ProjectPayout::calculate_amounts
/// [`begin_export`]: ProjectPayout::begin_export
/// [`settle`]: ProjectPayout::settle
/// [`retry`]: ProjectPayout::retry
#[derive(Debug, Clone)]
pub struct ProjectPayout {
    pub id: i64,
    pub project_id: i64,
    status: PayoutStatus,
    protected: bool,
    payout_rule: PayoutRule,
    amount_raised: Money,
    organization_fee: Money,
    amount_payable: Money,
    /// When the bank confirmed the transfer. Only set while the payout is `Settled`.
    completed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectPayout {
    /// A fresh, zeroed payout for a project. The database assigns the real `id` on insert.
    pub fn new(project_id: i64, currency: CurrencyCode) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            project_id,
            status: PayoutStatus::New,
            protected: false,
            payout_rule: PayoutRule::NotFullyFunded,
            amount_raised: Money::zero(currency.clone()),
            organization_fee: Money::zero(currency.clone()),
            amount_payable: Money::zero(currency),
            completed: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a payout from storage. Only the database layer should call this.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        id: i64,
        project_id: i64,
        status: PayoutStatus,
        protected: bool,
        payout_rule: PayoutRule,
        amount_raised: Money,
        organization_fee: Money,
        amount_payable: Money,
        completed: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            status,
            protected,
            payout_rule,
            amount_raised,
            organization_fee,
            amount_payable,
            completed,
            created_at,
            updated_at,
        }
    }

    pub fn status(&self) -> PayoutStatus {
        self.status
    }

    pub fn protected(&self) -> bool {
        self.protected
    }

    pub fn payout_rule(&self) -> PayoutRule {
        self.payout_rule
    }

    pub fn amount_raised(&self) -> &Money {
        &self.amount_raised
    }

    pub fn organization_fee(&self) -> &Money {
        &self.organization_fee
    }

    pub fn amount_payable(&self) -> &Money {
        &self.amount_payable
    }

    pub fn completed(&self) -> Option<DateTime<Utc>> {
        self.completed
    }

    /// A payout is open until the bank has confirmed the transfer.
    pub fn is_open(&self) -> bool {
        self.status != PayoutStatus::Settled
    }

    /// Recompute `amount_raised`, the payout rule, the organization fee and the payable amount from the
    /// project's donations. The status is not changed, and nothing is persisted; callers save the payout
    /// afterwards.
    ///
    /// `already_settled` is the raised amount covered by the project's settled payouts. It is subtracted
    /// from the Raised projection so that this payout only carries donations no earlier payout has paid
    /// out. The payout rule is still selected from the project's full funding level.
    ///
    /// Fails with [`PayoutError::Protected`] without mutating anything when the payout has been exported.
    pub fn calculate_amounts(
        &mut self,
        donations: &[DonationRecord],
        amount_asked: &Money,
        already_settled: &Money,
        ctx: &TenantContext,
    ) -> Result<(), PayoutError> {
        if self.protected {
            return Err(PayoutError::Protected(self.id));
        }
        let currency = self.amount_raised.currency().clone();
        let total_raised = donation_total(donations, Projection::Raised, currency.clone())?;
        let rule = select_payout_rule(&total_raised, amount_asked, &ctx.minimum_payout_threshold)?;
        let mut raised = total_raised.try_sub(already_settled)?;
        // Reverted donations can drop the total beneath what was already paid out.
        if raised.is_negative() {
            raised = Money::zero(currency);
        }
        let fee = raised.apply_rate(ctx.fee_rate(rule))?;
        self.amount_payable = raised.try_sub(&fee)?;
        self.organization_fee = fee;
        self.amount_raised = raised;
        self.payout_rule = rule;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Freeze the amounts and hand the payout to the bank export. Valid from `New` and `Retry`.
    pub fn begin_export(&mut self) -> Result<(), PayoutError> {
        match self.status {
            PayoutStatus::New | PayoutStatus::Retry => {
                self.status = PayoutStatus::InProgress;
                self.protected = true;
                self.updated_at = Utc::now();
                Ok(())
            },
            from => Err(PayoutError::IllegalTransition { from, to: PayoutStatus::InProgress }),
        }
    }

    /// The bank confirmed the transfer. Valid from `InProgress` only.
    pub fn settle(&mut self, completed: DateTime<Utc>) -> Result<(), PayoutError> {
        match self.status {
            PayoutStatus::InProgress => {
                self.status = PayoutStatus::Settled;
                self.completed = Some(completed);
                self.updated_at = Utc::now();
                Ok(())
            },
            from => Err(PayoutError::IllegalTransition { from, to: PayoutStatus::Settled }),
        }
    }

    /// The bank bounced the transfer. The payable amount is reduced by the bank costs entered by the admin,
    /// and the payout must be re-exported via [`begin_export`]. The payout stays protected: money has moved,
    /// so a full recalculation remains forbidden.
    ///
    /// [`begin_export`]: ProjectPayout::begin_export
    pub fn retry(&mut self, bank_costs: &Money) -> Result<(), PayoutError> {
        match self.status {
            PayoutStatus::InProgress | PayoutStatus::Settled => {
                let adjusted = self.amount_payable.try_sub(bank_costs)?;
                if adjusted.is_negative() {
                    return Err(PayoutError::CostsExceedPayable {
                        costs: bank_costs.clone(),
                        payable: self.amount_payable.clone(),
                    });
                }
                self.amount_payable = adjusted;
                self.status = PayoutStatus::Retry;
                self.completed = None;
                self.updated_at = Utc::now();
                Ok(())
            },
            from => Err(PayoutError::IllegalTransition { from, to: PayoutStatus::Retry }),
        }
    }
}

//-------------------------------- TransactionIntegrityStatus ---------------------------------------------------------
/// Reconciliation state of an external bank record. `Unknown` transactions surface in the admin worklist;
/// `Valid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionIntegrityStatus {
    Unknown,
    Valid,
}

impl Display for TransactionIntegrityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionIntegrityStatus::Unknown => write!(f, "Unknown"),
            TransactionIntegrityStatus::Valid => write!(f, "Valid"),
        }
    }
}

impl FromStr for TransactionIntegrityStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unknown" => Ok(Self::Unknown),
            "Valid" => Ok(Self::Valid),
            s => Err(ConversionError(format!("Invalid integrity status: {s}"))),
        }
    }
}

//--------------------------------------   BankTransaction   ---------------------------------------------------------
/// An external bank statement line, imported for reconciliation against local donations and payouts.
#[derive(Debug, Clone)]
pub struct BankTransaction {
    pub id: i64,
    /// Import idempotency key over (book date, amount, description).
    pub fingerprint: String,
    pub amount: Money,
    pub book_date: NaiveDate,
    pub description: String,
    pub status: TransactionIntegrityStatus,
    /// Set when the transaction was matched to an existing payout.
    pub payout_id: Option<i64>,
    /// Set when the transaction was resolved by creating a manual donation.
    pub donation_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBankTransaction {
    pub amount: Money,
    pub book_date: NaiveDate,
    pub description: String,
}

impl NewBankTransaction {
    pub fn new(amount: Money, book_date: NaiveDate, description: String) -> Self {
        Self { amount, book_date, description }
    }

    pub fn fingerprint(&self) -> String {
        format!("{}|{}|{}", self.book_date, self.amount.minor_units(), self.description)
    }
}

//------------------------------------- OrganizationPayout ----------------------------------------------------------
/// The VAT roll-up of all project payouts settled within a date window. Unlike a [`ProjectPayout`] this is a
/// read-style aggregation, never protected, and can be recomputed at any time.
#[derive(Debug, Clone)]
pub struct OrganizationPayout {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub payable_amount_excl: Money,
    pub payable_amount_incl: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationPayout {
    /// Recompute the VAT split from the given payouts. Payouts outside the window, or not settled, are
    /// ignored, so callers can pass a broader set than strictly necessary.
    pub fn calculate_amounts(&mut self, payouts: &[ProjectPayout], ctx: &TenantContext) -> Result<(), PayoutError> {
        let currency = self.payable_amount_excl.currency().clone();
        let in_window = payouts
            .iter()
            .filter(|p| p.status() == PayoutStatus::Settled)
            .filter(|p| {
                p.completed()
                    .map(|c| c.date_naive() >= self.start_date && c.date_naive() <= self.end_date)
                    .unwrap_or(false)
            })
            .map(|p| p.amount_payable());
        let excl = in_window.fold(Ok(Money::zero(currency)), |acc: Result<Money, MoneyError>, amount| {
            acc.and_then(|total| total.try_add(amount))
        })?;
        self.payable_amount_incl = excl.try_add(&excl.apply_rate(ctx.vat_rate)?)?;
        self.payable_amount_excl = excl;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use dpg_common::Rate;

    use super::*;

    fn eur(minor: i64) -> Money {
        Money::from_minor_units(minor, CurrencyCode::default())
    }

    fn ctx() -> TenantContext {
        TenantContext::new("test", CurrencyCode::default())
    }

    fn record(minor: i64, status: OrderStatus) -> DonationRecord {
        DonationRecord { amount: eur(minor), order_status: status }
    }

    #[test]
    fn order_transitions() {
        use OrderStatus::*;
        assert!(Created.verify_transition(Locked).is_ok());
        assert!(Locked.verify_transition(Success).is_ok());
        assert!(Pending.verify_transition(Success).is_ok());
        assert!(Success.verify_transition(Refunded).is_ok());
        assert!(Success.verify_transition(ChargedBack).is_ok());
        assert!(Failed.verify_transition(Pending).is_ok());
        // Terminal states and self-transitions are rejected
        assert!(Refunded.verify_transition(Pending).is_err());
        assert!(Cancelled.verify_transition(Locked).is_err());
        assert!(ChargedBack.verify_transition(Success).is_err());
        assert!(Success.verify_transition(Success).is_err());
        assert!(Created.verify_transition(Success).is_err());
    }

    #[test]
    fn fixture_not_fully_funded_five_percent() {
        // amount_asked = 200.00, one successful donation of 75.00, not_fully_funded = 5%
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        let donations = vec![record(7500, OrderStatus::Success)];
        payout.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();
        assert_eq!(payout.payout_rule(), PayoutRule::NotFullyFunded);
        assert_eq!(payout.amount_raised(), &eur(7500));
        assert_eq!(payout.organization_fee(), &eur(375));
        assert_eq!(payout.amount_payable(), &eur(7125));
        assert_eq!(payout.status(), PayoutStatus::New);
    }

    #[test]
    fn fully_funded_fee_identity() {
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        let donations = vec![record(15_000, OrderStatus::Success), record(7500, OrderStatus::Pending)];
        payout.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();
        assert_eq!(payout.payout_rule(), PayoutRule::FullyFunded);
        let expected_fee = payout.amount_raised().apply_rate(ctx().fee_rate(PayoutRule::FullyFunded)).unwrap();
        assert_eq!(payout.organization_fee(), &expected_fee);
        assert_eq!(&payout.amount_raised().try_sub(&expected_fee).unwrap(), payout.amount_payable());
    }

    #[test]
    fn beneath_threshold_pays_nothing() {
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        // Default threshold is 20.00
        let donations = vec![record(1500, OrderStatus::Success)];
        payout.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();
        assert_eq!(payout.payout_rule(), PayoutRule::BeneathThreshold);
        assert_eq!(payout.amount_raised(), &eur(1500));
        assert_eq!(payout.amount_payable(), &eur(0));
        assert_eq!(payout.organization_fee(), &eur(1500));
    }

    #[test]
    fn protected_payout_refuses_recalculation() {
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        let donations = vec![record(7500, OrderStatus::Success)];
        payout.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();
        payout.begin_export().unwrap();
        assert!(payout.protected());

        let more = vec![record(7500, OrderStatus::Success), record(5000, OrderStatus::Success)];
        let err = payout.calculate_amounts(&more, &eur(20_000), &eur(0), &ctx()).unwrap_err();
        assert!(matches!(err, PayoutError::Protected(_)));
        // Nothing was mutated
        assert_eq!(payout.amount_raised(), &eur(7500));
        assert_eq!(payout.amount_payable(), &eur(7125));
    }

    #[test]
    fn second_payout_excludes_settled_donations() {
        let mut first = ProjectPayout::new(1, CurrencyCode::default());
        let donations = vec![record(7500, OrderStatus::Success)];
        first.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();
        first.begin_export().unwrap();
        first.settle(Utc::now()).unwrap();

        // A second 75.00 donation lands after settlement. The fresh payout carries only that donation;
        // the 75.00 the first payout already paid out does not count again.
        let donations = vec![record(7500, OrderStatus::Success), record(7500, OrderStatus::Success)];
        let mut second = ProjectPayout::new(1, CurrencyCode::default());
        second.calculate_amounts(&donations, &eur(20_000), first.amount_raised(), &ctx()).unwrap();
        assert_eq!(second.amount_raised(), &eur(7500));
        assert_eq!(second.organization_fee(), &eur(375));
        assert_eq!(second.amount_payable(), &eur(7125));
    }

    #[test]
    fn reverted_donations_never_drive_a_payout_negative() {
        // 75.00 was settled and paid out, then the donation was refunded. The next payout owes nothing,
        // not a negative amount.
        let donations = vec![record(7500, OrderStatus::Refunded)];
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        payout.calculate_amounts(&donations, &eur(20_000), &eur(7500), &ctx()).unwrap();
        assert!(payout.amount_raised().is_zero());
        assert!(payout.amount_payable().is_zero());
    }

    #[test]
    fn unknown_status_strings_are_rejected() {
        assert!("Sideways".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
        assert!("Running".parse::<ProjectPhase>().is_err());
        assert!("Done".parse::<PayoutStatus>().is_err());
    }

    #[test]
    fn payout_lifecycle() {
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        let donations = vec![record(7500, OrderStatus::Success)];
        payout.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();

        // settle before export is illegal
        assert!(payout.settle(Utc::now()).is_err());

        payout.begin_export().unwrap();
        assert_eq!(payout.status(), PayoutStatus::InProgress);
        // double export is illegal
        assert!(payout.begin_export().is_err());

        payout.settle(Utc::now()).unwrap();
        assert_eq!(payout.status(), PayoutStatus::Settled);
        assert!(payout.completed().is_some());
        assert!(!payout.is_open());

        // the bank bounces the transfer with 1.50 in costs
        payout.retry(&eur(150)).unwrap();
        assert_eq!(payout.status(), PayoutStatus::Retry);
        assert_eq!(payout.amount_payable(), &eur(6975));
        assert!(payout.completed().is_none());
        assert!(payout.protected());

        payout.begin_export().unwrap();
        payout.settle(Utc::now()).unwrap();
    }

    #[test]
    fn retry_rejects_excessive_costs() {
        let mut payout = ProjectPayout::new(1, CurrencyCode::default());
        let donations = vec![record(7500, OrderStatus::Success)];
        payout.calculate_amounts(&donations, &eur(20_000), &eur(0), &ctx()).unwrap();
        payout.begin_export().unwrap();
        let err = payout.retry(&eur(10_000)).unwrap_err();
        assert!(matches!(err, PayoutError::CostsExceedPayable { .. }));
        assert_eq!(payout.status(), PayoutStatus::InProgress);
    }

    #[test]
    fn organization_rollup_windows_and_vat() {
        let mut ctx = ctx();
        ctx.vat_rate = Rate::from_percent(21);
        let cur = CurrencyCode::default();
        let jan = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap();

        let mut settled_in_window = ProjectPayout::new(1, cur.clone());
        settled_in_window
            .calculate_amounts(&[record(10_000, OrderStatus::Success)], &eur(10_000), &eur(0), &ctx)
            .unwrap();
        settled_in_window.begin_export().unwrap();
        settled_in_window.settle(jan).unwrap();

        let mut settled_outside = settled_in_window.clone();
        settled_outside.retry(&eur(0)).unwrap();
        settled_outside.begin_export().unwrap();
        settled_outside.settle(feb).unwrap();

        let open = ProjectPayout::new(2, cur.clone());

        let mut org = OrganizationPayout {
            id: 1,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            payable_amount_excl: Money::zero(cur.clone()),
            payable_amount_incl: Money::zero(cur),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        org.calculate_amounts(&[settled_in_window.clone(), settled_outside, open], &ctx).unwrap();
        // FullyFunded at 5%: payable is 95.00; only the January settlement counts
        assert_eq!(org.payable_amount_excl, eur(9500));
        assert_eq!(org.payable_amount_incl, eur(11_495));
    }
}
