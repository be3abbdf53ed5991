use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::{op, Rate};

pub const DEFAULT_CURRENCY_CODE: &str = "EUR";

//--------------------------------------     MinorUnits      ---------------------------------------------------------
/// An amount in the minor units of some currency (cents, pence, etc.). This is the raw integer type that gets
/// persisted; almost all code should work with [`Money`], which carries the currency alongside the amount.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Mul<i64> for MinorUnits {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MinorUnits {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MinorUnits {}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Decimal::new(self.0, 2))
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

//--------------------------------------    CurrencyCode     ---------------------------------------------------------
/// An ISO-4217 style three-letter currency code, e.g. "EUR" or "USD".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct CurrencyCode(String);

#[derive(Debug, Clone, Error)]
#[error("Invalid currency code: {0}")]
pub struct CurrencyCodeError(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self(DEFAULT_CURRENCY_CODE.to_string())
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError(s.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Money        ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum MoneyError {
    #[error("Cannot combine amounts in {left} with amounts in {right}")]
    CurrencyMismatch { left: CurrencyCode, right: CurrencyCode },
    #[error("Amount overflows the minor-unit range: {0}")]
    Overflow(String),
    #[error("Cannot parse '{0}' as a monetary amount")]
    ParseError(String),
}

/// An amount of money in a specific currency, stored in minor units (2 decimal places).
///
/// Arithmetic between two `Money` values is only defined when the currencies agree; the `try_*` methods return a
/// [`MoneyError::CurrencyMismatch`] otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MinorUnits,
    currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: MinorUnits, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    pub fn from_minor_units(amount: i64, currency: CurrencyCode) -> Self {
        Self { amount: MinorUnits::from(amount), currency }
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self { amount: MinorUnits::default(), currency }
    }

    /// Parse an amount expressed in major units, e.g. "75.00", rounding half-up to minor units.
    pub fn parse_major(s: &str, currency: CurrencyCode) -> Result<Self, MoneyError> {
        let major = Decimal::from_str(s.trim()).map_err(|_| MoneyError::ParseError(s.to_string()))?;
        let minor = (major * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| MoneyError::Overflow(s.to_string()))?;
        Ok(Self::from_minor_units(minor, currency))
    }

    pub fn amount(&self) -> MinorUnits {
        self.amount
    }

    pub fn minor_units(&self) -> i64 {
        self.amount.value()
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_negative()
    }

    fn check_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch { left: self.currency.clone(), right: other.currency.clone() })
        }
    }

    pub fn try_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.check_currency(other)?;
        let total = self
            .amount
            .value()
            .checked_add(other.amount.value())
            .ok_or_else(|| MoneyError::Overflow(format!("{self} + {other}")))?;
        Ok(Money::from_minor_units(total, self.currency.clone()))
    }

    pub fn try_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.check_currency(other)?;
        let total = self
            .amount
            .value()
            .checked_sub(other.amount.value())
            .ok_or_else(|| MoneyError::Overflow(format!("{self} - {other}")))?;
        Ok(Money::from_minor_units(total, self.currency.clone()))
    }

    /// Sum an iterator of amounts into the given currency. An empty iterator sums to zero.
    /// Returns an error as soon as an amount in a different currency is encountered.
    pub fn try_sum<'a, I>(amounts: I, currency: CurrencyCode) -> Result<Money, MoneyError>
    where I: IntoIterator<Item = &'a Money> {
        amounts.into_iter().try_fold(Money::zero(currency), |acc, m| acc.try_add(m))
    }

    /// Apply a percentage rate to this amount, rounding half-up to minor units.
    /// `€75.00 × 5% = €3.75`.
    pub fn apply_rate(&self, rate: Rate) -> Result<Money, MoneyError> {
        let scaled = Decimal::from(self.amount.value()) * rate.as_fraction();
        let minor = scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| MoneyError::Overflow(format!("{self} x {rate}")))?;
        Ok(Money::from_minor_units(minor, self.currency.clone()))
    }

    /// Compare amounts, failing when the currencies differ.
    pub fn try_cmp(&self, other: &Money) -> Result<std::cmp::Ordering, MoneyError> {
        self.check_currency(other)?;
        Ok(self.amount.value().cmp(&other.amount.value()))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
