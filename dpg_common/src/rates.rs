use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------        Rate        ----------------------------------------------------------
/// A percentage rate, used for organization fees and VAT.
///
/// The inner value is the rate in percent, so `Rate::from_percent(5)` is 5%, not 500%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rate(Decimal);

#[derive(Debug, Clone, Error)]
#[error("Invalid rate: {0}")]
pub struct RateError(String);

impl Rate {
    pub fn from_percent(percent: i64) -> Self {
        Self(Decimal::from(percent))
    }

    pub fn from_decimal_percent(percent: Decimal) -> Self {
        Self(percent)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// The rate as a fraction, i.e. 5% => 0.05
    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for Rate {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let percent =
            Decimal::from_str(s.trim().trim_end_matches('%')).map_err(|e| RateError(format!("{s}: {e}")))?;
        if percent.is_sign_negative() {
            return Err(RateError(format!("{s}: rates cannot be negative")));
        }
        Ok(Self(percent))
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_rates() {
        assert_eq!("5".parse::<Rate>().unwrap(), Rate::from_percent(5));
        assert_eq!("6.75%".parse::<Rate>().unwrap().percent(), Decimal::new(675, 2));
        assert_eq!(" 21 ".parse::<Rate>().unwrap(), Rate::from_percent(21));
        assert!("-5".parse::<Rate>().is_err());
        assert!("lots".parse::<Rate>().is_err());
    }

    #[test]
    fn fractions() {
        assert_eq!(Rate::from_percent(5).as_fraction(), Decimal::new(5, 2));
        assert_eq!(format!("{}", Rate::from_percent(21)), "21%");
    }
}
