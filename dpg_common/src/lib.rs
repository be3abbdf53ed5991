mod money;
mod rates;

pub mod op;

pub use money::{CurrencyCode, CurrencyCodeError, MinorUnits, Money, MoneyError, DEFAULT_CURRENCY_CODE};
pub use rates::{Rate, RateError};
