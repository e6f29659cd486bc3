use super::money::Amount;
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MILLIS_PER_MINUTE: Decimal = dec!(60000);

/// Pricing of a rental: a flat start fee plus linear per-minute accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tariff {
    pub base_fee: Amount,
    /// Charge per elapsed minute, on top of the base fee. Uncapped.
    pub accrual_rate: Decimal,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            base_fee: Amount::new(dec!(10.00)),
            accrual_rate: dec!(1.50),
        }
    }
}

impl Tariff {
    pub fn new(base_fee: Amount, accrual_rate: Decimal) -> Self {
        Self {
            base_fee,
            accrual_rate,
        }
    }

    /// Amount owed at `at` for a fee of `base` on a rental started at
    /// `rented_at`: `base + minutes * rate`, rounded to currency scale.
    ///
    /// Fails with [`RentalError::AmountOverflow`] when the result does not fit
    /// in a `Decimal`.
    pub fn accrued(
        &self,
        base: Amount,
        rented_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Amount> {
        elapsed_minutes(rented_at, at)
            .checked_mul(self.accrual_rate)
            .and_then(|extra| base.checked_add(extra))
            .map(Amount::rounded)
            .ok_or_else(|| {
                RentalError::AmountOverflow(format!(
                    "{base} at {} per minute from {rented_at} to {at}",
                    self.accrual_rate
                ))
            })
    }
}

/// Fractional minutes from `from` to `to`, clamped to zero if the clock went
/// backwards.
pub fn elapsed_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(millis) / MILLIS_PER_MINUTE
}
