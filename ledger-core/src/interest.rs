//! Interest rate math
//!
//! Annual rates are percentages (5.0 means 5% per year). Daily accruals use
//! `balance * rate / 100 / 365` and are stored at 4 decimal places; credited
//! monthly totals are rounded to monetary precision (2 decimal places).

use rust_decimal::{Decimal, RoundingStrategy};

/// Days used to derive the daily rate from the annual rate
const DAYS_PER_YEAR: u32 = 365;

/// Days used for the projected-monthly-interest figure
const DAYS_PER_MONTH: u32 = 30;

/// Scale of stored daily accrual amounts
const ACCRUAL_SCALE: u32 = 4;

/// Scale of credited balances and transaction amounts
const MONEY_SCALE: u32 = 2;

/// Interest accrued by one day at the given annual rate.
///
/// `daily_amount(1000.00, 5.0)` = 1000.00 * 0.05 / 365 = 0.1370.
pub fn daily_amount(balance: Decimal, annual_rate_percent: Decimal) -> Decimal {
    let daily_rate = annual_rate_percent / Decimal::ONE_HUNDRED / Decimal::from(DAYS_PER_YEAR);
    (balance * daily_rate)
        .round_dp_with_strategy(ACCRUAL_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a summed credit total to monetary precision before it touches a
/// balance.
pub fn round_credit(total: Decimal) -> Decimal {
    total.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Projected interest over a 30-day month at the current balance and rate.
/// Informational only (account summaries); the crediting engine sums real
/// accrual entries instead.
pub fn projected_monthly(balance: Decimal, annual_rate_percent: Decimal) -> Decimal {
    daily_amount(balance, annual_rate_percent) * Decimal::from(DAYS_PER_MONTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_amount_reference_figure() {
        // 1000.00 at 5.0% annual: 1000 * 0.05 / 365 = 0.136986... -> 0.1370
        let amount = daily_amount(Decimal::new(100000, 2), Decimal::new(50, 1));
        assert_eq!(amount, Decimal::new(1370, 4));
    }

    #[test]
    fn test_daily_amount_zero_balance() {
        assert_eq!(
            daily_amount(Decimal::ZERO, Decimal::new(50, 1)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_daily_amount_zero_rate() {
        assert_eq!(
            daily_amount(Decimal::from(1000), Decimal::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_round_credit_midpoint() {
        // 30 days of 0.1370 = 4.1100 -> 4.11
        assert_eq!(round_credit(Decimal::new(41100, 4)), Decimal::new(411, 2));
        // Midpoint rounds away from zero
        assert_eq!(round_credit(Decimal::new(125, 3)), Decimal::new(13, 2));
    }

    #[test]
    fn test_projected_monthly() {
        let projected = projected_monthly(Decimal::new(100000, 2), Decimal::new(50, 1));
        assert_eq!(projected, Decimal::new(41100, 4)); // 0.1370 * 30
    }
}
