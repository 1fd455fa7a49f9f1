use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::AmortizaError;
use crate::types::{Money, Rate};
use crate::AmortizaResult;

/// Decimal places every monetary value is quantized to.
pub const MONEY_DP: u32 = 2;

/// Decimal places kept on cumulative correction factors.
pub const FACTOR_DP: u32 = 12;

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// How a quoted interest percentage relates to the monthly period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// Quoted percentage is already a monthly rate.
    #[default]
    Monthly,
    /// Quoted percentage is an effective annual rate.
    Annual,
}

impl RateBasis {
    /// Convert a quoted percentage (1.5 = 1.5%) into a monthly fraction.
    pub fn to_monthly(self, percent: Decimal) -> AmortizaResult<Rate> {
        match self {
            RateBasis::Monthly => Ok(percent / dec!(100)),
            RateBasis::Annual => monthly_from_annual(percent),
        }
    }
}

/// Round a monetary amount to cents, half away from zero.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a compounding factor to [`FACTOR_DP`] places.
pub fn round_factor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FACTOR_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Effective monthly rate equivalent to an annual percentage:
/// `(1 + annual_percent / 100)^(1/12) - 1`.
pub fn monthly_from_annual(annual_percent: Decimal) -> AmortizaResult<Rate> {
    if annual_percent.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if annual_percent <= dec!(-100) {
        return Err(AmortizaError::InvalidInput {
            field: "annual_percent".into(),
            reason: "Annual rate must be greater than -100%".into(),
        });
    }

    let growth = Decimal::ONE + annual_percent / dec!(100);
    let monthly_growth = growth
        .checked_powd(Decimal::ONE / MONTHS_PER_YEAR)
        .ok_or_else(|| AmortizaError::domain("monthly rate conversion"))?;

    Ok(monthly_growth - Decimal::ONE)
}

/// Level installment that repays `principal` over `nper` periods at `rate`:
/// `P * i * (1+i)^n / ((1+i)^n - 1)`, or `P / n` when the rate is zero.
pub fn annuity_payment(principal: Money, rate: Rate, nper: u32) -> AmortizaResult<Money> {
    if nper == 0 {
        return Err(AmortizaError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(nper));
    }

    let factor = (Decimal::ONE + rate)
        .checked_powu(u64::from(nper))
        .ok_or_else(|| AmortizaError::domain("annuity factor"))?;
    let denominator = factor - Decimal::ONE;

    if denominator.is_zero() {
        return Err(AmortizaError::domain("annuity denominator"));
    }

    principal
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(factor))
        .and_then(|v| v.checked_div(denominator))
        .ok_or_else(|| AmortizaError::domain("annuity installment"))
}

/// Convert a host-side float into a [`Rate`], rejecting NaN and infinities.
pub fn rate_from_f64(value: f64, field: &str) -> AmortizaResult<Rate> {
    if !value.is_finite() {
        return Err(AmortizaError::InvalidInput {
            field: field.into(),
            reason: format!("Value must be finite, got {value}"),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| AmortizaError::InvalidInput {
        field: field.into(),
        reason: format!("Value {value} is outside the decimal range"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(8333.333)), dec!(8333.33));
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
        assert_eq!(round_money(dec!(8884.8788)), dec!(8884.88));
    }

    #[test]
    fn test_monthly_from_annual_zero() {
        assert_eq!(monthly_from_annual(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_monthly_from_annual_twelve_percent() {
        let monthly = monthly_from_annual(dec!(12)).unwrap();
        // 1.12^(1/12) - 1 ≈ 0.948879%
        assert!((monthly - dec!(0.0094887929)).abs() < dec!(0.00000001));
    }

    #[test]
    fn test_monthly_compounds_back_to_annual() {
        let monthly = monthly_from_annual(dec!(9.5)).unwrap();
        let annual = (Decimal::ONE + monthly).powu(12) - Decimal::ONE;
        assert!((annual - dec!(0.095)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_monthly_from_annual_rejects_total_loss() {
        assert!(monthly_from_annual(dec!(-100)).is_err());
    }

    #[test]
    fn test_rate_basis_monthly_is_plain_percent() {
        assert_eq!(RateBasis::Monthly.to_monthly(dec!(1)).unwrap(), dec!(0.01));
    }

    #[test]
    fn test_annuity_payment_known_answer() {
        let pmt = annuity_payment(dec!(100000), dec!(0.01), 12).unwrap();
        assert_eq!(round_money(pmt), dec!(8884.88));
    }

    #[test]
    fn test_annuity_payment_zero_rate() {
        let pmt = annuity_payment(dec!(1200), Decimal::ZERO, 12).unwrap();
        assert_eq!(pmt, dec!(100));
    }

    #[test]
    fn test_annuity_payment_zero_periods() {
        assert!(annuity_payment(dec!(1000), dec!(0.01), 0).is_err());
    }

    #[test]
    fn test_rate_from_f64_rejects_non_finite() {
        assert!(rate_from_f64(f64::NAN, "rate").is_err());
        assert!(rate_from_f64(f64::INFINITY, "rate").is_err());
        assert_eq!(rate_from_f64(0.5, "rate").unwrap(), dec!(0.5));
    }
}
