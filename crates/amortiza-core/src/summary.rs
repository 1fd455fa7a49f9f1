use chrono::Datelike;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::schedule::{self, add, mul, LoanParameters, ScheduleResult};
use crate::time_value::round_factor;
use crate::types::*;
use crate::{AmortizaError, AmortizaResult};

/// Interest and principal paid within one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyBreakdown {
    /// Calendar year; `None` groups every month of an undated schedule.
    pub year: Option<i32>,
    pub installments: u32,
    pub interest: Money,
    pub amortization: Money,
    pub extra: Money,
}

/// Headline figures derived from a finished schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub first_installment: Money,
    pub last_installment: Money,
    pub largest_installment: Money,
    pub months_executed: u32,
    /// Nominal term minus months actually run (zero when extended).
    pub months_saved: u32,
    pub corrected_months: u32,
    /// Product of `1 + correction` over every month.
    pub cumulative_correction_factor: Decimal,
    /// Share of everything paid that went to interest.
    pub interest_share: Rate,
    pub total_interest: Money,
    pub total_paid: Money,
    pub yearly: Vec<YearlyBreakdown>,
}

/// Summarize a schedule.
///
/// Arithmetic is checked, so a hand-built result with out-of-range values
/// yields a `DomainError` instead of a panic.
pub fn summarize(result: &ScheduleResult) -> AmortizaResult<ScheduleSummary> {
    let records = &result.records;
    let first_installment = records.first().map(|r| r.installment).unwrap_or_default();
    let last_installment = records.last().map(|r| r.installment).unwrap_or_default();
    let largest_installment = records
        .iter()
        .map(|r| r.installment)
        .max()
        .unwrap_or_default();

    let mut cumulative_correction_factor = Decimal::ONE;
    let mut corrected_months = 0u32;
    let mut years: BTreeMap<Option<i32>, YearlyBreakdown> = BTreeMap::new();

    for r in records {
        if !r.correction.is_zero() {
            corrected_months += 1;
            let growth = add(Decimal::ONE, r.correction, "correction growth")?;
            cumulative_correction_factor =
                round_factor(mul(cumulative_correction_factor, growth, "correction factor")?);
        }

        let year = r.due_date.map(|d| d.year());
        let bucket = years.entry(year).or_insert_with(|| YearlyBreakdown {
            year,
            installments: 0,
            interest: Decimal::ZERO,
            amortization: Decimal::ZERO,
            extra: Decimal::ZERO,
        });
        bucket.installments += 1;
        bucket.interest = add(bucket.interest, r.interest, "yearly interest")?;
        bucket.amortization = add(bucket.amortization, r.amortization, "yearly amortization")?;
        bucket.extra = add(bucket.extra, r.extra, "yearly extra")?;
    }

    let interest_share = if result.total_paid.is_zero() {
        Decimal::ZERO
    } else {
        result
            .total_interest
            .checked_div(result.total_paid)
            .ok_or_else(|| AmortizaError::domain("interest share"))?
            .round_dp(6)
    };

    Ok(ScheduleSummary {
        first_installment,
        last_installment,
        largest_installment,
        months_executed: result.months_executed,
        months_saved: result.nominal_term.saturating_sub(result.months_executed),
        corrected_months,
        cumulative_correction_factor,
        interest_share,
        total_interest: result.total_interest,
        total_paid: result.total_paid,
        yearly: years.into_values().collect(),
    })
}

/// Generate a schedule and summarize it, in the standard envelope.
pub fn summarize_schedule(
    params: &LoanParameters,
) -> AmortizaResult<ComputationOutput<ScheduleSummary>> {
    let start = Instant::now();
    let built = schedule::build_schedule(params)?;
    let summary = summarize(&built.result)?;
    let elapsed = start.elapsed().as_micros() as u64;

    let mut warnings = built.warnings;
    if summary.interest_share > dec!(0.5) {
        warnings.push(format!(
            "Interest is {}% of everything paid",
            (summary.interest_share * dec!(100)).round_dp(2)
        ));
    }

    Ok(with_metadata(
        "Schedule summary with calendar-year breakdown",
        &built.assumptions,
        warnings,
        elapsed,
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{generate_schedule, AmortizationSystem};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sac_summary_known_answer() {
        let params = LoanParameters::new(dec!(100000), dec!(0.01), 12, AmortizationSystem::Sac);
        let result = generate_schedule(&params).unwrap();
        let summary = summarize(&result).unwrap();

        assert_eq!(summary.first_installment, dec!(9333.33));
        assert_eq!(summary.last_installment, dec!(8416.70));
        assert_eq!(summary.largest_installment, dec!(9333.33));
        assert_eq!(summary.months_saved, 0);
        assert_eq!(summary.corrected_months, 0);
        assert_eq!(summary.cumulative_correction_factor, Decimal::ONE);
        assert_eq!(summary.yearly.len(), 1);
        assert_eq!(summary.yearly[0].year, None);
        assert_eq!(summary.yearly[0].interest, dec!(6500));
    }

    #[test]
    fn test_yearly_breakdown_splits_calendar_years() {
        let mut params = LoanParameters::new(dec!(100000), dec!(0.01), 12, AmortizationSystem::Sac);
        params.start_date = NaiveDate::from_ymd_opt(2024, 7, 5);
        let summary = summarize(&generate_schedule(&params).unwrap()).unwrap();

        assert_eq!(summary.yearly.len(), 2);
        assert_eq!(summary.yearly[0].year, Some(2024));
        assert_eq!(summary.yearly[0].installments, 6);
        assert_eq!(summary.yearly[1].year, Some(2025));
        assert_eq!(summary.yearly[1].installments, 6);
        let amortized: Money = summary.yearly.iter().map(|y| y.amortization).sum();
        assert_eq!(amortized, dec!(100000));
    }

    #[test]
    fn test_extras_report_months_saved() {
        let mut params = LoanParameters::new(dec!(100000), dec!(0.01), 12, AmortizationSystem::Sac);
        params.recurring_extra = dec!(5000);
        let summary = summarize(&generate_schedule(&params).unwrap()).unwrap();
        assert_eq!(summary.months_executed, 8);
        assert_eq!(summary.months_saved, 4);
    }

    #[test]
    fn test_out_of_range_correction_is_domain_error() {
        let params = LoanParameters::new(dec!(1000), dec!(0.01), 2, AmortizationSystem::Sac);
        let mut result = generate_schedule(&params).unwrap();
        result.records[0].correction = Decimal::MAX;
        assert!(matches!(
            summarize(&result),
            Err(AmortizaError::DomainError { .. })
        ));

        result.records[0].correction = dec!(1000000000000000);
        result.records[1].correction = dec!(1000000000000000);
        assert!(matches!(
            summarize(&result),
            Err(AmortizaError::DomainError { .. })
        ));
    }

    #[test]
    fn test_summarize_schedule_envelope() {
        let params = LoanParameters::new(dec!(1000), dec!(0.01), 12, AmortizationSystem::Price);
        let output = summarize_schedule(&params).unwrap();
        assert!(output.warnings.is_empty());
        assert_eq!(output.result.months_executed, 12);
    }
}
