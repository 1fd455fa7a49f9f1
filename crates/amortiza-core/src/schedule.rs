//! Month-by-month amortization schedules for SAC and PRICE loans.
//!
//! Every intermediate monetary value is rounded to cents as it is produced,
//! the way a bank statement is, so the schedule carries the same small drift
//! against the closed-form annuity that a real statement does.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::correction::{self, CorrectionPolicy, CorrectionSource, IndexCorrection, MonthKey};
use crate::error::AmortizaError;
use crate::extras::{self, ExtraPayment};
use crate::time_value::{annuity_payment, round_factor, round_money};
use crate::types::*;
use crate::AmortizaResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Balance at or below which the loan is treated as fully paid.
pub const BALANCE_EPSILON: Money = dec!(0.01);

/// Months the engine may run past the nominal term when correction extends it.
pub const DEFAULT_SAFETY_MARGIN_MONTHS: u32 = 100;

/// Longest nominal term accepted (100 years).
pub const MAX_TERM_MONTHS: u32 = 1200;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Amortization regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AmortizationSystem {
    /// Constant amortization; the installment falls as interest falls.
    Sac,
    /// Constant installment (French annuity).
    Price,
}

impl fmt::Display for AmortizationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmortizationSystem::Sac => f.write_str("sac"),
            AmortizationSystem::Price => f.write_str("price"),
        }
    }
}

impl FromStr for AmortizationSystem {
    type Err = AmortizaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sac" => Ok(AmortizationSystem::Sac),
            "price" => Ok(AmortizationSystem::Price),
            other => Err(AmortizaError::UnknownSystem(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for AmortizationSystem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn default_safety_margin() -> u32 {
    DEFAULT_SAFETY_MARGIN_MONTHS
}

/// Everything the engine needs for one schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanParameters {
    pub principal: Money,
    /// Interest per month as a fraction (0.01 = 1%).
    pub monthly_rate: Rate,
    pub term_months: u32,
    pub system: AmortizationSystem,
    /// Fixed fee charged with every installment (insurance, admin).
    #[serde(default)]
    pub monthly_fee: Money,
    /// Anchors month 1 to a calendar month; without it months are bare indices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Index correction; `None` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<IndexCorrection>,
    #[serde(default)]
    pub extras: Vec<ExtraPayment>,
    /// Extra principal paid every month on top of scheduled extras.
    #[serde(default)]
    pub recurring_extra: Money,
    #[serde(default = "default_safety_margin")]
    pub safety_margin_months: u32,
}

impl LoanParameters {
    /// A plain loan: no fee, calendar, correction or extras.
    pub fn new(
        principal: Money,
        monthly_rate: Rate,
        term_months: u32,
        system: AmortizationSystem,
    ) -> Self {
        Self {
            principal,
            monthly_rate,
            term_months,
            system,
            monthly_fee: Decimal::ZERO,
            start_date: None,
            correction: None,
            extras: Vec::new(),
            recurring_extra: Decimal::ZERO,
            safety_margin_months: DEFAULT_SAFETY_MARGIN_MONTHS,
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One month of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRecord {
    pub month: MonthIndex,
    /// Calendar due date; `None` when the loan has no start date.
    pub due_date: Option<NaiveDate>,
    /// amortization + interest + fee
    pub installment: Money,
    pub amortization: Money,
    pub interest: Money,
    pub fee: Money,
    pub extra: Money,
    /// installment + extra
    pub paid: Money,
    /// Outstanding balance after this month's payments.
    pub balance: Money,
    /// Correction fraction applied this month.
    pub correction: Rate,
}

/// A complete schedule and its running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub system: AmortizationSystem,
    pub nominal_term: u32,
    /// Base PRICE installment before correction; `None` for SAC.
    pub base_installment: Option<Money>,
    pub records: Vec<InstallmentRecord>,
    pub total_interest: Money,
    pub total_amortization: Money,
    pub total_extra: Money,
    pub total_fees: Money,
    /// Installments plus extras.
    pub total_paid: Money,
    pub months_executed: u32,
    /// Whether the final record is a residual closure past the safety margin.
    pub residual_closed: bool,
}

// ---------------------------------------------------------------------------
// Installment plans
// ---------------------------------------------------------------------------

/// System-specific state fixed at schedule start.
#[derive(Debug, Clone)]
enum InstallmentPlan {
    Sac {
        amortization: Money,
    },
    Price {
        base: Money,
        current: Money,
        factor: Decimal,
        policy: CorrectionPolicy,
    },
}

impl InstallmentPlan {
    fn new(params: &LoanParameters, policy: CorrectionPolicy) -> AmortizaResult<Self> {
        let term = Decimal::from(params.term_months);
        match params.system {
            AmortizationSystem::Sac => Ok(InstallmentPlan::Sac {
                amortization: round_money(params.principal / term),
            }),
            AmortizationSystem::Price => {
                let base = round_money(annuity_payment(
                    params.principal,
                    params.monthly_rate,
                    params.term_months,
                )?);
                Ok(InstallmentPlan::Price {
                    base,
                    current: base,
                    factor: Decimal::ONE,
                    policy,
                })
            }
        }
    }

    fn base_installment(&self) -> Option<Money> {
        match self {
            InstallmentPlan::Sac { .. } => None,
            InstallmentPlan::Price { base, .. } => Some(*base),
        }
    }

    /// Carry a month's correction growth `1 + r` into the installment, per policy.
    fn correct(&mut self, growth: Decimal) -> AmortizaResult<()> {
        let InstallmentPlan::Price {
            base,
            current,
            factor,
            policy,
        } = self
        else {
            return Ok(());
        };

        match policy {
            CorrectionPolicy::BalanceOnly => {}
            CorrectionPolicy::CompoundInstallment => {
                *current = round_money(mul(*current, growth, "installment correction")?);
            }
            CorrectionPolicy::RebaseInstallment => {
                *factor = round_factor(mul(*factor, growth, "correction factor")?);
                *current = round_money(mul(*base, *factor, "installment correction")?);
            }
        }
        Ok(())
    }

    /// (amortization, installment) for a month with the given balance.
    fn split(&self, balance: Money, interest: Money, fee: Money) -> AmortizaResult<(Money, Money)> {
        let charges = add(interest, fee, "installment")?;
        match self {
            InstallmentPlan::Sac { amortization } => {
                let amortization = (*amortization).min(balance);
                Ok((amortization, add(amortization, charges, "installment")?))
            }
            InstallmentPlan::Price { current, .. } => {
                let target = *current - interest;
                let (mut amortization, mut installment) = if target <= Decimal::ZERO {
                    // Interest-only month: the corrected installment has not caught up
                    (Decimal::ZERO, charges)
                } else {
                    (target.min(balance), add(*current, fee, "installment")?)
                };
                if balance <= amortization {
                    amortization = balance;
                    installment = add(balance, charges, "installment")?;
                }
                Ok((amortization, installment))
            }
        }
    }
}

pub(crate) fn mul(a: Decimal, b: Decimal, context: &str) -> AmortizaResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| AmortizaError::domain(context))
}

pub(crate) fn add(a: Decimal, b: Decimal, context: &str) -> AmortizaResult<Decimal> {
    a.checked_add(b).ok_or_else(|| AmortizaError::domain(context))
}

/// Checked sum of one field across all records.
fn total(
    records: &[InstallmentRecord],
    field: impl Fn(&InstallmentRecord) -> Money,
    context: &str,
) -> AmortizaResult<Money> {
    records
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| add(acc, field(r), context))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, reason: &str) -> AmortizaError {
    AmortizaError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn validate(params: &LoanParameters) -> AmortizaResult<()> {
    if params.principal <= Decimal::ZERO {
        return Err(invalid("principal", "Principal must be positive"));
    }
    if params.term_months == 0 {
        return Err(invalid("term_months", "Term must be at least 1 month"));
    }
    if params.term_months > MAX_TERM_MONTHS {
        return Err(invalid("term_months", "Term must not exceed 1200 months"));
    }
    if params.monthly_rate < Decimal::ZERO {
        return Err(invalid("monthly_rate", "Interest rate cannot be negative"));
    }
    if params.monthly_fee < Decimal::ZERO {
        return Err(invalid("monthly_fee", "Fee cannot be negative"));
    }
    if params.recurring_extra < Decimal::ZERO {
        return Err(invalid("recurring_extra", "Recurring extra cannot be negative"));
    }
    if let Some(c) = &params.correction {
        if c.projected_rate <= -Decimal::ONE {
            return Err(invalid(
                "correction.projected_rate",
                "Projected correction must be greater than -100%",
            ));
        }
        if let Some((key, _)) = c.table.iter().find(|(_, r)| **r <= -Decimal::ONE) {
            return Err(AmortizaError::InvalidInput {
                field: "correction.table".into(),
                reason: format!("Correction for {key} must be greater than -100%"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct EngineRun {
    result: ScheduleResult,
    warnings: Vec<String>,
}

fn run_engine(params: &LoanParameters) -> AmortizaResult<EngineRun> {
    validate(params)?;

    let mut warnings: Vec<String> = Vec::new();
    let term = params.term_months;
    let rate = params.monthly_rate;
    let fee = round_money(params.monthly_fee);
    let cap = term
        .checked_add(params.safety_margin_months)
        .filter(|cap| *cap < u32::MAX)
        .ok_or_else(|| invalid("safety_margin_months", "Term plus safety margin overflows"))?;

    let extras = extras::aggregate_extras(
        &params.extras,
        params.start_date,
        term,
        params.recurring_extra,
    );
    if extras.ignored() > 0 {
        warnings.push(format!(
            "{} extra payment(s) ignored: non-positive amount, or month outside 1..={term}",
            extras.ignored()
        ));
    }

    let (table, projected, policy) = match &params.correction {
        Some(c) => (Some(&c.table), c.projected_rate, c.policy),
        None => (None, Decimal::ZERO, CorrectionPolicy::default()),
    };

    let mut plan = InstallmentPlan::new(params, policy)?;
    // Largest cent-rounding drift a term can accumulate
    let drift_tolerance = BALANCE_EPSILON * Decimal::from(term);

    let mut balance = round_money(params.principal);
    let mut records: Vec<InstallmentRecord> = Vec::with_capacity(term as usize);
    let mut projected_months = 0u32;
    let mut drift_absorbed = Decimal::ZERO;

    for month in 1..=cap {
        let due_date = correction::due_date(params.start_date, month)?;

        // 1. Correction compounds the base interest is charged on
        let resolved = correction::resolve(due_date.map(MonthKey::from_date), table, projected);
        if resolved.source == CorrectionSource::Projected {
            projected_months += 1;
        }
        let correction = resolved.rate;
        if !correction.is_zero() {
            let growth = add(Decimal::ONE, correction, "correction growth")?;
            balance = round_money(mul(balance, growth, "balance correction")?);
            plan.correct(growth)?;
        }

        // 2. Interest on the corrected balance
        let interest = round_money(mul(balance, rate, "interest")?);

        // 3. System-specific split
        let (mut amortization, mut installment) = plan.split(balance, interest, fee)?;

        if month >= term {
            let remainder = balance - amortization;
            if remainder > Decimal::ZERO && remainder <= drift_tolerance {
                amortization = balance;
                installment = add(installment, remainder, "drift absorption")?;
                drift_absorbed += remainder;
            }
        }

        // 4. Extra, never beyond what the scheduled amortization leaves
        let room = (balance - amortization).max(Decimal::ZERO);
        let extra = round_money(extras.target(month)).min(room);

        // 5. Balance update
        balance = round_money(balance - amortization - extra).max(Decimal::ZERO);
        if balance > Decimal::ZERO && balance <= BALANCE_EPSILON {
            amortization += balance;
            installment = add(installment, balance, "balance sweep")?;
            balance = Decimal::ZERO;
        }

        // 6. Emit
        records.push(InstallmentRecord {
            month,
            due_date,
            installment,
            amortization,
            interest,
            fee,
            extra,
            paid: add(installment, extra, "amount paid")?,
            balance,
            correction,
        });

        // 7. Termination
        if balance <= BALANCE_EPSILON {
            break;
        }
    }

    let residual_closed = balance > BALANCE_EPSILON;
    if residual_closed {
        let month = cap + 1;
        let interest = round_money(mul(balance, rate, "residual interest")?);
        let installment = add(balance, interest, "residual installment")?;
        warnings.push(format!(
            "Balance of {balance} remained after {cap} months; closed with a lump installment of {installment} in month {month}"
        ));
        records.push(InstallmentRecord {
            month,
            due_date: correction::due_date(params.start_date, month)?,
            installment,
            amortization: balance,
            interest,
            fee: Decimal::ZERO,
            extra: Decimal::ZERO,
            paid: installment,
            balance: Decimal::ZERO,
            correction: Decimal::ZERO,
        });
    }

    if projected_months > 0 {
        warnings.push(format!(
            "{projected_months} month(s) corrected at the projected rate {projected} (no table entry)"
        ));
    }
    if !drift_absorbed.is_zero() {
        warnings.push(format!(
            "Rounding drift of {drift_absorbed} absorbed into the final amortization"
        ));
    }

    let result = ScheduleResult {
        system: params.system,
        nominal_term: term,
        base_installment: plan.base_installment(),
        total_interest: total(&records, |r| r.interest, "total interest")?,
        total_amortization: total(&records, |r| r.amortization, "total amortization")?,
        total_extra: total(&records, |r| r.extra, "total extra")?,
        total_fees: total(&records, |r| r.fee, "total fees")?,
        total_paid: total(&records, |r| r.paid, "total paid")?,
        months_executed: records.len() as u32,
        residual_closed,
        records,
    };

    Ok(EngineRun { result, warnings })
}

/// Generate the schedule for a loan.
///
/// Pure: identical parameters always yield an identical result.
pub fn generate_schedule(params: &LoanParameters) -> AmortizaResult<ScheduleResult> {
    run_engine(params).map(|run| run.result)
}

/// Generate the schedule wrapped in the standard output envelope, with
/// diagnostics as warnings.
pub fn build_schedule(
    params: &LoanParameters,
) -> AmortizaResult<ComputationOutput<ScheduleResult>> {
    let start = Instant::now();
    let EngineRun { result, warnings } = run_engine(params)?;
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Installment schedule with statement-level cent rounding",
        &serde_json::json!({
            "system": params.system,
            "principal": params.principal.to_string(),
            "monthly_rate": params.monthly_rate.to_string(),
            "term_months": params.term_months,
            "correction": params.correction.as_ref().map(|c| serde_json::json!({
                "policy": c.policy,
                "table_months": c.table.len(),
                "projected_rate": c.projected_rate.to_string(),
            })),
            "safety_margin_months": params.safety_margin_months,
        }),
        warnings,
        elapsed,
        result,
    ))
}
