use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use amortiza_core::correction::{
    CorrectionPolicy, CorrectionTable, IndexCorrection, DEFAULT_AVERAGE_WINDOW,
};
use amortiza_core::extras::ExtraPayment;
use amortiza_core::schedule::{
    self, AmortizationSystem, LoanParameters, DEFAULT_SAFETY_MARGIN_MONTHS,
};
use amortiza_core::summary;
use amortiza_core::time_value::RateBasis;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BasisArg {
    Monthly,
    Annual,
}

impl From<BasisArg> for RateBasis {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::Monthly => RateBasis::Monthly,
            BasisArg::Annual => RateBasis::Annual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Correct the balance only
    BalanceOnly,
    /// Rescale the installment every month
    Compound,
    /// Re-derive the installment from the original base and cumulative factor
    Rebase,
}

impl From<PolicyArg> for CorrectionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::BalanceOnly => CorrectionPolicy::BalanceOnly,
            PolicyArg::Compound => CorrectionPolicy::CompoundInstallment,
            PolicyArg::Rebase => CorrectionPolicy::RebaseInstallment,
        }
    }
}

/// Arguments for schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to a JSON or YAML loan file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount financed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Interest rate in percent (1 = 1%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Whether --rate is monthly or effective annual
    #[arg(long, value_enum, default_value = "monthly")]
    pub rate_basis: BasisArg,

    /// Term in months
    #[arg(long)]
    pub term: Option<u32>,

    /// Amortization system: sac or price
    #[arg(long, default_value = "price")]
    pub system: AmortizationSystem,

    /// Fixed fee added to every installment
    #[arg(long)]
    pub fee: Option<Decimal>,

    /// Date of the first installment (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Extra principal paid every month
    #[arg(long)]
    pub extra_monthly: Option<Decimal>,

    /// One-off extras as MONTH:AMOUNT or YYYY-MM-DD:AMOUNT (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub extra: Option<Vec<String>>,

    /// JSON or YAML map of YYYY-MM to monthly correction fraction
    #[arg(long)]
    pub correction: Option<String>,

    /// TR history file with rows dd/mm/yyyy;dd/mm/yyyy;percent
    #[arg(long, conflicts_with = "correction")]
    pub tr_history: Option<String>,

    /// Correction fraction for months past the table (default: trailing average)
    #[arg(long, allow_hyphen_values = true)]
    pub projected_rate: Option<Decimal>,

    /// Months in the trailing average used as the projected rate
    #[arg(long, default_value_t = DEFAULT_AVERAGE_WINDOW)]
    pub average_window: usize,

    /// How correction reaches the PRICE installment
    #[arg(long, value_enum, default_value = "compound")]
    pub policy: PolicyArg,

    /// Months allowed past the term before the residual is closed
    #[arg(long, default_value_t = DEFAULT_SAFETY_MARGIN_MONTHS)]
    pub safety_margin: u32,

    /// Print only the month-by-month records
    #[arg(long)]
    pub records_only: bool,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let records_only = args.records_only;
    let params = resolve_params(args)?;
    let output = schedule::build_schedule(&params)?;
    if records_only {
        return Ok(serde_json::to_value(output.result.records)?);
    }
    Ok(serde_json::to_value(output)?)
}

pub fn run_summary(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params = resolve_params(args)?;
    let output = summary::summarize_schedule(&params)?;
    Ok(serde_json::to_value(output)?)
}

fn resolve_params(args: ScheduleArgs) -> Result<LoanParameters, Box<dyn std::error::Error>> {
    let mut params: LoanParameters = if let Some(ref path) = args.input {
        input::file::read_structured(path)?
    } else if let Some(params) = input::stdin::read_stdin()? {
        params
    } else {
        let principal = args
            .principal
            .ok_or("--principal is required (or provide --input)")?;
        let rate = args.rate.ok_or("--rate is required (or provide --input)")?;
        let term = args.term.ok_or("--term is required (or provide --input)")?;

        let extras = args
            .extra
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|spec| parse_extra(spec))
            .collect::<Result<Vec<_>, _>>()?;

        LoanParameters {
            principal,
            monthly_rate: RateBasis::from(args.rate_basis).to_monthly(rate)?,
            term_months: term,
            system: args.system,
            monthly_fee: args.fee.unwrap_or_default(),
            start_date: args.start_date,
            correction: None,
            extras,
            recurring_extra: args.extra_monthly.unwrap_or_default(),
            safety_margin_months: args.safety_margin,
        }
    };

    if let Some(correction) = load_correction(&args)? {
        params.correction = Some(correction);
    }
    Ok(params)
}

fn load_correction(
    args: &ScheduleArgs,
) -> Result<Option<IndexCorrection>, Box<dyn std::error::Error>> {
    let table: CorrectionTable = if let Some(ref path) = args.correction {
        input::file::read_structured(path)?
    } else if let Some(ref path) = args.tr_history {
        input::tr_history::read_tr_history(path)?
    } else {
        return Ok(None);
    };

    let projected_rate = args
        .projected_rate
        .unwrap_or_else(|| table.trailing_average(args.average_window));

    Ok(Some(IndexCorrection {
        table,
        projected_rate,
        policy: args.policy.into(),
    }))
}

/// Parse `MONTH:AMOUNT` or `YYYY-MM-DD:AMOUNT`.
fn parse_extra(spec: &str) -> Result<ExtraPayment, Box<dyn std::error::Error>> {
    let (target, amount) = spec
        .rsplit_once(':')
        .ok_or_else(|| format!("Extra payment must be MONTH:AMOUNT or DATE:AMOUNT, got '{}'", spec))?;
    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|e| format!("Invalid extra amount '{}': {}", amount, e))?;

    let target = target.trim();
    if let Ok(month) = target.parse::<u32>() {
        return Ok(ExtraPayment::at_month(month, amount));
    }
    let date = NaiveDate::parse_from_str(target, "%Y-%m-%d")
        .map_err(|e| format!("Invalid extra target '{}': {}", target, e))?;
    Ok(ExtraPayment::on_date(date, amount))
}
