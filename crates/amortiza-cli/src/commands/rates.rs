use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use amortiza_core::time_value;

/// Arguments for annual-to-monthly rate conversion
#[derive(Args)]
pub struct MonthlyRateArgs {
    /// Effective annual rate in percent (e.g. 12 for 12% a year)
    #[arg(long, allow_hyphen_values = true)]
    pub annual: Decimal,
}

pub fn run_monthly_rate(args: MonthlyRateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let monthly = time_value::monthly_from_annual(args.annual)?;
    Ok(json!({
        "result": {
            "annual_percent": args.annual,
            "monthly_rate": monthly.round_dp(10),
            "monthly_percent": (monthly * dec!(100)).round_dp(8),
        }
    }))
}
