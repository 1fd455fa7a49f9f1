use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::prelude::ToPrimitive;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_schedule(input_json: String) -> NapiResult<String> {
    let input: amortiza_core::schedule::LoanParameters =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = amortiza_core::schedule::build_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn summarize_schedule(input_json: String) -> NapiResult<String> {
    let input: amortiza_core::schedule::LoanParameters =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = amortiza_core::summary::summarize_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

#[napi]
pub fn monthly_from_annual(annual_percent: f64) -> NapiResult<f64> {
    let annual = amortiza_core::time_value::rate_from_f64(annual_percent, "annual_percent")
        .map_err(to_napi_error)?;
    let monthly = amortiza_core::time_value::monthly_from_annual(annual).map_err(to_napi_error)?;
    monthly
        .to_f64()
        .ok_or_else(|| to_napi_error("monthly rate does not fit in f64"))
}
