pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Split a result object into its scalar fields and its row array, if any.
///
/// Schedules carry `records`, summaries carry `yearly`.
pub fn split_rows(result: &serde_json::Map<String, Value>) -> (Vec<(&String, &Value)>, Option<&[Value]>) {
    let mut rows = None;
    let mut fields = Vec::new();
    for (key, val) in result {
        match (key.as_str(), val) {
            ("records" | "yearly", Value::Array(arr)) => rows = Some(arr.as_slice()),
            _ => fields.push((key, val)),
        }
    }
    (fields, rows)
}
