use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;

use amortiza_core::correction::{CorrectionRange, CorrectionTable};

use super::file::resolve_path;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Load a TR history file into a correction table.
///
/// Each row is `start;end;percent`, dates as dd/mm/yyyy and the percent with
/// a decimal comma (`01/01/2024;01/02/2024;0,0605`). Rows that do not parse
/// are skipped.
pub fn read_tr_history(path: &str) -> Result<CorrectionTable, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let mut ranges = Vec::new();
    for record in reader.records() {
        if let Some(range) = parse_row(&record?) {
            ranges.push(range);
        }
    }

    Ok(CorrectionTable::from_ranges(&ranges)?)
}

fn parse_row(record: &StringRecord) -> Option<CorrectionRange> {
    let start = NaiveDate::parse_from_str(record.get(0)?, DATE_FORMAT).ok()?;
    let end = NaiveDate::parse_from_str(record.get(1)?, DATE_FORMAT).ok()?;
    let percent: Decimal = record.get(2)?.replace(',', ".").parse().ok()?;
    Some(CorrectionRange {
        start,
        end,
        percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_row_decimal_comma() {
        let record = StringRecord::from(vec!["01/01/2024", "01/02/2024", "0,0605"]);
        let range = parse_row(&record).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(range.percent, dec!(0.0605));
    }

    #[test]
    fn test_parse_row_skips_malformed() {
        assert!(parse_row(&StringRecord::from(vec!["01/01/2024", "01/02/2024"])).is_none());
        assert!(parse_row(&StringRecord::from(vec!["2024-01-01", "01/02/2024", "0,1"])).is_none());
        assert!(parse_row(&StringRecord::from(vec!["01/01/2024", "01/02/2024", "n/a"])).is_none());
    }
}
