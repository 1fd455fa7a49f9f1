//! Monetary correction by an external reference index (TR).
//!
//! The engine only ever sees an already-resolved [`CorrectionTable`]: a map
//! from calendar month to the fraction published for it. Months the table
//! does not cover fall back to a caller-supplied projected rate.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AmortizaError;
use crate::types::Rate;
use crate::AmortizaResult;

/// Trailing window, in months, used for the default projected rate.
pub const DEFAULT_AVERAGE_WINDOW: usize = 12;

// ---------------------------------------------------------------------------
// Month keys
// ---------------------------------------------------------------------------

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> AmortizaResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(AmortizaError::DateError(format!(
                "month {month} is outside 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = AmortizaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AmortizaError::DateError(format!("'{s}' is not a YYYY-MM month key"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Correction table
// ---------------------------------------------------------------------------

/// A published index value valid over a span of days, expressed in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Monthly index value in percent (0.0605 = 0.0605%).
    pub percent: Decimal,
}

/// Month key to monthly correction fraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionTable {
    entries: BTreeMap<MonthKey, Rate>,
}

impl CorrectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (MonthKey, Rate)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Expand dated ranges into one entry per calendar month they touch.
    ///
    /// Every month from the start date's month through the end date's month
    /// receives `percent / 100`. Later ranges overwrite earlier ones.
    pub fn from_ranges(ranges: &[CorrectionRange]) -> AmortizaResult<Self> {
        let mut table = Self::new();
        for range in ranges {
            if range.end < range.start {
                return Err(AmortizaError::InvalidInput {
                    field: "correction_range".into(),
                    reason: format!("range ends ({}) before it starts ({})", range.end, range.start),
                });
            }
            let fraction = range.percent / dec!(100);
            let last = MonthKey::from_date(range.end);
            let mut key = MonthKey::from_date(range.start);
            while key <= last {
                table.insert(key, fraction);
                key = key.succ();
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, key: MonthKey, fraction: Rate) -> Option<Rate> {
        self.entries.insert(key, fraction)
    }

    pub fn get(&self, key: &MonthKey) -> Option<Rate> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &Rate)> + '_ {
        self.entries.iter()
    }

    pub fn last_key(&self) -> Option<MonthKey> {
        self.entries.keys().next_back().copied()
    }

    /// Mean of the most recent `window` entries; zero for an empty table.
    pub fn trailing_average(&self, window: usize) -> Rate {
        let recent: Vec<Rate> = self.entries.values().rev().take(window).copied().collect();
        if recent.is_empty() {
            return Decimal::ZERO;
        }
        recent.iter().sum::<Decimal>() / Decimal::from(recent.len())
    }
}

// ---------------------------------------------------------------------------
// Policy and settings
// ---------------------------------------------------------------------------

/// How a month's correction reaches the PRICE base installment.
///
/// The balance is always corrected; SAC amortization never is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPolicy {
    /// Only the balance is corrected; the installment stays at its base value.
    BalanceOnly,
    /// The installment is rescaled and rounded every month, so rounding compounds.
    #[default]
    CompoundInstallment,
    /// The installment is re-derived each month from the original base times
    /// the cumulative factor.
    RebaseInstallment,
}

/// Correction inputs carried by a loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCorrection {
    pub table: CorrectionTable,
    /// Rate used for months the table does not cover.
    #[serde(default)]
    pub projected_rate: Rate,
    #[serde(default)]
    pub policy: CorrectionPolicy,
}

impl IndexCorrection {
    /// Settings whose projected rate is the trailing average of the table.
    pub fn with_trailing_average(table: CorrectionTable, window: usize) -> Self {
        let projected_rate = table.trailing_average(window);
        Self {
            table,
            projected_rate,
            policy: CorrectionPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Where a month's correction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionSource {
    Disabled,
    Table,
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCorrection {
    pub rate: Rate,
    pub source: CorrectionSource,
}

/// Resolve a month's correction and report its provenance.
pub fn resolve(
    key: Option<MonthKey>,
    table: Option<&CorrectionTable>,
    fallback: Rate,
) -> ResolvedCorrection {
    let Some(table) = table else {
        return ResolvedCorrection {
            rate: Decimal::ZERO,
            source: CorrectionSource::Disabled,
        };
    };

    match key.and_then(|k| table.get(&k)) {
        Some(rate) => ResolvedCorrection {
            rate,
            source: CorrectionSource::Table,
        },
        None => ResolvedCorrection {
            rate: fallback,
            source: CorrectionSource::Projected,
        },
    }
}

/// The correction fraction to apply for a month.
pub fn resolve_correction(
    key: Option<MonthKey>,
    table: Option<&CorrectionTable>,
    fallback: Rate,
) -> Rate {
    resolve(key, table, fallback).rate
}

/// Calendar date of schedule month `month` (1-based) for a loan starting on `start`.
pub fn due_date(start: Option<NaiveDate>, month: u32) -> AmortizaResult<Option<NaiveDate>> {
    let Some(start) = start else {
        return Ok(None);
    };
    start
        .checked_add_months(Months::new(month.saturating_sub(1)))
        .map(Some)
        .ok_or_else(|| AmortizaError::DateError(format!("month {month} after {start} is out of range")))
}
