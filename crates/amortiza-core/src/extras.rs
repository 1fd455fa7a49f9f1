//! Extra principal payments, one-off or recurring.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Money, MonthIndex};

/// When an extra payment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraTarget {
    /// 1-based schedule month.
    Month(MonthIndex),
    /// Calendar date, resolved against the loan's start date.
    Date(NaiveDate),
}

/// A scheduled extra principal payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraPayment {
    pub target: ExtraTarget,
    pub amount: Money,
}

impl ExtraPayment {
    pub fn at_month(month: MonthIndex, amount: Money) -> Self {
        Self {
            target: ExtraTarget::Month(month),
            amount,
        }
    }

    pub fn on_date(date: NaiveDate, amount: Money) -> Self {
        Self {
            target: ExtraTarget::Date(date),
            amount,
        }
    }
}

/// Whole calendar months from `start` to `date`, ignoring the day of month.
pub fn months_between(start: NaiveDate, date: NaiveDate) -> i64 {
    i64::from(date.year() - start.year()) * 12 + i64::from(date.month()) - i64::from(start.month())
}

/// Schedule month a target falls in, if it falls inside `1..=term`.
pub fn resolve_month_index(
    target: ExtraTarget,
    start: Option<NaiveDate>,
    term: MonthIndex,
) -> Option<MonthIndex> {
    let index = match target {
        ExtraTarget::Month(month) => i64::from(month),
        ExtraTarget::Date(date) => months_between(start?, date) + 1,
    };
    if index >= 1 && index <= i64::from(term) {
        MonthIndex::try_from(index).ok()
    } else {
        None
    }
}

/// Extra-payment targets per month.
///
/// Holds only the scheduled (one-off) component; the recurring amount is
/// added when a month's target is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraSchedule {
    scheduled: BTreeMap<MonthIndex, Money>,
    recurring: Money,
    ignored: usize,
}

impl ExtraSchedule {
    /// Scheduled one-off amount for `month` (zero when none).
    pub fn scheduled(&self, month: MonthIndex) -> Money {
        self.scheduled.get(&month).copied().unwrap_or(Decimal::ZERO)
    }

    /// Total extra targeted at `month`, recurring amount included.
    ///
    /// Saturates at `Decimal::MAX`; the engine caps extras at the balance.
    pub fn target(&self, month: MonthIndex) -> Money {
        self.scheduled(month).saturating_add(self.recurring)
    }

    pub fn recurring(&self) -> Money {
        self.recurring
    }

    pub fn scheduled_months(&self) -> impl Iterator<Item = (MonthIndex, Money)> + '_ {
        self.scheduled.iter().map(|(m, a)| (*m, *a))
    }

    /// Number of payments dropped during aggregation.
    pub fn ignored(&self) -> usize {
        self.ignored
    }
}

/// Group payments by resolved month, summing amounts landing in the same month.
///
/// Payments with a non-positive amount, a date target and no start date, or
/// a month outside the nominal term are dropped and counted.
pub fn aggregate_extras(
    payments: &[ExtraPayment],
    start: Option<NaiveDate>,
    term: MonthIndex,
    recurring: Money,
) -> ExtraSchedule {
    let mut schedule = ExtraSchedule {
        recurring,
        ..ExtraSchedule::default()
    };

    for payment in payments {
        if payment.amount <= Decimal::ZERO {
            schedule.ignored += 1;
            continue;
        }
        match resolve_month_index(payment.target, start, term) {
            Some(month) => {
                let slot = schedule.scheduled.entry(month).or_insert(Decimal::ZERO);
                *slot = slot.saturating_add(payment.amount);
            }
            None => schedule.ignored += 1,
        }
    }

    schedule
}
