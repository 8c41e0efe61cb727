//! Nhãn thời gian tương đối ("1.5 years ago") cho trục thời gian.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TODAY: &str = "Today";
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElapsedUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl ElapsedUnit {
    fn seconds(&self) -> f64 {
        match self {
            ElapsedUnit::Minute => 60.0,
            ElapsedUnit::Hour => 3_600.0,
            ElapsedUnit::Day => SECONDS_PER_DAY,
            ElapsedUnit::Week => 7.0 * SECONDS_PER_DAY,
            ElapsedUnit::Month => 30.4375 * SECONDS_PER_DAY,
            ElapsedUnit::Year => 365.25 * SECONDS_PER_DAY,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ElapsedUnit::Minute => "minute",
            ElapsedUnit::Hour => "hour",
            ElapsedUnit::Day => "day",
            ElapsedUnit::Week => "week",
            ElapsedUnit::Month => "month",
            ElapsedUnit::Year => "year",
        }
    }
}

fn elapsed_in(since: DateTime<Utc>, now: DateTime<Utc>, unit: ElapsedUnit) -> f64 {
    let seconds = now.signed_duration_since(since).num_milliseconds() as f64 / 1000.0;
    seconds / unit.seconds()
}

fn describe(amount: f64, unit: ElapsedUnit) -> String {
    let text = format!("{amount:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    let plural = if text == "1" { "" } else { "s" };
    format!("{text} {}{plural} ago", unit.name())
}

/// Đơn vị lớn nhất (năm, tháng, tuần, ngày) đã trôi qua ít nhất một lần.
pub fn format_elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    [
        ElapsedUnit::Year,
        ElapsedUnit::Month,
        ElapsedUnit::Week,
        ElapsedUnit::Day,
    ]
    .into_iter()
    .find_map(|unit| {
        let amount = elapsed_in(since, now, unit);
        (amount >= 1.0).then(|| describe(amount, unit))
    })
    .unwrap_or_else(|| TODAY.to_string())
}

/// Như `format_elapsed` nhưng cố định đơn vị; "Today" khi chưa đủ `units` đơn vị.
pub fn format_elapsed_in(
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    unit: ElapsedUnit,
    units: f64,
) -> String {
    let amount = elapsed_in(since, now, unit);
    if units > 0.0 && amount / units >= 1.0 {
        describe(amount, unit)
    } else {
        TODAY.to_string()
    }
}

/// `MM/DD/YYYY`.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%m/%d/%Y").to_string()
}

/// `HH:mm`.
pub fn format_hour(at: DateTime<Utc>) -> String {
    at.format("%H:%M").to_string()
}
