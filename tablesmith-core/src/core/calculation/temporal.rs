//! Date strategies: earliest, latest and span.
//!
//! The modifier packs `format:unit` (see [`split_time_modifier`]). Cells that
//! parse under no format are dropped.

use super::{column_values, CalculationValue};
use crate::core::dates::{self, DEFAULT_DATE_FORMAT};
use crate::core::formula::{split_time_modifier, TimeUnit};
use crate::core::table::Table;
use chrono::NaiveDateTime;

fn parsed_dates(table: &Table, columns: &[usize], format: Option<&str>) -> Vec<NaiveDateTime> {
    column_values(table, columns)
        .filter_map(|content| dates::parse_date(content, format))
        .collect()
}

fn formatted(date: Option<NaiveDateTime>, format: Option<&str>) -> CalculationValue {
    match date {
        Some(dt) => CalculationValue::Text(dates::format_date(&dt, format.unwrap_or(DEFAULT_DATE_FORMAT))),
        None => CalculationValue::Text(String::new()),
    }
}

pub(super) fn time_earliest(table: &Table, columns: &[usize], modifier: Option<&str>) -> CalculationValue {
    let (format, _) = split_time_modifier(modifier);
    formatted(parsed_dates(table, columns, format).into_iter().min(), format)
}

pub(super) fn time_latest(table: &Table, columns: &[usize], modifier: Option<&str>) -> CalculationValue {
    let (format, _) = split_time_modifier(modifier);
    formatted(parsed_dates(table, columns, format).into_iter().max(), format)
}

/// Whole units between the earliest and latest date; 0 with fewer than two dates.
pub(super) fn time_span(table: &Table, columns: &[usize], modifier: Option<&str>) -> CalculationValue {
    let (format, unit) = split_time_modifier(modifier);
    let all = parsed_dates(table, columns, format);
    let (Some(earliest), Some(latest)) = (all.iter().min(), all.iter().max()) else {
        return CalculationValue::Number(0.0);
    };
    let span = *latest - *earliest;
    let amount = match unit {
        TimeUnit::Days => span.num_days(),
        TimeUnit::Hours => span.num_hours(),
        TimeUnit::Minutes => span.num_minutes(),
    };
    CalculationValue::Number(amount as f64)
}
