//! Counting and numeric aggregate strategies.
//!
//! Numeric strategies read each cell with leading-number semantics (`"5kg"`
//! reads as 5, `"n/a"` is skipped). An empty numeric set yields 0 for every
//! aggregate.

use super::{column_values, CalculationValue};
use crate::core::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap());

/// Reads the leading number of `content`, ignoring any trailing text.
fn parse_leading_number(content: &str) -> Option<f64> {
    let found = LEADING_NUMBER.find(content.trim_start())?;
    found.as_str().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn numbers(table: &Table, columns: &[usize]) -> Vec<f64> {
    column_values(table, columns)
        .filter_map(parse_leading_number)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// `values` counts non-empty cells, `empty` empty ones, `unique` distinct
/// non-empty contents. Anything else counts rows.
pub(super) fn count(table: &Table, columns: &[usize], modifier: Option<&str>) -> CalculationValue {
    let cells = || column_values(table, columns).map(str::trim);
    let n = match modifier.map(str::trim) {
        Some("values") => cells().filter(|c| !c.is_empty()).count(),
        Some("empty") => cells().filter(|c| c.is_empty()).count(),
        Some("unique") => cells()
            .filter(|c| !c.is_empty())
            .collect::<HashSet<_>>()
            .len(),
        _ => table.row_count(),
    };
    CalculationValue::Number(n as f64)
}

pub(super) fn sum(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    CalculationValue::Number(numbers(table, columns).iter().sum())
}

pub(super) fn average(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    CalculationValue::Number(mean(&numbers(table, columns)))
}

pub(super) fn min(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    let values = numbers(table, columns);
    let result = values.iter().copied().reduce(f64::min).unwrap_or(0.0);
    CalculationValue::Number(result)
}

pub(super) fn max(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    let values = numbers(table, columns);
    let result = values.iter().copied().reduce(f64::max).unwrap_or(0.0);
    CalculationValue::Number(result)
}

pub(super) fn median(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    let mut values = numbers(table, columns);
    if values.is_empty() {
        return CalculationValue::Number(0.0);
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let result = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    CalculationValue::Number(result)
}

/// Most frequent value; ties go to the value seen first.
pub(super) fn mode(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    let mut frequencies: Vec<(f64, usize)> = Vec::new();
    for value in numbers(table, columns) {
        match frequencies.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => frequencies.push((value, 1)),
        }
    }
    let mut best: Option<(f64, usize)> = None;
    for (value, n) in frequencies {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    CalculationValue::Number(best.map_or(0.0, |(v, _)| v))
}

/// Population variance.
pub(super) fn variance(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    CalculationValue::Number(population_variance(&numbers(table, columns)))
}

pub(super) fn std_dev(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    CalculationValue::Number(population_variance(&numbers(table, columns)).sqrt())
}

/// `sum / (count * sum) * 100`, kept as historically defined. Zero when
/// there are no values or they sum to zero.
pub(super) fn percentage(table: &Table, columns: &[usize], _modifier: Option<&str>) -> CalculationValue {
    let values = numbers(table, columns);
    let total: f64 = values.iter().sum();
    if values.is_empty() || total == 0.0 {
        return CalculationValue::Number(0.0);
    }
    CalculationValue::Number(total / (values.len() as f64 * total) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{column, table};
    use super::super::Strategy;
    use super::*;

    fn n(value: CalculationValue) -> f64 {
        value.as_number().unwrap()
    }

    #[test]
    fn test_leading_number_parsing() {
        assert_eq!(parse_leading_number("42"), Some(42.0));
        assert_eq!(parse_leading_number("  3.5kg"), Some(3.5));
        assert_eq!(parse_leading_number("1,200"), Some(1.0));
        assert_eq!(parse_leading_number(".5"), Some(0.5));
        assert_eq!(parse_leading_number("-2e3"), Some(-2000.0));
        assert_eq!(parse_leading_number("$5"), None);
        assert_eq!(parse_leading_number(""), None);
    }

    #[test]
    fn test_count_modifiers() {
        let t = column(&["a", "", "a", "b", "  "]);
        assert_eq!(n(count(&t, &[0], None)), 5.0);
        assert_eq!(n(count(&t, &[0], Some("values"))), 3.0);
        assert_eq!(n(count(&t, &[0], Some("empty"))), 2.0);
        assert_eq!(n(count(&t, &[0], Some("unique"))), 2.0);
        assert_eq!(n(count(&t, &[0], Some("whatever"))), 5.0);
    }

    #[test]
    fn test_non_numeric_cells_are_skipped() {
        let t = column(&["1", "n/a", "", "5"]);
        assert_eq!(n(sum(&t, &[0], None)), 6.0);
        assert_eq!(n(average(&t, &[0], None)), 3.0);
        assert_eq!(n(min(&t, &[0], None)), 1.0);
        assert_eq!(n(max(&t, &[0], None)), 5.0);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(n(median(&column(&["9", "1", "5"]), &[0], None)), 5.0);
        assert_eq!(n(median(&column(&["4", "1", "3", "2"]), &[0], None)), 2.5);
    }

    #[test]
    fn test_mode_ties_go_to_first_seen() {
        assert_eq!(n(mode(&column(&["3", "1", "1", "3"]), &[0], None)), 3.0);
        assert_eq!(n(mode(&column(&["2", "7", "7"]), &[0], None)), 7.0);
    }

    #[test]
    fn test_variance_is_population() {
        let t = column(&["2", "4", "4", "4", "5", "5", "7", "9"]);
        assert_eq!(n(variance(&t, &[0], None)), 4.0);
        assert_eq!(n(std_dev(&t, &[0], None)), 2.0);
    }

    #[test]
    fn test_percentage_formula() {
        let t = column(&["10", "30", "60", "x"]);
        let p = n(percentage(&t, &[0], None));
        assert!((p - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(n(percentage(&column(&["0", "0"]), &[0], None)), 0.0);
    }

    #[test]
    fn test_empty_numeric_set_is_zero() {
        let t = column(&["a", ""]);
        let strategies: [Strategy; 9] =
            [sum, average, min, max, median, mode, variance, std_dev, percentage];
        for strategy in strategies {
            assert_eq!(n(strategy(&t, &[0], None)), 0.0);
        }
    }

    #[test]
    fn test_counts_ignore_columns_not_listed() {
        let t = table(&["A", "B"], &[&["x", ""], &["", "y"]]);
        assert_eq!(n(count(&t, &[1], Some("values"))), 1.0);
        assert_eq!(n(count(&t, &[0, 1], Some("empty"))), 2.0);
    }
}
