//! Parser for the formula mini-language.
//!
//! A formula names one function, a bracketed list of column display names,
//! and an optional quoted modifier:
//!
//! ```text
//! Sum([Price])
//! Count([Status], 'unique')
//! TimeSpan([Start, End], "yyyy-MM-dd:hours")
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static FORMULA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*\[([^\]]*)\]\s*(?:,\s*(?:'([^']*)'|"([^"]*)")\s*)?\)\s*$"#,
    )
    .unwrap()
});

/// Errors raised while parsing a formula string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("invalid formula format: {0}")]
    InvalidFormat(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid column list: {0}")]
    InvalidColumns(String),
}

/// The fixed set of functions a formula may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaFunction {
    Count,
    Sum,
    Average,
    Min,
    Max,
    Median,
    Mode,
    StdDev,
    Variance,
    Percentage,
    TimeEarliest,
    TimeLatest,
    TimeSpan,
}

impl FormulaFunction {
    pub const ALL: [FormulaFunction; 13] = [
        Self::Count,
        Self::Sum,
        Self::Average,
        Self::Min,
        Self::Max,
        Self::Median,
        Self::Mode,
        Self::StdDev,
        Self::Variance,
        Self::Percentage,
        Self::TimeEarliest,
        Self::TimeLatest,
        Self::TimeSpan,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Sum => "Sum",
            Self::Average => "Average",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Median => "Median",
            Self::Mode => "Mode",
            Self::StdDev => "StdDev",
            Self::Variance => "Variance",
            Self::Percentage => "Percentage",
            Self::TimeEarliest => "TimeEarliest",
            Self::TimeLatest => "TimeLatest",
            Self::TimeSpan => "TimeSpan",
        }
    }

    /// True for the functions that read their columns as dates.
    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::TimeEarliest | Self::TimeLatest | Self::TimeSpan)
    }
}

impl fmt::Display for FormulaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormulaFunction {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|func| func.as_str() == s)
            .ok_or_else(|| FormulaError::UnknownFunction(s.to_string()))
    }
}

/// Unit of a `TimeSpan` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    #[default]
    Days,
    Hours,
    Minutes,
}

impl TimeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "days" => Some(Self::Days),
            "hours" => Some(Self::Hours),
            "minutes" => Some(Self::Minutes),
            _ => None,
        }
    }
}

/// A formula broken into its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFormula {
    pub function: FormulaFunction,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

/// Splits a temporal modifier into its date format and unit.
///
/// The modifier packs `format:unit`; the split happens at the last `:` and
/// only when the suffix is a known unit, so formats such as
/// `yyyy-MM-dd HH:mm` keep their colons. A bare unit is accepted too.
pub fn split_time_modifier(modifier: Option<&str>) -> (Option<&str>, TimeUnit) {
    let Some(modifier) = modifier.filter(|m| !m.trim().is_empty()) else {
        return (None, TimeUnit::default());
    };
    if let Some(unit) = TimeUnit::parse(modifier) {
        return (None, unit);
    }
    match modifier.rsplit_once(':') {
        Some((format, unit)) => match TimeUnit::parse(unit) {
            Some(unit) => (Some(format).filter(|f| !f.trim().is_empty()), unit),
            None => (Some(modifier), TimeUnit::default()),
        },
        None => (Some(modifier), TimeUnit::default()),
    }
}

impl ParsedFormula {
    /// The date format and unit packed into this formula's modifier.
    #[must_use]
    pub fn time_modifier(&self) -> (Option<&str>, TimeUnit) {
        split_time_modifier(self.modifier.as_deref())
    }
}

impl fmt::Display for ParsedFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}([{}]", self.function, self.columns.join(", "))?;
        if let Some(modifier) = &self.modifier {
            if modifier.contains('\'') {
                write!(f, ", \"{modifier}\"")?;
            } else {
                write!(f, ", '{modifier}'")?;
            }
        }
        f.write_str(")")
    }
}

/// Parses a formula string.
///
/// # Errors
///
/// - [`FormulaError::InvalidFormat`] when the text does not have the
///   `Name([columns], 'modifier')` shape.
/// - [`FormulaError::UnknownFunction`] when the name is not a known function.
/// - [`FormulaError::InvalidColumns`] when the column list is empty or any
///   column name is blank.
pub fn parse_formula(formula: &str) -> Result<ParsedFormula, FormulaError> {
    let caps = FORMULA
        .captures(formula)
        .ok_or_else(|| FormulaError::InvalidFormat(formula.trim().to_string()))?;

    let function: FormulaFunction = caps[1].parse()?;

    let columns: Vec<String> = caps[2].split(',').map(|c| c.trim().to_string()).collect();
    if columns.iter().any(String::is_empty) {
        return Err(FormulaError::InvalidColumns(format!("[{}]", &caps[2])));
    }

    let modifier = caps
        .get(3)
        .or_else(|| caps.get(4))
        .map(|m| m.as_str().to_string());

    Ok(ParsedFormula {
        function,
        columns,
        modifier,
    })
}
