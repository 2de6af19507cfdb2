//! Formula evaluation against a table.
//!
//! [`CalculationEngine`] holds a dispatch table from [`FormulaFunction`] to a
//! pure strategy function. Strategies receive the table, the resolved column
//! indices and the raw modifier, and never fail: cells they cannot interpret
//! are skipped.

mod aggregate;
mod temporal;

use crate::core::formula::{parse_formula, FormulaFunction, ParsedFormula};
use crate::core::table::Table;
use crate::{Result, TablesmithError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The scalar produced by a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalculationValue {
    Number(f64),
    Text(String),
}

impl CalculationValue {
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for CalculationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A calculation strategy: `(table, column indices, modifier) -> value`.
pub type Strategy = fn(&Table, &[usize], Option<&str>) -> CalculationValue;

/// Evaluates parsed formulas through a fixed table of strategies.
#[derive(Clone)]
pub struct CalculationEngine {
    strategies: HashMap<FormulaFunction, Strategy>,
}

impl fmt::Debug for CalculationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&str> = self.strategies.keys().map(|k| k.as_str()).collect();
        functions.sort_unstable();
        f.debug_struct("CalculationEngine")
            .field("functions", &functions)
            .finish()
    }
}

impl Default for CalculationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculationEngine {
    /// Creates an engine with every built-in function registered.
    pub fn new() -> Self {
        let mut engine = Self::empty();
        engine.register(FormulaFunction::Count, aggregate::count);
        engine.register(FormulaFunction::Sum, aggregate::sum);
        engine.register(FormulaFunction::Average, aggregate::average);
        engine.register(FormulaFunction::Min, aggregate::min);
        engine.register(FormulaFunction::Max, aggregate::max);
        engine.register(FormulaFunction::Median, aggregate::median);
        engine.register(FormulaFunction::Mode, aggregate::mode);
        engine.register(FormulaFunction::StdDev, aggregate::std_dev);
        engine.register(FormulaFunction::Variance, aggregate::variance);
        engine.register(FormulaFunction::Percentage, aggregate::percentage);
        engine.register(FormulaFunction::TimeEarliest, temporal::time_earliest);
        engine.register(FormulaFunction::TimeLatest, temporal::time_latest);
        engine.register(FormulaFunction::TimeSpan, temporal::time_span);
        engine
    }

    /// Creates an engine with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Installs `strategy` for `function`, returning the one it replaced.
    pub fn register(&mut self, function: FormulaFunction, strategy: Strategy) -> Option<Strategy> {
        self.strategies.insert(function, strategy)
    }

    /// Removes the strategy for `function`.
    pub fn unregister(&mut self, function: FormulaFunction) -> Option<Strategy> {
        self.strategies.remove(&function)
    }

    #[must_use]
    pub fn supports(&self, function: FormulaFunction) -> bool {
        self.strategies.contains_key(&function)
    }

    /// Parses `formula` and evaluates it against `table`.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::Formula`] if the formula does not parse, plus
    /// any error from [`evaluate`](Self::evaluate).
    pub fn calculate(&self, table: &Table, formula: &str) -> Result<CalculationValue> {
        let parsed = parse_formula(formula)?;
        self.evaluate(table, &parsed)
    }

    /// Evaluates an already parsed formula against `table`.
    ///
    /// Columns are matched against header display text, not field ids.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::ColumnNotFound`] for the first column that is
    /// not a header, or [`TablesmithError::UnsupportedFunction`] if no strategy
    /// is registered for the function.
    pub fn evaluate(&self, table: &Table, formula: &ParsedFormula) -> Result<CalculationValue> {
        let columns = formula
            .columns
            .iter()
            .map(|name| {
                table
                    .column_index(name)
                    .ok_or_else(|| TablesmithError::ColumnNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let strategy = self
            .strategies
            .get(&formula.function)
            .ok_or_else(|| TablesmithError::UnsupportedFunction(formula.function.to_string()))?;

        let value = strategy(table, &columns, formula.modifier.as_deref());
        log::debug!("Evaluated {formula} -> {value}");
        Ok(value)
    }
}

/// Cell contents of `columns`, row by row.
fn column_values<'a>(table: &'a Table, columns: &'a [usize]) -> impl Iterator<Item = &'a str> + 'a {
    table.cells.iter().flat_map(move |row| {
        columns
            .iter()
            .filter_map(move |&c| row.get(c).map(|cell| cell.content.as_str()))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::table::{Alignment, Cell, Header, Table, TablePosition};

    /// Builds a table from column names and row-major string values.
    pub(crate) fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers
                .iter()
                .enumerate()
                .map(|(i, h)| Header {
                    field: format!("col{}", i + 1),
                    content: h.to_string(),
                    alignment: Alignment::Left,
                })
                .collect(),
            cells: rows
                .iter()
                .map(|r| r.iter().map(|c| Cell::new(*c)).collect())
                .collect(),
            position: TablePosition {
                file_path: "test.md".to_string(),
                start_line: 0,
                end_line: rows.len() + 1,
                selection: None,
            },
            anchor_id: None,
        }
    }

    /// Builds a single-column table named `A`.
    pub(crate) fn column(values: &[&str]) -> Table {
        let rows: Vec<Vec<&str>> = values.iter().map(|v| vec![*v]).collect();
        let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        table(&["A"], &rows)
    }
}
