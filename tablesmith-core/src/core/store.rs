//! Saved calculation bindings, keyed by table anchor.
//!
//! The store is a plain in-memory map. It serializes transparently so it can
//! be embedded in the settings document; writing it to disk is the
//! workspace's job.

use crate::core::calculation::CalculationValue;
use crate::{Result, TablesmithError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a calculation writes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// `value` is a frontmatter key of the host document.
    Frontmatter,
    /// `value` is a `row:column` cell address inside the bound table,
    /// zero-based row, column by display name.
    Cell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOutput {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    pub value: String,
}

impl CalculationOutput {
    pub fn frontmatter(key: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Frontmatter,
            value: key.into(),
        }
    }

    pub fn cell(row: usize, column: &str) -> Self {
        Self {
            kind: OutputKind::Cell,
            value: format!("{row}:{column}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationConfig {
    pub formula: String,
    pub output: CalculationOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Unix timestamp (seconds) of the last successful execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_calculated_at: Option<i64>,
}

/// A formula bound to an output, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCalculation {
    pub config: CalculationConfig,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Map from anchor id to that table's ordered calculations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalculationStore {
    calculations: BTreeMap<String, Vec<SavedCalculation>>,
}

impl CalculationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculations bound to `anchor_id`, in creation order.
    #[must_use]
    pub fn get(&self, anchor_id: &str) -> &[SavedCalculation] {
        self.calculations
            .get(anchor_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_calculations(&self, anchor_id: &str) -> bool {
        !self.get(anchor_id).is_empty()
    }

    /// Anchor ids that have at least one calculation.
    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.calculations
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(anchor, _)| anchor.as_str())
    }

    /// Appends a new binding and returns its index.
    pub fn add(&mut self, anchor_id: &str, formula: String, output: CalculationOutput) -> usize {
        let now = chrono::Utc::now().timestamp();
        let list = self.calculations.entry(anchor_id.to_string()).or_default();
        list.push(SavedCalculation {
            config: CalculationConfig {
                formula,
                output,
                result: None,
                last_calculated_at: None,
            },
            created_at: now,
            updated_at: now,
        });
        list.len() - 1
    }

    /// Replaces the formula and output of an existing binding.
    ///
    /// The previous result is cleared since it no longer matches the formula.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::CalculationNotFound`] if there is no binding
    /// at `index`.
    pub fn update(
        &mut self,
        anchor_id: &str,
        index: usize,
        formula: String,
        output: CalculationOutput,
    ) -> Result<()> {
        let saved = self.entry_mut(anchor_id, index)?;
        saved.config.formula = formula;
        saved.config.output = output;
        saved.config.result = None;
        saved.config.last_calculated_at = None;
        saved.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    /// Stores the outcome of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::CalculationNotFound`] if there is no binding
    /// at `index`.
    pub fn record_result(&mut self, anchor_id: &str, index: usize, value: &CalculationValue) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let saved = self.entry_mut(anchor_id, index)?;
        saved.config.result = Some(value.to_string());
        saved.config.last_calculated_at = Some(now);
        saved.updated_at = now;
        Ok(())
    }

    /// Removes and returns one binding. The anchor's entry disappears with
    /// its last binding.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::CalculationNotFound`] if there is no binding
    /// at `index`.
    pub fn remove(&mut self, anchor_id: &str, index: usize) -> Result<SavedCalculation> {
        self.entry_mut(anchor_id, index)?;
        let list = self
            .calculations
            .get_mut(anchor_id)
            .ok_or_else(|| not_found(anchor_id, index))?;
        let removed = list.remove(index);
        if list.is_empty() {
            self.calculations.remove(anchor_id);
        }
        Ok(removed)
    }

    /// Removes every binding of `anchor_id`.
    pub fn remove_all(&mut self, anchor_id: &str) -> Vec<SavedCalculation> {
        self.calculations.remove(anchor_id).unwrap_or_default()
    }

    fn entry_mut(&mut self, anchor_id: &str, index: usize) -> Result<&mut SavedCalculation> {
        self.calculations
            .get_mut(anchor_id)
            .and_then(|list| list.get_mut(index))
            .ok_or_else(|| not_found(anchor_id, index))
    }
}

fn not_found(anchor_id: &str, index: usize) -> TablesmithError {
    TablesmithError::CalculationNotFound(format!("{anchor_id}#{index}"))
}
