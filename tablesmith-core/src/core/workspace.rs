//! High-level table and calculation operations over a set of documents.

use crate::core::settings::{load_settings, save_settings};
use crate::core::table::{is_valid_anchor_id, new_anchor_id};
use crate::{
    parse_formula, parse_tables, reconcile, CalculationEngine, CalculationOutput,
    CalculationStore, CalculationValue, DocumentStore, MetadataStore, OutputKind, Result,
    SavedCalculation, Settings, Table, TablesmithError,
};
use std::path::{Path, PathBuf};

/// An open Tablesmith workspace.
///
/// `Workspace` is the primary interface for every document mutation. It reads
/// and writes whole documents through a [`DocumentStore`], writes calculation
/// results through a [`MetadataStore`], and keeps saved calculations in its
/// [`Settings`].
///
/// All mutations take `&mut self`, so at most one edit cycle runs per
/// workspace at a time.
#[derive(Debug)]
pub struct Workspace<D: DocumentStore, M: MetadataStore> {
    documents: D,
    metadata: M,
    engine: CalculationEngine,
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl<D: DocumentStore, M: MetadataStore> Workspace<D, M> {
    /// Creates a workspace whose settings live only in memory.
    pub fn new(documents: D, metadata: M) -> Self {
        Self {
            documents,
            metadata,
            engine: CalculationEngine::new(),
            settings: Settings::default(),
            settings_path: None,
        }
    }

    /// Opens a workspace whose settings are loaded from, and saved to,
    /// `settings_path`. A missing or unreadable file starts from defaults.
    pub fn open<P: AsRef<Path>>(documents: D, metadata: M, settings_path: P) -> Self {
        let path = settings_path.as_ref().to_path_buf();
        let settings = load_settings(&path);
        log::info!(
            "Opened workspace with {} bound table(s) from {}",
            settings.calculations.anchors().count(),
            path.display()
        );
        Self {
            documents,
            metadata,
            engine: CalculationEngine::new(),
            settings,
            settings_path: Some(path),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn calculations(&self) -> &CalculationStore {
        &self.settings.calculations
    }

    pub fn engine(&self) -> &CalculationEngine {
        &self.engine
    }

    /// Mutable access for registering or removing strategies.
    pub fn engine_mut(&mut self) -> &mut CalculationEngine {
        &mut self.engine
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Changes the prefix used for newly generated anchors.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidAnchorPrefix`] unless `prefix` starts
    /// with an ASCII letter or digit and contains only letters, digits and `-`.
    pub fn set_anchor_prefix(&mut self, prefix: &str) -> Result<()> {
        if !is_valid_anchor_id(prefix) {
            return Err(TablesmithError::InvalidAnchorPrefix(prefix.to_string()));
        }
        self.settings.anchor_prefix = prefix.to_string();
        self.persist_settings();
        Ok(())
    }

    // ── Tables ──────────────────────────────────────────────────────

    /// Parses every table in the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns any error from the document store.
    pub fn tables(&self, path: &str) -> Result<Vec<Table>> {
        let text = self.documents.read(path)?;
        Ok(parse_tables(&text, path))
    }

    /// Parses the active document and returns its path with its tables.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::NoActiveDocument`] if no document is active.
    pub fn active_tables(&self) -> Result<(String, Vec<Table>)> {
        let path = self
            .documents
            .active_document_path()
            .ok_or(TablesmithError::NoActiveDocument)?;
        let tables = self.tables(&path)?;
        Ok((path, tables))
    }

    /// Finds the table carrying `anchor_id` in the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::TableNotFound`] if no table has that anchor.
    pub fn table_by_anchor(&self, path: &str, anchor_id: &str) -> Result<Table> {
        self.tables(path)?
            .into_iter()
            .find(|t| t.anchor_id.as_deref() == Some(anchor_id))
            .ok_or_else(|| TablesmithError::TableNotFound(anchor_id.to_string()))
    }

    /// Writes `edited` back over `original` in the document at `path` and
    /// returns the edited tables at their new positions.
    ///
    /// `original` must be what [`tables`](Self::tables) returns for the
    /// document as it is now. The document is written once, and only if the
    /// text changed.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::StaleDocument`] if the document no longer
    /// parses to `original`, plus any error from [`reconcile`].
    pub fn save_tables(&mut self, path: &str, original: &[Table], edited: &[Table]) -> Result<Vec<Table>> {
        let text = self.documents.read(path)?;
        let current = parse_tables(&text, path);
        let unchanged = current.len() == original.len()
            && current.iter().zip(original).all(|(c, o)| {
                c.position.start_line == o.position.start_line
                    && c.position.end_line == o.position.end_line
                    && c.same_rendering(o)
            });
        if !unchanged {
            return Err(TablesmithError::StaleDocument(path.to_string()));
        }

        let outcome = reconcile(
            &text,
            &current,
            edited,
            &self.settings.calculations,
            &self.settings.anchor_prefix,
        )?;
        if outcome.text != text {
            self.documents.write(path, &outcome.text)?;
            log::info!("Saved {} table(s) to {path}", outcome.tables.len());
        }
        Ok(outcome.tables)
    }

    // ── Calculations ────────────────────────────────────────────────

    /// Evaluates `formula` against `table` without binding it.
    ///
    /// # Errors
    ///
    /// Returns any error from [`CalculationEngine::calculate`].
    pub fn evaluate(&self, table: &Table, formula: &str) -> Result<CalculationValue> {
        self.engine.calculate(table, formula)
    }

    /// Evaluates `formula` against `table`, writes the result to `output` and
    /// saves the binding. Returns the table's anchor and the value.
    ///
    /// A table without an anchor gets one first, which rewrites the document.
    ///
    /// # Errors
    ///
    /// Formula, column and output errors are raised before anything is
    /// written. Returns [`TablesmithError::StaleDocument`] if `table` is no
    /// longer in the document where it was parsed.
    pub fn bind_calculation(
        &mut self,
        path: &str,
        table: &Table,
        formula: &str,
        output: CalculationOutput,
    ) -> Result<(String, CalculationValue)> {
        let value = self.engine.calculate(table, formula)?;
        validate_output(table, &output)?;

        let anchor = self.ensure_anchor(path, table)?;
        self.write_output(path, &anchor, &output, &value)?;

        let calculations = &mut self.settings.calculations;
        let index = calculations.add(&anchor, formula.to_string(), output);
        calculations.record_result(&anchor, index, &value)?;
        self.persist_settings();

        log::info!("Bound {formula} to {anchor} in {path} -> {value}");
        Ok((anchor, value))
    }

    /// Re-runs one saved calculation against the table's current content.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::CalculationNotFound`] or
    /// [`TablesmithError::TableNotFound`] if the binding or its table is gone.
    pub fn execute_calculation(&mut self, path: &str, anchor_id: &str, index: usize) -> Result<CalculationValue> {
        let saved = self.saved(anchor_id, index)?;
        let table = self.table_by_anchor(path, anchor_id)?;
        let value = self.engine.calculate(&table, &saved.config.formula)?;
        self.write_output(path, anchor_id, &saved.config.output, &value)?;

        self.settings.calculations.record_result(anchor_id, index, &value)?;
        self.persist_settings();

        log::info!("Executed {} on {anchor_id} -> {value}", saved.config.formula);
        Ok(value)
    }

    /// Re-runs every calculation bound to `anchor_id`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing calculation.
    pub fn recalculate_table(&mut self, path: &str, anchor_id: &str) -> Result<Vec<CalculationValue>> {
        let count = self.settings.calculations.get(anchor_id).len();
        (0..count)
            .map(|index| self.execute_calculation(path, anchor_id, index))
            .collect()
    }

    /// Re-runs every calculation bound to a table in the document at `path`
    /// and returns how many ran.
    ///
    /// # Errors
    ///
    /// Stops at the first failing calculation.
    pub fn recalculate_document(&mut self, path: &str) -> Result<usize> {
        let anchors: Vec<String> = self
            .tables(path)?
            .into_iter()
            .filter_map(|t| t.anchor_id)
            .filter(|a| self.settings.calculations.has_calculations(a))
            .collect();
        let mut executed = 0;
        for anchor in &anchors {
            executed += self.recalculate_table(path, anchor)?.len();
        }
        log::info!("Recalculated {executed} calculation(s) in {path}");
        Ok(executed)
    }

    /// Replaces the formula and output of a saved calculation and runs it.
    ///
    /// A frontmatter key that changes name is renamed in place; a frontmatter
    /// output that becomes a cell output has its key removed.
    ///
    /// # Errors
    ///
    /// Formula, column and output errors are raised before anything is written.
    pub fn update_calculation(
        &mut self,
        path: &str,
        anchor_id: &str,
        index: usize,
        formula: &str,
        output: CalculationOutput,
    ) -> Result<CalculationValue> {
        parse_formula(formula)?;
        let saved = self.saved(anchor_id, index)?;
        let table = self.table_by_anchor(path, anchor_id)?;
        let value = self.engine.calculate(&table, formula)?;
        validate_output(&table, &output)?;

        let old = &saved.config.output;
        if old.kind == OutputKind::Frontmatter {
            match output.kind {
                OutputKind::Frontmatter if old.value != output.value => {
                    self.metadata.rename_key(path, &old.value, &output.value)?;
                }
                OutputKind::Cell => self.metadata.delete_key(path, &old.value)?,
                OutputKind::Frontmatter => {}
            }
        }
        self.write_output(path, anchor_id, &output, &value)?;

        let calculations = &mut self.settings.calculations;
        calculations.update(anchor_id, index, formula.to_string(), output)?;
        calculations.record_result(anchor_id, index, &value)?;
        self.persist_settings();

        log::info!("Updated calculation {anchor_id}#{index} to {formula} -> {value}");
        Ok(value)
    }

    /// Removes a saved calculation and the frontmatter key it wrote.
    ///
    /// Values already written into table cells stay in the table.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::CalculationNotFound`] if there is no such binding.
    pub fn delete_calculation(&mut self, path: &str, anchor_id: &str, index: usize) -> Result<SavedCalculation> {
        let saved = self.saved(anchor_id, index)?;
        if saved.config.output.kind == OutputKind::Frontmatter {
            self.metadata.delete_key(path, &saved.config.output.value)?;
        }
        let removed = self.settings.calculations.remove(anchor_id, index)?;
        self.persist_settings();
        log::info!("Deleted calculation {anchor_id}#{index} ({})", removed.config.formula);
        Ok(removed)
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Saves settings now, returning any failure.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::Io`] or [`TablesmithError::Json`] if the
    /// settings file cannot be written.
    pub fn flush_settings(&self) -> Result<()> {
        match &self.settings_path {
            Some(path) => save_settings(path, &self.settings),
            None => Ok(()),
        }
    }

    /// Best-effort save after a mutation. A failure is logged and the next
    /// mutation writes the whole settings document again.
    fn persist_settings(&self) {
        if let Err(e) = self.flush_settings() {
            log::warn!("Failed to save settings: {e}");
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn saved(&self, anchor_id: &str, index: usize) -> Result<SavedCalculation> {
        self.settings
            .calculations
            .get(anchor_id)
            .get(index)
            .cloned()
            .ok_or_else(|| TablesmithError::CalculationNotFound(format!("{anchor_id}#{index}")))
    }

    /// Returns `table`'s anchor, writing a new one into the document if it
    /// has none.
    fn ensure_anchor(&self, path: &str, table: &Table) -> Result<String> {
        if let Some(anchor) = &table.anchor_id {
            self.table_by_anchor(path, anchor)?;
            return Ok(anchor.clone());
        }

        let text = self.documents.read(path)?;
        let current = parse_tables(&text, path);
        let index = current
            .iter()
            .position(|c| c.position.start_line == table.position.start_line && c.same_content(table))
            .ok_or_else(|| TablesmithError::StaleDocument(path.to_string()))?;

        let anchor = new_anchor_id(&self.settings.anchor_prefix);
        let mut edited = current.clone();
        edited[index].anchor_id = Some(anchor.clone());
        let outcome = reconcile(
            &text,
            &current,
            &edited,
            &self.settings.calculations,
            &self.settings.anchor_prefix,
        )?;
        self.documents.write(path, &outcome.text)?;
        log::info!("Anchored table at {path}:{} as {anchor}", table.position.start_line + 1);
        Ok(anchor)
    }

    fn write_output(
        &self,
        path: &str,
        anchor_id: &str,
        output: &CalculationOutput,
        value: &CalculationValue,
    ) -> Result<()> {
        match output.kind {
            OutputKind::Frontmatter => self.metadata.set_key(path, &output.value, &value.to_string()),
            OutputKind::Cell => {
                let text = self.documents.read(path)?;
                let current = parse_tables(&text, path);
                let index = current
                    .iter()
                    .position(|t| t.anchor_id.as_deref() == Some(anchor_id))
                    .ok_or_else(|| TablesmithError::TableNotFound(anchor_id.to_string()))?;
                let (row, column) = cell_target(&current[index], &output.value)?;

                let mut edited = current.clone();
                edited[index].set_cell(row, column, value.to_string())?;
                let outcome = reconcile(
                    &text,
                    &current,
                    &edited,
                    &self.settings.calculations,
                    &self.settings.anchor_prefix,
                )?;
                if outcome.text != text {
                    self.documents.write(path, &outcome.text)?;
                }
                Ok(())
            }
        }
    }
}

/// Resolves a `row:column` cell address against `table`.
///
/// The row is zero-based; the column is a header's display text and may
/// itself contain `:`.
fn cell_target(table: &Table, address: &str) -> Result<(usize, usize)> {
    let invalid = |reason: &str| TablesmithError::InvalidOutput(format!("cell '{address}': {reason}"));
    let (row, column) = address
        .split_once(':')
        .ok_or_else(|| invalid("expected row:column"))?;
    let row: usize = row.trim().parse().map_err(|_| invalid("row is not a number"))?;
    if row >= table.row_count() {
        return Err(invalid("row out of range"));
    }
    let column = table
        .column_index(column)
        .ok_or_else(|| invalid("no such column"))?;
    Ok((row, column))
}

fn validate_output(table: &Table, output: &CalculationOutput) -> Result<()> {
    match output.kind {
        OutputKind::Frontmatter if output.value.trim().is_empty() || output.value.contains(':') => Err(
            TablesmithError::InvalidOutput(format!("'{}' is not a valid frontmatter key", output.value)),
        ),
        OutputKind::Frontmatter => Ok(()),
        OutputKind::Cell => cell_target(table, &output.value).map(|_| ()),
    }
}
