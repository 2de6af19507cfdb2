//! Core library for Tablesmith: edit pipe tables inside text documents and
//! bind formulas to them.
//!
//! The primary entry point is [`Workspace`], which reads documents through a
//! [`DocumentStore`], writes results through a [`MetadataStore`] and keeps
//! saved calculations in its [`Settings`]. The lower layers are usable on
//! their own: [`parse_tables`] finds tables in text, [`generate_table_text`]
//! renders one back, [`reconcile`] patches edited tables into a document and
//! [`CalculationEngine`] evaluates formulas such as `Sum([Price])`.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    calculation::{CalculationEngine, CalculationValue, Strategy},
    dates::{format_date, parse_date, DEFAULT_DATE_FORMAT},
    document::{DocumentStore, FsDocumentStore, MemoryDocumentStore, MetadataStore},
    error::{Result, TablesmithError},
    formula::{parse_formula, FormulaError, FormulaFunction, ParsedFormula, TimeUnit},
    frontmatter::FrontmatterStore,
    generator::{generate_table_lines, generate_table_text},
    parser::{parse_table, parse_tables, validate_table},
    patch::{reconcile, PatchOutcome},
    settings::{load_settings, save_settings, Settings},
    store::{CalculationConfig, CalculationOutput, CalculationStore, OutputKind, SavedCalculation},
    table::{is_valid_anchor_id, new_anchor_id, Alignment, Cell, CellType, Header, Selection, Table, TablePosition},
    workspace::Workspace,
};
