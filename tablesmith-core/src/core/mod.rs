//! Internal domain modules for the Tablesmith core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod calculation;
pub mod dates;
pub mod document;
pub mod error;
pub mod formula;
pub mod frontmatter;
pub mod generator;
pub mod parser;
pub mod patch;
pub mod settings;
pub mod store;
pub mod table;
pub mod workspace;

#[doc(inline)]
pub use calculation::{CalculationEngine, CalculationValue, Strategy};
#[doc(inline)]
pub use document::{DocumentStore, FsDocumentStore, MemoryDocumentStore, MetadataStore};
#[doc(inline)]
pub use error::{Result, TablesmithError};
#[doc(inline)]
pub use formula::{parse_formula, FormulaError, FormulaFunction, ParsedFormula, TimeUnit};
#[doc(inline)]
pub use frontmatter::FrontmatterStore;
#[doc(inline)]
pub use generator::{generate_table_lines, generate_table_text};
#[doc(inline)]
pub use parser::{parse_table, parse_tables, validate_table};
#[doc(inline)]
pub use patch::{reconcile, PatchOutcome};
#[doc(inline)]
pub use settings::{load_settings, save_settings, Settings};
#[doc(inline)]
pub use store::{CalculationConfig, CalculationOutput, CalculationStore, OutputKind, SavedCalculation};
#[doc(inline)]
pub use table::{Alignment, Cell, CellType, Header, Selection, Table, TablePosition};
#[doc(inline)]
pub use workspace::Workspace;
