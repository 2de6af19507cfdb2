//! Reconciliation of edited tables back into their host document.
//!
//! Original table positions come from the last parse of `original_text` and
//! are never recomputed from partially patched text. A running line offset
//! carries the growth or shrinkage of earlier tables forward to later ones.

use crate::core::generator::generate_table_lines;
use crate::core::parser::{carriage_return, validate_table};
use crate::core::store::CalculationStore;
use crate::core::table::{is_valid_anchor_id, new_anchor_id, Table, TablePosition};
use crate::{Result, TablesmithError};

/// The patched document and the edited tables at their new positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub text: String,
    pub tables: Vec<Table>,
}

/// Fold state: lines shifted so far, the document being rebuilt, and the
/// tables already placed.
struct PatchState {
    offset: isize,
    lines: Vec<String>,
    tables: Vec<Table>,
}

/// Collapses the blank run after `after` to exactly one blank line.
///
/// Returns the change in line count. Nothing happens when no non-blank line
/// follows.
fn normalize_spacing(lines: &mut Vec<String>, after: usize, cr: &str) -> isize {
    let Some(next) = (after..lines.len()).find(|&i| !lines[i].trim().is_empty()) else {
        return 0;
    };
    let blanks = next - after;
    lines.splice(after..next, std::iter::once(cr.to_string()));
    1 - blanks as isize
}

/// Generated lines for `table`, terminated to fit the lines they replace.
///
/// Every line but the last takes `cr`; the last keeps whatever the replaced
/// last line had, so a table at the end of unterminated text stays that way.
fn rendered_lines(table: &Table, cr: &str, last_cr: &str) -> Vec<String> {
    let mut rendered = generate_table_lines(table);
    let count = rendered.len();
    for (i, line) in rendered.iter_mut().enumerate() {
        line.push_str(if i + 1 == count { last_cr } else { cr });
    }
    rendered
}

/// Rewrites `original_text` so each table in `original_tables` is replaced by
/// its counterpart in `edited_tables`.
///
/// Tables are paired by index. An edited table whose rendering matches the
/// original is left byte-for-byte untouched, so patching with no edits
/// returns the text unchanged. Changed tables are regenerated and the blank
/// lines before the next content are normalized to one.
///
/// An anchor is assigned when a table's cell content changed or it has
/// calculations in `store`; an existing anchor is always kept.
///
/// # Errors
///
/// Returns [`TablesmithError::InvalidTableStructure`] if the table lists
/// differ in length, an edited table fails validation or carries an anchor
/// that cannot be written, or an original position ends before it starts.
/// Returns [`TablesmithError::InvalidAnchorPrefix`] for a prefix that would
/// produce unreadable anchors, and [`TablesmithError::StaleDocument`] if an
/// original position lies outside the text. No partial result is produced.
///
/// CRLF text stays CRLF: rewritten lines take the document's line ending.
pub fn reconcile(
    original_text: &str,
    original_tables: &[Table],
    edited_tables: &[Table],
    store: &CalculationStore,
    anchor_prefix: &str,
) -> Result<PatchOutcome> {
    if original_tables.len() != edited_tables.len() {
        return Err(TablesmithError::InvalidTableStructure(format!(
            "expected {} edited tables, got {}",
            original_tables.len(),
            edited_tables.len()
        )));
    }
    if let Some(bad) = edited_tables.iter().position(|t| !validate_table(t)) {
        return Err(TablesmithError::InvalidTableStructure(format!(
            "edited table {bad} has rows that do not match its headers"
        )));
    }
    if let Some(bad) = edited_tables
        .iter()
        .filter_map(|t| t.anchor_id.as_deref())
        .find(|id| !is_valid_anchor_id(id))
    {
        return Err(TablesmithError::InvalidTableStructure(format!(
            "anchor '{bad}' cannot be written as an anchor line"
        )));
    }

    if !is_valid_anchor_id(anchor_prefix) {
        return Err(TablesmithError::InvalidAnchorPrefix(anchor_prefix.to_string()));
    }

    let initial = PatchState {
        offset: 0,
        lines: original_text.split('\n').map(str::to_string).collect(),
        tables: Vec::with_capacity(edited_tables.len()),
    };
    let last = edited_tables.len().saturating_sub(1);
    let cr = carriage_return(original_text);

    let state = original_tables
        .iter()
        .zip(edited_tables)
        .enumerate()
        .try_fold(initial, |mut state, (index, (original, edited))| {
            let stale = || TablesmithError::StaleDocument(original.position.file_path.clone());
            let start = original
                .position
                .start_line
                .checked_add_signed(state.offset)
                .ok_or_else(stale)?;
            let old_len = original.position.line_count().ok_or_else(|| {
                TablesmithError::InvalidTableStructure(format!(
                    "table {index} ends on line {} before it starts on line {}",
                    original.position.end_line, original.position.start_line
                ))
            })?;
            if start + old_len > state.lines.len() {
                return Err(stale());
            }

            let mut table = edited.clone();
            table.anchor_id = original.anchor_id.clone().or_else(|| edited.anchor_id.clone());
            let content_changed = !edited.same_content(original);
            let bound = [&edited.anchor_id, &original.anchor_id]
                .into_iter()
                .flatten()
                .any(|anchor| store.has_calculations(anchor));
            if (content_changed || bound) && table.anchor_id.is_none() {
                table.anchor_id = Some(new_anchor_id(anchor_prefix));
            }

            if table.same_rendering(original) {
                table.position = TablePosition {
                    start_line: start,
                    end_line: start + old_len - 1,
                    ..edited.position.clone()
                };
                log::debug!("Table {index} unchanged at line {start}");
                state.tables.push(table);
                return Ok(state);
            }

            let last_cr = if state.lines[start + old_len - 1].ends_with('\r') { "\r" } else { "" };
            let rendered = rendered_lines(&table, cr, last_cr);
            let new_len = rendered.len();
            state.lines.splice(start..start + old_len, rendered);

            let spacing = if index < last {
                normalize_spacing(&mut state.lines, start + new_len, cr)
            } else {
                0
            };
            log::debug!(
                "Table {index} rewritten at line {start}: {old_len} -> {new_len} lines, spacing {spacing:+}"
            );

            table.position = TablePosition {
                file_path: original.position.file_path.clone(),
                start_line: start,
                end_line: start + new_len - 1,
                selection: edited.position.selection.clone(),
            };
            state.offset += new_len as isize - old_len as isize + spacing;
            state.tables.push(table);
            Ok(state)
        })?;

    Ok(PatchOutcome {
        text: state.lines.join("\n"),
        tables: state.tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_tables;
    use crate::core::store::CalculationOutput;

    const PREFIX: &str = "table";

    fn three_tables() -> String {
        [
            "# Report",
            "",
            "| A | B |",
            "| --- | --- |",
            "| 1 | 2 |",
            "",
            "Middle paragraph.",
            "",
            "| Item | Qty |",
            "| ---- | --- |",
            "| x | 1 |",
            "| y | 2 |",
            "^table-mid",
            "",
            "| Last | Col |",
            "| ---- | --- |",
            "| z | 9 |",
            "",
            "The end.",
        ]
        .join("\n")
    }

    #[test]
    fn test_no_edits_is_identity() {
        let text = "intro\n\n|a|b|\n|:-|-:|\n|1|2|\n\n\n\n| c |\n| --- |\n| 3 |\ntrailing\n";
        let tables = parse_tables(text, "doc.md");
        assert_eq!(tables.len(), 2);
        let outcome = reconcile(text, &tables, &tables, &CalculationStore::new(), PREFIX).unwrap();
        assert_eq!(outcome.text, text);
        assert_eq!(outcome.tables, tables);
    }

    #[test]
    fn test_growing_middle_table_shifts_later_table() {
        let text = three_tables();
        let original = parse_tables(&text, "doc.md");
        assert_eq!(original.len(), 3);
        let mut edited = original.clone();
        for i in 0..3 {
            edited[1].insert_row(2 + i, vec![format!("new{i}"), "0".into()]).unwrap();
        }

        let outcome = reconcile(&text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        let lines: Vec<&str> = outcome.text.lines().collect();

        // Single blank lines already separate the tables, so spacing adds nothing.
        let expected = original[2].position.start_line + (5 - 2);
        assert_eq!(lines[expected], "| Last | Col |");
        assert_eq!(outcome.tables[2].position.start_line, expected);
        assert_eq!(outcome.tables[1].position.end_line, 15);
        assert_eq!(lines[15], "^table-mid");
        assert_eq!(lines[0], "# Report");
        assert_eq!(lines[6], "Middle paragraph.");
        assert_eq!(*lines.last().unwrap(), "The end.");

        let reparsed = parse_tables(&outcome.text, "doc.md");
        assert_eq!(reparsed.len(), 3);
        assert_eq!(reparsed[1].cells.len(), 5);
        assert_eq!(reparsed[2].position, outcome.tables[2].position);
    }

    #[test]
    fn test_changed_table_gets_anchor_and_spacing_is_normalized() {
        let text = "| A |\n| --- |\n| 1 |\n\n\n\n| B |\n| --- |\n| 2 |";
        let original = parse_tables(text, "doc.md");
        let mut edited = original.clone();
        edited[0].set_cell(0, 0, "10").unwrap();

        let outcome = reconcile(text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        let anchor = outcome.tables[0].anchor_id.clone().expect("anchor assigned");
        assert!(anchor.starts_with("table-"));
        assert_eq!(
            outcome.text,
            format!("| A |\n| --- |\n| 10 |\n^{anchor}\n\n| B |\n| --- |\n| 2 |")
        );
        // +1 anchor line, -2 blank lines
        assert_eq!(outcome.tables[1].position.start_line, original[1].position.start_line - 1);
        assert_eq!(outcome.tables[1].anchor_id, None);
    }

    #[test]
    fn test_shrinking_table_shifts_later_tables_up() {
        let text = "| A |\n| --- |\n| 1 |\n| 2 |\n| 3 |\n^t-a\n\n| B |\n| --- |\n| 4 |\n^t-b";
        let original = parse_tables(text, "doc.md");
        let mut edited = original.clone();
        edited[0].remove_row(0).unwrap();
        edited[0].remove_row(0).unwrap();
        edited[1].set_cell(0, 0, "40").unwrap();

        let outcome = reconcile(text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        assert_eq!(
            outcome.text,
            "| A |\n| --- |\n| 3 |\n^t-a\n\n| B |\n| --- |\n| 40 |\n^t-b"
        );
        assert_eq!(outcome.tables[1].position.start_line, 5);
    }

    #[test]
    fn test_bound_table_gets_anchor_without_content_change() {
        let text = "| A |\n| --- |\n| 1 |";
        let original = parse_tables(text, "doc.md");
        let mut edited = original.clone();
        edited[0].anchor_id = Some("table-bound".into());
        let mut store = CalculationStore::new();
        store.add("table-bound", "Sum([A])".into(), CalculationOutput::frontmatter("total"));

        let outcome = reconcile(text, &original, &edited, &store, PREFIX).unwrap();
        assert_eq!(outcome.text, "| A |\n| --- |\n| 1 |\n^table-bound");
    }

    #[test]
    fn test_unrelated_edit_keeps_later_anchor() {
        let text = "| A |\n| --- |\n| 1 |\n\n| B |\n| --- |\n| 2 |\n^table-keep";
        let original = parse_tables(text, "doc.md");
        let mut store = CalculationStore::new();
        store.add("table-keep", "Sum([B])".into(), CalculationOutput::frontmatter("b"));
        let mut edited = original.clone();
        edited[0].add_row();
        edited[0].add_row();

        let outcome = reconcile(text, &original, &edited, &store, PREFIX).unwrap();
        let reparsed = parse_tables(&outcome.text, "doc.md");
        assert_eq!(reparsed[1].anchor_id.as_deref(), Some("table-keep"));
        assert!(store.has_calculations(reparsed[1].anchor_id.as_deref().unwrap()));
        assert_eq!(reparsed[1].position, outcome.tables[1].position);
    }

    #[test]
    fn test_existing_anchor_is_never_replaced() {
        let text = "| A |\n| --- |\n| 1 |\n^table-old";
        let original = parse_tables(text, "doc.md");
        let mut edited = original.clone();
        edited[0].anchor_id = None;
        edited[0].set_cell(0, 0, "2").unwrap();
        let outcome = reconcile(text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        assert_eq!(outcome.tables[0].anchor_id.as_deref(), Some("table-old"));
    }

    #[test]
    fn test_invalid_input_aborts_whole_patch() {
        let text = "| A |\n| --- |\n| 1 |";
        let original = parse_tables(text, "doc.md");
        let store = CalculationStore::new();

        assert!(reconcile(text, &original, &[], &store, PREFIX).is_err());

        let mut ragged = original.clone();
        ragged[0].cells[0].push(crate::core::table::Cell::new("extra"));
        let err = reconcile(text, &original, &ragged, &store, PREFIX).unwrap_err();
        assert!(matches!(err, TablesmithError::InvalidTableStructure(_)));

        let err = reconcile("short", &original, &original, &store, PREFIX).unwrap_err();
        assert!(matches!(err, TablesmithError::StaleDocument(_)));
    }

    #[test]
    fn test_spacing_is_inserted_when_content_follows_directly() {
        let text = "| A |\n| --- |\n| 1 |\nText\n| B |\n| --- |\n| 2 |";
        let original = parse_tables(text, "doc.md");
        assert_eq!(original[1].position.start_line, 4);
        let mut edited = original.clone();
        edited[0].set_cell(0, 0, "10").unwrap();

        let outcome = reconcile(text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        let anchor = outcome.tables[0].anchor_id.clone().unwrap();
        assert_eq!(
            outcome.text,
            format!("| A |\n| --- |\n| 10 |\n^{anchor}\n\nText\n| B |\n| --- |\n| 2 |")
        );
        // +1 anchor line, +1 blank line
        assert_eq!(outcome.tables[1].position.start_line, 6);
        assert_eq!(parse_tables(&outcome.text, "doc.md")[1].position, outcome.tables[1].position);
    }

    #[test]
    fn test_crlf_document_keeps_crlf() {
        let text = "intro\r\n\r\n| A |\r\n| --- |\r\n| 1 |\r\n\r\ntail\r\n";
        let original = parse_tables(text, "doc.md");
        let mut edited = original.clone();
        edited[0].set_cell(0, 0, "2").unwrap();

        let outcome = reconcile(text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        let anchor = outcome.tables[0].anchor_id.clone().unwrap();
        assert_eq!(
            outcome.text,
            format!("intro\r\n\r\n| A |\r\n| --- |\r\n| 2 |\r\n^{anchor}\r\n\r\ntail\r\n")
        );
    }

    #[test]
    fn test_crlf_spacing_and_unterminated_last_line() {
        let text = "| A |\r\n| --- |\r\n| 1 |\r\n\r\n\r\n| B |\r\n| --- |\r\n| 2 |";
        let original = parse_tables(text, "doc.md");
        let mut edited = original.clone();
        edited[0].set_cell(0, 0, "10").unwrap();
        edited[0].anchor_id = Some("t-a".into());
        edited[1].set_cell(0, 0, "20").unwrap();
        edited[1].anchor_id = Some("t-b".into());

        let outcome = reconcile(text, &original, &edited, &CalculationStore::new(), PREFIX).unwrap();
        assert_eq!(
            outcome.text,
            "| A |\r\n| --- |\r\n| 10 |\r\n^t-a\r\n\r\n| B |\r\n| --- |\r\n| 20 |\r\n^t-b"
        );
        assert!(!outcome.text.replace("\r\n", "").contains('\n'));
        assert_eq!(parse_tables(&outcome.text, "doc.md")[1].position, outcome.tables[1].position);
    }

    #[test]
    fn test_inverted_position_is_rejected() {
        let text = "| A |\n| --- |\n| 1 |";
        let mut original = parse_tables(text, "doc.md");
        original[0].position.start_line = 2;
        original[0].position.end_line = 0;
        let err = reconcile(text, &original, &original, &CalculationStore::new(), PREFIX).unwrap_err();
        assert!(matches!(err, TablesmithError::InvalidTableStructure(_)));
    }

    #[test]
    fn test_unwritable_anchors_are_rejected() {
        let text = "| A |\n| --- |\n| 1 |";
        let original = parse_tables(text, "doc.md");
        let store = CalculationStore::new();

        let mut edited = original.clone();
        edited[0].anchor_id = Some("my_tbl-1".into());
        let err = reconcile(text, &original, &edited, &store, PREFIX).unwrap_err();
        assert!(matches!(err, TablesmithError::InvalidTableStructure(_)));

        for prefix in ["", "my_tbl", "tbl.x"] {
            let err = reconcile(text, &original, &original, &store, prefix).unwrap_err();
            assert!(matches!(err, TablesmithError::InvalidAnchorPrefix(_)), "prefix {prefix:?}");
        }
    }
}
