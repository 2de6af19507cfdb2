//! Renders a [`Table`] back into canonical pipe-table text.

use crate::core::table::{Alignment, Table};

/// Shortest dash run emitted in the alignment line.
const MIN_DASHES: usize = 3;

fn escape(content: &str) -> String {
    content.replace('|', "\\|")
}

fn row_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells.map(escape).collect();
    format!("| {} |", cells.join(" | "))
}

fn alignment_cell(header_width: usize, alignment: Alignment) -> String {
    let dashes = "-".repeat(header_width.max(MIN_DASHES));
    match alignment {
        Alignment::Left => dashes,
        Alignment::Center => format!(":{dashes}:"),
        Alignment::Right => format!("{dashes}:"),
    }
}

/// Renders `table` as individual lines: header, alignment, rows, then the
/// `^anchor` line when the table has one.
pub fn generate_table_lines(table: &Table) -> Vec<String> {
    let mut lines = Vec::with_capacity(table.cells.len() + 3);
    lines.push(row_line(table.headers.iter().map(|h| h.content.as_str())));

    let alignments: Vec<String> = table
        .headers
        .iter()
        .map(|h| alignment_cell(escape(&h.content).chars().count(), h.alignment))
        .collect();
    lines.push(format!("| {} |", alignments.join(" | ")));

    for row in &table.cells {
        lines.push(row_line(row.iter().map(|c| c.content.as_str())));
    }
    if let Some(anchor) = &table.anchor_id {
        lines.push(format!("^{anchor}"));
    }
    lines
}

/// Renders `table` as newline-joined text without a trailing newline.
///
/// Cell content containing `|` is written as `\|`.
pub fn generate_table_text(table: &Table) -> String {
    generate_table_lines(table).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::{parse_table, parse_tables};
    use crate::core::table::{Cell, Header, TablePosition};

    fn position() -> TablePosition {
        TablePosition {
            file_path: "doc.md".to_string(),
            start_line: 0,
            end_line: 0,
            selection: None,
        }
    }

    #[test]
    fn test_generate_canonical_text() {
        let table = Table {
            headers: vec![
                Header { field: "col1".into(), content: "Id".into(), alignment: Alignment::Left },
                Header { field: "col2".into(), content: "Description".into(), alignment: Alignment::Center },
                Header { field: "col3".into(), content: "Cost".into(), alignment: Alignment::Right },
            ],
            cells: vec![vec![Cell::new("1"), Cell::new("Widget"), Cell::new("9.99")]],
            position: position(),
            anchor_id: Some("table-42".into()),
        };
        assert_eq!(
            generate_table_text(&table),
            "| Id | Description | Cost |\n\
             | --- | :-----------: | ----: |\n\
             | 1 | Widget | 9.99 |\n\
             ^table-42"
        );
    }

    #[test]
    fn test_round_trip_is_line_for_line() {
        let text = "| Name | Qty | Note |\n\
                    | ---- | :---: | ----: |\n\
                    | bolt | 4 | zinc |\n\
                    | nut |  | - |";
        let table = parse_tables(text, "doc.md").remove(0);
        assert_eq!(generate_table_text(&table), text);

        let anchored = format!("{text}\n^table-9f8e");
        let table = parse_tables(&anchored, "doc.md").remove(0);
        assert_eq!(generate_table_text(&table), anchored);
    }

    #[test]
    fn test_pipe_in_content_is_escaped() {
        let block = "| Expr |\n| ---- |\n| a \\| b |";
        let mut table = parse_table(block, position()).unwrap();
        assert_eq!(table.cells[0][0].content, "a | b");
        assert_eq!(generate_table_text(&table), block);

        table.set_cell(0, 0, "x|y").unwrap();
        assert_eq!(generate_table_lines(&table)[2], "| x\\|y |");
    }
}
