use tablesmith_core::{
    generate_table_text, parse_tables, CalculationOutput, CalculationValue, DocumentStore,
    FrontmatterStore, FsDocumentStore, Workspace,
};
use tempfile::TempDir;

const REPORT: &str = "\
# Trip report

| Day | Date | Cost |
| --- | :---: | ---: |
| Mon | 2024-03-01 | 12.50 |
| Tue | 2024-03-05 | 30 |
| Wed | 2024-03-10 | 7.5 |

Notes in between.

| Item | Qty |
| --- | --- |
| tent | 1 |
";

#[test]
fn test_parse_generate_parse_is_stable() {
    let tables = parse_tables(REPORT, "report.md");
    assert_eq!(tables.len(), 2);
    for table in &tables {
        let text = generate_table_text(table);
        let reparsed = parse_tables(&text, "report.md");
        assert_eq!(reparsed.len(), 1);
        assert!(reparsed[0].same_rendering(table));
    }
}

#[test]
fn test_edit_bind_and_recalculate_on_disk() {
    let dir = TempDir::new().unwrap();
    let docs = FsDocumentStore::new(dir.path().join("docs"));
    docs.write("report.md", REPORT).unwrap();
    let settings_path = dir.path().join("settings.json");

    let mut ws = Workspace::open(docs.clone(), FrontmatterStore::new(docs.clone()), &settings_path);
    let tables = ws.tables("report.md").unwrap();

    let (trip, total) = ws
        .bind_calculation("report.md", &tables[0], "Sum([Cost])", CalculationOutput::frontmatter("total"))
        .unwrap();
    assert_eq!(total, CalculationValue::Number(50.0));
    let trip_table = ws.table_by_anchor("report.md", &trip).unwrap();
    let (_, span) = ws
        .bind_calculation(
            "report.md",
            &trip_table,
            "TimeSpan([Date], 'yyyy-MM-dd:days')",
            CalculationOutput::frontmatter("days"),
        )
        .unwrap();
    assert_eq!(span, CalculationValue::Number(9.0));

    // Grow the first table; the second table and the prose after it move down.
    let original = ws.tables("report.md").unwrap();
    let mut edited = original.clone();
    edited[0]
        .insert_row(3, vec!["Thu".into(), "2024-03-12".into(), "10".into()])
        .unwrap();
    let saved = ws.save_tables("report.md", &original, &edited).unwrap();
    assert_eq!(saved[0].anchor_id.as_deref(), Some(trip.as_str()));
    assert_eq!(saved[1].position.start_line, original[1].position.start_line + 1);

    assert_eq!(ws.recalculate_document("report.md").unwrap(), 2);
    let text = docs.read("report.md").unwrap();
    assert!(text.starts_with("---\ntotal: 60\ndays: 11\n---\n# Trip report\n"));
    assert!(text.contains("\n\nNotes in between.\n\n| Item | Qty |\n"));
    assert!(text.ends_with("| tent | 1 |\n"));

    // Bindings survive reopening the workspace.
    let reopened = Workspace::open(docs.clone(), FrontmatterStore::new(docs), &settings_path);
    let bound = reopened.calculations().get(&trip);
    assert_eq!(bound.len(), 2);
    assert_eq!(bound[0].config.result.as_deref(), Some("60"));
    assert_eq!(bound[1].config.result.as_deref(), Some("11"));
}
