mod common;

use std::fs;

use geo_harvest::domain::Record;
use geo_harvest::sink::{RollingCsvSink, TabularSink};

use common::*;

fn columns() -> Vec<String> {
    ["Dataset URL", "Title", "Summary", "Accession Number", "Cell Type"]
        .iter()
        .map(|column| column.to_string())
        .collect()
}

#[test]
fn declared_columns_survive_sparse_rows() {
    let temp = tempfile::tempdir().unwrap();
    let mut sink = RollingCsvSink::new(utf8(temp.path()).join("final_result"), columns(), 1024);

    let path = sink
        .append(&[Record::new().with("Title", Some("only a title".into()))])
        .unwrap();

    let (header, rows) = read_sheet(path.as_std_path());
    assert_eq!(header, columns());
    assert_eq!(rows[0]["Title"].as_deref(), Some("only a title"));
    for column in ["Dataset URL", "Summary", "Accession Number", "Cell Type"] {
        assert_eq!(rows[0][column], None);
    }
}

#[test]
fn declared_columns_are_backfilled_into_foreign_files() {
    let temp = tempfile::tempdir().unwrap();
    let existing = temp.path().join("final_result_1.csv");
    fs::write(&existing, "Title,Extra\nold,x\n").unwrap();
    let mut sink = RollingCsvSink::new(utf8(temp.path()).join("final_result"), columns(), 1024);

    sink.append(&[Record::new().with("Summary", Some("new".into()))])
        .unwrap();

    let (header, rows) = read_sheet(&existing);
    assert_eq!(
        header,
        vec!["Title", "Extra", "Dataset URL", "Summary", "Accession Number", "Cell Type"]
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Extra"].as_deref(), Some("x"));
    assert_eq!(rows[0]["Summary"], None);
    assert_eq!(rows[1]["Summary"].as_deref(), Some("new"));
}

#[test]
fn rolls_over_once_the_threshold_is_exceeded() {
    let temp = tempfile::tempdir().unwrap();
    let mut sink = RollingCsvSink::new(utf8(temp.path()).join("final_result"), columns(), 64);

    let first = sink
        .append(&[Record::new().with("Title", Some("a".repeat(80)))])
        .unwrap();
    assert!(first.ends_with("final_result_1.csv"));
    assert!(fs::metadata(first.as_std_path()).unwrap().len() > 64);

    let second = sink
        .append(&[Record::new().with("Title", Some("b".into()))])
        .unwrap();
    assert!(second.ends_with("final_result_2.csv"));

    let third = sink
        .append(&[Record::new().with("Title", Some("c".into()))])
        .unwrap();
    assert!(third.ends_with("final_result_2.csv"));

    let (_, first_rows) = read_sheet(first.as_std_path());
    let (_, second_rows) = read_sheet(second.as_std_path());
    assert_eq!(first_rows.len(), 1);
    assert_eq!(second_rows.len(), 2);
}
