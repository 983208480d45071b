// Output writer tests: artifact naming, CSV header discipline, and
// concurrent append behavior.

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tempfile::TempDir;

use recap_engine::output::{OutputConfig, OutputWriter, CSV_HEADER};
use recap_engine::summarizer::schema::{Company, Contact, MeetingData};

fn writer_for(dir: &TempDir, companion_folders: bool) -> (OutputWriter, std::path::PathBuf) {
    let csv_path = dir.path().join("meetings.csv");
    let config = OutputConfig {
        output_dir: dir.path().join("summaries").display().to_string(),
        csv_export_path: csv_path.display().to_string(),
        append_csv: true,
        companion_folders,
    };
    (OutputWriter::new(config, Arc::new(Mutex::new(()))), csv_path)
}

fn sample_data() -> MeetingData {
    MeetingData {
        contacts: vec![Contact {
            name: Some("Dana Reyes".to_string()),
            role: Some("CIO".to_string()),
            is_decision_maker: Some(true),
            ..Contact::default()
        }],
        companies: vec![Company {
            name: Some("Northgate Capital".to_string()),
            aum: Some("$2.4B".to_string()),
            icp_classification: Some(1),
            competitor_products: vec!["Trend Fund A".to_string(), "Carry Fund B".to_string()],
            ..Company::default()
        }],
        deals: vec![],
    }
}

#[test]
fn writes_summary_and_data_with_timestamped_names() {
    let dir = TempDir::new().unwrap();
    let (writer, _) = writer_for(&dir, false);

    let (paths, result) = writer.persist("the final summary", &sample_data(), Local::now());
    result.unwrap();

    let summary_path = paths.summary_path.unwrap();
    let name = summary_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("summary_"), "got {name}");
    assert!(name.ends_with(".txt"));

    let content = std::fs::read_to_string(&summary_path).unwrap();
    assert_eq!(content, "the final summary\n");

    let data_path = paths.data_path.unwrap();
    let parsed: MeetingData =
        serde_json::from_str(&std::fs::read_to_string(&data_path).unwrap()).unwrap();
    assert_eq!(parsed.contacts[0].name.as_deref(), Some("Dana Reyes"));

    // No stray temp files left behind.
    let leftovers: Vec<_> = std::fs::read_dir(summary_path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn companion_folders_use_company_and_contact() {
    let dir = TempDir::new().unwrap();
    let (writer, _) = writer_for(&dir, true);

    let (paths, result) = writer.persist("summary", &sample_data(), Local::now());
    result.unwrap();

    let summary_path = paths.summary_path.unwrap();
    assert_eq!(summary_path.file_name().unwrap(), "summary.txt");
    let folder = summary_path
        .parent()
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    assert!(folder.contains("Northgate Capital - Dana Reyes"), "got {folder}");
    assert_eq!(paths.data_path.unwrap().file_name().unwrap(), "data.json");
}

#[test]
fn companion_naming_falls_back_when_extraction_is_empty() {
    let dir = TempDir::new().unwrap();
    let (writer, _) = writer_for(&dir, true);

    let (paths, result) = writer.persist("summary", &MeetingData::default(), Local::now());
    result.unwrap();

    let name = paths
        .summary_path
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    assert!(name.starts_with("summary_"), "expected flat naming, got {name}");
}

#[test]
fn csv_header_appears_exactly_once() {
    let dir = TempDir::new().unwrap();
    let (writer, csv_path) = writer_for(&dir, false);

    for _ in 0..3 {
        let (_, result) = writer.persist("s", &sample_data(), Local::now());
        result.unwrap();
    }

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4, "one header plus three rows");
    assert_eq!(lines[0], CSV_HEADER);
    for row in &lines[1..] {
        assert!(!row.starts_with("meeting_date"), "duplicate header: {row}");
    }
}

#[test]
fn csv_cells_with_commas_are_quoted() {
    let dir = TempDir::new().unwrap();
    let (writer, csv_path) = writer_for(&dir, false);

    let (_, result) = writer.persist("s", &sample_data(), Local::now());
    result.unwrap();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let row = csv.lines().nth(1).unwrap();
    // List-valued cell joins competitor products inside one quoted cell.
    assert!(row.contains("\"Trend Fund A,Carry Fund B\""), "got {row}");
}

#[test]
fn concurrent_appends_do_not_interleave_rows() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("meetings.csv");
    let lock = Arc::new(Mutex::new(()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let config = OutputConfig {
            output_dir: dir.path().join(format!("out-{i}")).display().to_string(),
            csv_export_path: csv_path.display().to_string(),
            append_csv: true,
            companion_folders: false,
        };
        let writer = OutputWriter::new(config, Arc::clone(&lock));
        handles.push(std::thread::spawn(move || {
            let (_, result) = writer.persist("s", &MeetingData::default(), Local::now());
            result.unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 9, "one header plus eight rows");
    assert_eq!(lines[0], CSV_HEADER);
    let columns = CSV_HEADER.split(',').count();
    for row in &lines[1..] {
        assert_eq!(row.split(',').count(), columns, "malformed row: {row}");
    }
}

#[test]
fn unwritable_output_dir_is_an_output_write_failure() {
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"a file, not a directory").unwrap();

    let config = OutputConfig {
        output_dir: blocked.display().to_string(),
        csv_export_path: dir.path().join("meetings.csv").display().to_string(),
        append_csv: true,
        companion_folders: false,
    };
    let writer = OutputWriter::new(config, Arc::new(Mutex::new(())));

    let (paths, result) = writer.persist("s", &MeetingData::default(), Local::now());
    let err = result.unwrap_err();
    assert_eq!(err.error_code(), "OUTPUT_WRITE_FAILURE");
    assert!(paths.summary_path.is_none());
}
