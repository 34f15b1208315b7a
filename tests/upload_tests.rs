//! Tests for upload validation and staging

use bulk_json_import::platform::{MemoryContentStore, MemoryNoticeSink};
use bulk_json_import::staging::FileStagingStore;
use bulk_json_import::{
    ImporterConfig, Importer, ManualClock, MemoryStagingStore, Severity, StagingEntry,
    StagingError, StagingStore, StagingToken, UploadErrorCode, UploadedFile, UserId,
    ValidationError,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const USER: UserId = UserId(1);

fn write_upload(dir: &Path, name: &str, contents: &[u8]) -> UploadedFile {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    UploadedFile::from_path(&path).unwrap()
}

#[test]
fn test_key_list_matches_first_object() {
    let dir = TempDir::new().unwrap();
    let store = MemoryContentStore::with_defaults();
    let staging = MemoryStagingStore::new();
    let notices = MemoryNoticeSink::new();
    let importer = Importer::new(ImporterConfig::default(), &store, &staging, &notices);

    let cases: Vec<(&str, Vec<&str>)> = vec![
        (r#"[{"b": 1, "a": 2, "c": 3}]"#, vec!["b", "a", "c"]),
        (r#"[{"x": 1}, {"x": 2, "y": 3}]"#, vec!["x"]),
        (r#"[{"dup": 1, "dup": 2, "z": 0}]"#, vec!["dup", "z"]),
        (r#"[{}, {"later": 1}]"#, vec![]),
        (r#"[{"k": null}, "scalar", [1]]"#, vec!["k"]),
    ];

    for (contents, expected) in cases {
        let upload = write_upload(dir.path(), "items.json", contents.as_bytes());
        let summary = importer.validate_upload(USER, &upload, "post").unwrap();
        assert_eq!(summary.keys, expected, "input: {}", contents);
    }
}

#[test]
fn test_bad_shapes_never_stage() {
    let dir = TempDir::new().unwrap();
    let store = MemoryContentStore::with_defaults();
    let staging = MemoryStagingStore::new();
    let notices = MemoryNoticeSink::new();
    let importer = Importer::new(ImporterConfig::default(), &store, &staging, &notices);

    let cases: Vec<(&str, ValidationError)> = vec![
        (r#"{"title": "object root"}"#, ValidationError::NotAnArray),
        (r#""just a string""#, ValidationError::NotAnArray),
        ("[]", ValidationError::EmptyArray),
        (r#"[1, {"title": "x"}]"#, ValidationError::InvalidItems),
        (r#"["a", "b"]"#, ValidationError::InvalidItems),
    ];

    for (contents, expected) in cases {
        let upload = write_upload(dir.path(), "items.json", contents.as_bytes());
        let err = importer.validate_upload(USER, &upload, "post").unwrap_err();
        assert_eq!(err, expected, "input: {}", contents);
    }

    let upload = write_upload(dir.path(), "broken.json", b"[{\"a\": ");
    assert!(matches!(
        importer.validate_upload(USER, &upload, "post"),
        Err(ValidationError::JsonDecode(_))
    ));

    assert!(staging.is_empty());
    let queued = importer.drain_notices(USER);
    assert_eq!(queued.len(), 6);
    assert!(queued.iter().all(|n| n.severity == Severity::Error));
}

#[test]
fn test_upload_status_and_type_checks() {
    let dir = TempDir::new().unwrap();
    let store = MemoryContentStore::with_defaults();
    let staging = MemoryStagingStore::new();
    let notices = MemoryNoticeSink::new();
    let importer = Importer::new(ImporterConfig::default(), &store, &staging, &notices);

    let mut upload = write_upload(dir.path(), "items.json", br#"[{"a": 1}]"#);

    upload.error = UploadErrorCode::from_code(3);
    assert_eq!(
        importer.validate_upload(USER, &upload, "post"),
        Err(ValidationError::PartialTransfer)
    );

    upload.error = UploadErrorCode::Ok;
    assert_eq!(
        importer.validate_upload(USER, &upload, "attachment"),
        Err(ValidationError::InvalidRecordType("attachment".to_string()))
    );

    let text = write_upload(dir.path(), "notes.txt", b"plain words");
    assert!(matches!(
        importer.validate_upload(USER, &text, "post"),
        Err(ValidationError::InvalidFileType { .. })
    ));
    assert!(staging.is_empty());
}

#[test]
fn test_size_limit_from_config() {
    let dir = TempDir::new().unwrap();
    let store = MemoryContentStore::with_defaults();
    let staging = MemoryStagingStore::new();
    let notices = MemoryNoticeSink::new();
    let config = ImporterConfig::parse("max_upload_bytes = 16").unwrap();
    let importer = Importer::new(config, &store, &staging, &notices);

    let small = write_upload(dir.path(), "small.json", br#"[{"a": 1}]"#);
    assert!(importer.validate_upload(USER, &small, "post").is_ok());

    let large = write_upload(
        dir.path(),
        "large.json",
        br#"[{"title": "a title that is too long"}]"#,
    );
    assert_eq!(
        importer.validate_upload(USER, &large, "post"),
        Err(ValidationError::SizeExceeded)
    );
}

#[test]
fn test_byte_order_mark_is_ignored() {
    let dir = TempDir::new().unwrap();
    let store = MemoryContentStore::with_defaults();
    let staging = MemoryStagingStore::new();
    let notices = MemoryNoticeSink::new();
    let importer = Importer::new(ImporterConfig::default(), &store, &staging, &notices);

    let upload = write_upload(dir.path(), "bom.json", b"\xEF\xBB\xBF[{\"title\": \"x\"}]");
    let summary = importer.validate_upload(USER, &upload, "post").unwrap();
    assert_eq!(summary.keys, vec!["title"]);
}

#[test]
fn test_file_staging_round_trip_and_expiry() {
    let dir = TempDir::new().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = FileStagingStore::new(dir.path().join("staging")).with_clock(clock.clone());

    let entry = StagingEntry::new(
        vec![json!({"title": "A", "n": 1}), json!({"title": "B"})],
        "post",
        "items.json",
    );
    let short = store.put(USER, &entry, Duration::minutes(5)).unwrap();
    let long = store.put(USER, &entry, Duration::hours(1)).unwrap();
    assert_ne!(short, long);

    assert_eq!(store.get(USER, &short).unwrap(), Some(entry.clone()));
    assert_eq!(store.get(UserId(2), &short).unwrap(), None);

    clock.advance(Duration::minutes(10));
    assert_eq!(store.get(USER, &short).unwrap(), None);
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert_eq!(store.get(USER, &long).unwrap(), Some(entry));

    store.delete(&long).unwrap();
    assert_eq!(store.get(USER, &long).unwrap(), None);
    store.delete(&long).unwrap();
}

#[test]
fn test_token_format_is_checked() {
    assert!(matches!(
        "../../etc/passwd".parse::<StagingToken>(),
        Err(StagingError::InvalidToken(_))
    ));
    assert!("".parse::<StagingToken>().is_err());
    assert!("bji_0123abc".parse::<StagingToken>().is_ok());
}
