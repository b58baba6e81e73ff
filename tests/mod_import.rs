use std::io::Write;

use estatequery::engine::Engine;
use estatequery::import::{ImportFormat, ImportOptions, ImportReport, import_file, import_reader};
use estatequery::query::{CmpOp, Filter};

#[test]
fn ndjson_file_loads_into_new_collection() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "{{\"title\": \"A\", \"price\": 100000, \"amenities\": [\"pool\"]}}").unwrap();
    writeln!(f).unwrap();
    writeln!(f, "{{\"title\": \"B\", \"price\": 250000.5, \"createdAt\": {{\"$date\": \"2024-01-02T03:04:05Z\"}}}}").unwrap();
    let engine = Engine::new();
    let r = import_file(&engine, "listings", f.path(), &ImportOptions::default()).unwrap();
    assert_eq!(r, ImportReport { inserted: 2, skipped: 0 });

    let cheap = Filter::Cmp { path: "price".into(), op: CmpOp::Lte, value: 100_000.into() };
    assert_eq!(engine.count("listings", &cheap).unwrap(), 1);
    let b = engine
        .find_one("listings", &Filter::Cmp { path: "title".into(), op: CmpOp::Eq, value: "B".into() })
        .unwrap()
        .unwrap();
    assert_eq!(b.get_datetime("createdAt").unwrap().timestamp_millis(), 1_704_164_645_000);
}

#[test]
fn forced_array_format() {
    let engine = Engine::new();
    let opts = ImportOptions { format: ImportFormat::JsonArray, ..ImportOptions::default() };
    let r = import_reader(&engine, "t", "[{\"a\": 1}]".as_bytes(), &opts).unwrap();
    assert_eq!(r.inserted, 1);
    assert!(import_reader(&engine, "t", "{\"a\": 1}".as_bytes(), &opts).is_err());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = import_file(&Engine::new(), "t", &dir.path().join("none.ndjson"), &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, estatequery::errors::DbError::Io(_)));
}
