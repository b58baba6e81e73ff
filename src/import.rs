//! Loads listing records from NDJSON or a JSON array into a collection.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use bson::Document as BsonDocument;
use serde::Serialize;

use crate::engine::Engine;
use crate::errors::DbError;
use crate::utils::json::json_value_to_bson_document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportFormat {
    /// Array input when the first non-blank byte is `[`, NDJSON otherwise.
    #[default]
    Auto,
    Ndjson,
    JsonArray,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub format: ImportFormat,
    /// Count bad records instead of failing on the first one.
    pub skip_errors: bool,
    pub progress_every: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: u64,
}

/// # Errors
/// I/O failures, or malformed records unless `skip_errors` is set.
pub fn import_file(engine: &Engine, collection: &str, path: &Path, opts: &ImportOptions) -> Result<ImportReport, DbError> {
    let f = std::fs::File::open(path)?;
    let report = import_reader(engine, collection, f, opts)?;
    log::info!(
        "imported {} records into {collection} from {} ({} skipped)",
        report.inserted,
        path.display(),
        report.skipped
    );
    Ok(report)
}

/// Creates `collection` when missing and inserts every record read from `reader`.
///
/// # Errors
/// I/O failures, or malformed records unless `skip_errors` is set.
pub fn import_reader<R: Read>(engine: &Engine, collection: &str, reader: R, opts: &ImportOptions) -> Result<ImportReport, DbError> {
    engine.create_collection(collection);
    let mut reader = BufReader::new(reader);
    let array_mode = match opts.format {
        ImportFormat::JsonArray => true,
        ImportFormat::Ndjson => false,
        ImportFormat::Auto => starts_with_bracket(&mut reader)?,
    };
    let mut report = ImportReport::default();
    if array_mode {
        let mut s = String::new();
        reader.read_to_string(&mut s)?;
        let val: serde_json::Value = serde_json::from_str(&s)?;
        let arr = val.as_array().ok_or_else(|| DbError::QueryError("expected JSON array".into()))?;
        for (i, v) in arr.iter().enumerate() {
            insert_one(engine, collection, json_value_to_bson_document(v), i + 1, opts, &mut report)?;
        }
        return Ok(report);
    }

    let mut line_no: usize = 0;
    let mut buf = String::with_capacity(8 * 1024);
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<serde_json::Value>(line)
            .map_err(std::io::Error::from)
            .and_then(|v| json_value_to_bson_document(&v));
        insert_one(engine, collection, parsed, line_no, opts, &mut report)?;
    }
    Ok(report)
}

fn insert_one(
    engine: &Engine,
    collection: &str,
    parsed: std::io::Result<BsonDocument>,
    record_no: usize,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> Result<(), DbError> {
    match parsed {
        Ok(doc) => {
            engine.insert(collection, doc)?;
            report.inserted += 1;
            if let Some(n) = opts.progress_every
                && n > 0
                && report.inserted % n == 0
            {
                log::info!("imported {} records into {collection}", report.inserted);
            }
            Ok(())
        }
        Err(e) if opts.skip_errors => {
            log::warn!("skipping record {record_no}: {e}");
            report.skipped += 1;
            Ok(())
        }
        Err(e) => Err(DbError::QueryError(format!("record {record_no}: {e}"))),
    }
}

fn starts_with_bracket<R: Read>(reader: &mut BufReader<R>) -> Result<bool, DbError> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(false);
        }
        let ws = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if ws < buf.len() {
            return Ok(buf[ws] == b'[');
        }
        reader.consume(ws);
    }
}
