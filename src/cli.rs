//! Programmatic command runner behind the `estatequery` binary.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::config::QueryConfig;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::import::{self, ImportOptions};
use crate::listing::{ListingQuery, RawListingParams};
use crate::orchestrator::{CollectionStore, search_listings};
use crate::pagination;
use crate::query::{self, telemetry};
use crate::utils::json::document_to_json;

pub const DEFAULT_COLLECTION: &str = "listings";

#[derive(Debug, Clone)]
pub enum Command {
    /// Load `file` into `collection` and print one page of search results.
    Search { file: PathBuf, collection: String, params: RawListingParams },
    /// Print the predicate, sort and pagination a parameter set compiles to.
    Explain { params: RawListingParams },
    Count { file: PathBuf, collection: String, filter_json: String },
    Metrics,
}

/// Splits `key=value` arguments. A missing `=` is an error.
///
/// # Errors
/// `QueryError` naming the malformed argument.
pub fn parse_pairs(items: &[String]) -> Result<Vec<(String, String)>, DbError> {
    items
        .iter()
        .map(|s| {
            s.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| DbError::QueryError(format!("expected key=value, got '{s}'")))
        })
        .collect()
}

/// Builds raw parameters from `key=value` pairs, or from a JSON object when one is given.
///
/// # Errors
/// Malformed pairs or JSON.
pub fn params_from_args(pairs: &[String], json: Option<&str>) -> Result<RawListingParams, DbError> {
    match json {
        Some(j) => RawListingParams::from_json(j),
        None => Ok(RawListingParams::from_pairs(parse_pairs(pairs)?)),
    }
}

/// # Errors
/// Any import, query or output failure.
pub async fn run<W: Write>(engine: Arc<Engine>, cfg: &QueryConfig, cmd: Command, out: &mut W) -> Result<(), DbError> {
    match cmd {
        Command::Search { file, collection, params } => {
            import::import_file(&engine, &collection, &file, &ImportOptions::default())?;
            let store = CollectionStore::new(Arc::clone(&engine), collection);
            let envelope = search_listings(&store, &ListingQuery::from_raw(&params), cfg).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&envelope.to_json())?)?;
        }
        Command::Explain { params } => {
            let q = ListingQuery::from_raw(&params);
            let filter = q.to_builder(cfg).build_document();
            let p = pagination::parse(&q.pagination, cfg.pagination_defaults(), cfg.max_limit);
            let sort: Vec<String> = q
                .sort_specs()
                .iter()
                .map(|s| match s.order {
                    query::Order::Asc => s.field.clone(),
                    query::Order::Desc => format!("-{}", s.field),
                })
                .collect();
            let v = json!({
                "filter": document_to_json(&filter),
                "sort": sort,
                "pagination": { "page": p.page(), "limit": p.limit(), "skip": p.skip() },
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&v)?)?;
        }
        Command::Count { file, collection, filter_json } => {
            import::import_file(&engine, &collection, &file, &ImportOptions::default())?;
            let filter = query::parse_filter_json(&filter_json, &cfg.text_weights)?;
            writeln!(out, "{}", engine.count(&collection, &filter)?)?;
        }
        Command::Metrics => {
            write!(out, "{}", telemetry::metrics_text())?;
        }
    }
    Ok(())
}
