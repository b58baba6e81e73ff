//! Paged query execution: a bounded fetch and a total count run concurrently against a
//! [`DocumentStore`], joined into one [`ResponseEnvelope`].

use std::future::Future;
use std::sync::Arc;

use bson::Document as BsonDocument;
use serde_json::{Value, json};

use crate::config::QueryConfig;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::listing::ListingQuery;
use crate::pagination::{self, PaginationParams, PaginationResult};
use crate::query::{Filter, FindOptions, PopulateSpec, QueryProbe, SortSpec};
use crate::utils::{json::document_to_json, num::u64_to_usize_saturating};

/// Storage collaborator for paged reads.
///
/// `find` and `count` are independent operations and need not observe the same snapshot.
pub trait DocumentStore: Send + Sync {
    fn find(&self, filter: &Filter, opts: &FindOptions) -> impl Future<Output = Result<Vec<BsonDocument>, DbError>> + Send;

    fn count(&self, filter: &Filter) -> impl Future<Output = Result<u64, DbError>> + Send;
}

/// One collection of an [`Engine`]. Each call runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    engine: Arc<Engine>,
    collection: String,
}

impl CollectionStore {
    pub fn new(engine: Arc<Engine>, collection: impl Into<String>) -> Self {
        Self { engine, collection: collection.into() }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn join_error(e: tokio::task::JoinError) -> DbError {
    DbError::Storage(format!("query task failed: {e}"))
}

impl DocumentStore for CollectionStore {
    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
        let engine = Arc::clone(&self.engine);
        let collection = self.collection.clone();
        let filter = filter.clone();
        let opts = opts.clone();
        tokio::task::spawn_blocking(move || engine.find(&collection, &filter, &opts))
            .await
            .map_err(join_error)?
    }

    async fn count(&self, filter: &Filter) -> Result<u64, DbError> {
        let engine = Arc::clone(&self.engine);
        let collection = self.collection.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || engine.count(&collection, &filter)).await.map_err(join_error)?
    }
}

/// One page of records plus its pagination metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub data: Vec<BsonDocument>,
    pub pagination: PaginationResult,
}

impl ResponseEnvelope {
    /// `{ "data": [...], "pagination": { page, limit, total, totalPages, hasNext, hasPrevious } }`
    #[must_use]
    pub fn to_json(&self) -> Value {
        let data: Vec<Value> = self.data.iter().map(document_to_json).collect();
        json!({ "data": data, "pagination": self.pagination })
    }
}

/// Fetches the requested page and counts all matches concurrently. Either failure fails
/// the whole call.
///
/// # Errors
/// Whatever the store returns, unchanged.
pub async fn execute_paged<S: DocumentStore>(
    store: &S,
    filter: &Filter,
    sort: &[SortSpec],
    params: PaginationParams,
    populate: &[PopulateSpec],
) -> Result<ResponseEnvelope, DbError> {
    let opts = FindOptions {
        sort: (!sort.is_empty()).then(|| sort.to_vec()),
        limit: Some(u64_to_usize_saturating(params.limit())),
        skip: Some(u64_to_usize_saturating(params.skip())),
        populate: populate.to_vec(),
    };
    let probe = QueryProbe::start(format!("paged.{}", filter.type_name()));
    let joined = tokio::try_join!(store.find(filter, &opts), store.count(filter));
    probe.finish();
    let (data, total) = joined?;
    log::debug!("page {} of {} returned {} records", params.page(), total, data.len());
    Ok(ResponseEnvelope { data, pagination: params.summarize(total) })
}

/// Runs a listing search end to end.
///
/// # Errors
/// Storage failures from `store`.
pub async fn search_listings<S: DocumentStore>(
    store: &S,
    query: &ListingQuery,
    cfg: &QueryConfig,
) -> Result<ResponseEnvelope, DbError> {
    let probe = QueryProbe::start("listings.search");
    let filter = query.to_builder(cfg).build();
    let params = pagination::parse(&query.pagination, cfg.pagination_defaults(), cfg.max_limit);
    let res = execute_paged(store, &filter, &query.sort_specs(), params, &[]).await;
    probe.finish();
    res
}
