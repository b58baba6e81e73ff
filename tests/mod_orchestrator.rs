use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bson::{Bson, Document as BsonDocument, doc};
use estatequery::config::QueryConfig;
use estatequery::engine::Engine;
use estatequery::errors::DbError;
use estatequery::listing::{ListingQuery, RawListingParams};
use estatequery::orchestrator::{CollectionStore, DocumentStore, execute_paged, search_listings};
use estatequery::pagination::{PaginationParams, PaginationResult};
use estatequery::query::{Filter, FindOptions, PopulateSpec, SortSpec};
use tokio::sync::Barrier;

fn london_sale(i: i32) -> BsonDocument {
    let title = format!("Flat {i}");
    let address = format!("{i} Baker St");
    let price = 100_000 + i * 30_000;
    let created = Bson::DateTime(bson::DateTime::from_millis(1_700_000_000_000 + i64::from(i) * 1000));
    doc! {
        "title": title,
        "type": "sale",
        "price": price,
        "location": {"city": "London", "address": address},
        "archived": false,
        "createdAt": created,
    }
}

fn seeded_engine() -> Arc<Engine> {
    let engine = Arc::new(Engine::new());
    engine.create_collection("listings");
    for i in 0..12 {
        engine.insert("listings", london_sale(i)).unwrap();
    }
    // Noise that the search must exclude.
    engine.insert("listings", doc! {"type": "rent", "price": 200_000, "location": {"city": "London"}, "archived": false}).unwrap();
    engine.insert("listings", doc! {"type": "sale", "price": 900_000, "location": {"city": "London"}, "archived": false}).unwrap();
    engine.insert("listings", doc! {"type": "sale", "price": 200_000, "location": {"city": "Leeds"}, "archived": false}).unwrap();
    let mut archived = london_sale(99);
    archived.insert("price", 150_000);
    archived.insert("archived", true);
    engine.insert("listings", archived).unwrap();
    engine
}

fn london_request(page: &str) -> ListingQuery {
    ListingQuery::from_raw(&RawListingParams::from_pairs([
        ("type", "sale"),
        ("city", "London"),
        ("minPrice", "100000"),
        ("maxPrice", "500000"),
        ("page", page),
        ("limit", "5"),
    ]))
}

#[tokio::test]
async fn london_sales_second_page() {
    let store = CollectionStore::new(seeded_engine(), "listings");
    let env = search_listings(&store, &london_request("2"), &QueryConfig::default()).await.unwrap();
    assert!(env.data.len() <= 5);
    assert_eq!(env.data.len(), 5);
    assert_eq!(
        env.pagination,
        PaginationResult { page: 2, limit: 5, total: 12, total_pages: 3, has_next: true, has_previous: true }
    );
    // Newest first: the second page starts at the sixth newest record.
    assert_eq!(env.data[0].get_str("title").unwrap(), "Flat 6");
}

#[tokio::test]
async fn pages_cover_every_match_once() {
    let store = CollectionStore::new(seeded_engine(), "listings");
    let mut seen = HashSet::new();
    for page in ["1", "2", "3"] {
        let env = search_listings(&store, &london_request(page), &QueryConfig::default()).await.unwrap();
        for rec in &env.data {
            assert!(seen.insert(rec.get_str("_id").unwrap().to_string()));
        }
    }
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn identical_sort_keys_still_page_stably() {
    let engine = Arc::new(Engine::new());
    engine.create_collection("listings");
    let same = Bson::DateTime(bson::DateTime::from_millis(1_700_000_000_000));
    for i in 0..7 {
        engine.insert("listings", doc! {"n": i, "createdAt": same.clone(), "archived": false}).unwrap();
    }
    let store = CollectionStore::new(engine, "listings");
    let sort = [SortSpec::desc("createdAt")];
    let first = execute_paged(&store, &Filter::True, &sort, PaginationParams::new(1, 4, 100), &[]).await.unwrap();
    let again = execute_paged(&store, &Filter::True, &sort, PaginationParams::new(1, 4, 100), &[]).await.unwrap();
    let second = execute_paged(&store, &Filter::True, &sort, PaginationParams::new(2, 4, 100), &[]).await.unwrap();
    assert_eq!(first.data, again.data);
    let ids: HashSet<_> = first.data.iter().chain(&second.data).map(|d| d.get_str("_id").unwrap().to_string()).collect();
    assert_eq!(ids.len(), 7);
}

#[tokio::test]
async fn default_archived_filter_applies_without_parameters() {
    let store = CollectionStore::new(seeded_engine(), "listings");
    let env = search_listings(&store, &ListingQuery::default(), &QueryConfig::default()).await.unwrap();
    assert_eq!(env.pagination.total, 15);
    assert_eq!(env.pagination.limit, 10);
    assert!(env.data.iter().all(|d| !d.get_bool("archived").unwrap()));
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let store = CollectionStore::new(seeded_engine(), "listings");
    let env = search_listings(&store, &london_request("9"), &QueryConfig::default()).await.unwrap();
    assert!(env.data.is_empty());
    assert_eq!(env.pagination.total, 12);
    assert!(!env.pagination.has_next);
    assert!(env.pagination.has_previous);
}

#[tokio::test]
async fn populate_embeds_referenced_records() {
    let engine = Arc::new(Engine::new());
    engine.create_collection("agents");
    engine.create_collection("listings");
    let agent = engine.insert("agents", doc! {"name": "Morgan"}).unwrap();
    engine.insert("listings", doc! {"title": "Loft", "agent": agent.to_string()}).unwrap();
    engine.insert("listings", doc! {"title": "Barn", "agent": "not-an-id"}).unwrap();
    let store = CollectionStore::new(engine, "listings");
    let populate = [PopulateSpec { path: "agent".into(), from: "agents".into() }];
    let env = execute_paged(&store, &Filter::True, &[SortSpec::asc("title")], PaginationParams::default(), &populate)
        .await
        .unwrap();
    assert_eq!(env.data[0].get_str("agent").unwrap(), "not-an-id");
    assert_eq!(env.data[1].get_document("agent").unwrap().get_str("name").unwrap(), "Morgan");
}

/// Counts calls and fails whichever side is configured to fail.
#[derive(Default)]
struct FlakyStore {
    fail_find: bool,
    fail_count: bool,
    calls: AtomicUsize,
}

impl DocumentStore for FlakyStore {
    async fn find(&self, _filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_find {
            return Err(DbError::Storage("find unavailable".into()));
        }
        let n = opts.limit.unwrap_or(0).min(3);
        Ok((0..n).map(|i| doc! {"i": i64::try_from(i).unwrap_or_default()}).collect())
    }

    async fn count(&self, _filter: &Filter) -> Result<u64, DbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_count {
            return Err(DbError::Storage("count unavailable".into()));
        }
        Ok(3)
    }
}

#[tokio::test]
async fn both_operations_are_issued() {
    let store = FlakyStore::default();
    let env = execute_paged(&store, &Filter::True, &[], PaginationParams::default(), &[]).await.unwrap();
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert_eq!(env.data.len(), 3);
    assert_eq!(env.pagination.total_pages, 1);
}

#[tokio::test]
async fn find_failure_fails_the_call() {
    let store = FlakyStore { fail_find: true, ..FlakyStore::default() };
    let err = search_listings(&store, &ListingQuery::default(), &QueryConfig::default()).await.unwrap_err();
    assert!(matches!(err, DbError::Storage(m) if m == "find unavailable"));
}

#[tokio::test]
async fn count_failure_fails_the_call() {
    let store = FlakyStore { fail_count: true, ..FlakyStore::default() };
    let err = execute_paged(&store, &Filter::True, &[], PaginationParams::default(), &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Storage(m) if m == "count unavailable"));
}

/// Neither operation can finish until the other one has started.
struct RendezvousStore {
    gate: Barrier,
}

impl DocumentStore for RendezvousStore {
    async fn find(&self, _filter: &Filter, _opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
        self.gate.wait().await;
        Ok(vec![doc! {"i": 0}])
    }

    async fn count(&self, _filter: &Filter) -> Result<u64, DbError> {
        self.gate.wait().await;
        Ok(1)
    }
}

#[tokio::test]
async fn fetch_and_count_are_in_flight_together() {
    let store = RendezvousStore { gate: Barrier::new(2) };
    let call = execute_paged(&store, &Filter::True, &[], PaginationParams::default(), &[]);
    let env = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .expect("fetch and count must run concurrently")
        .unwrap();
    assert_eq!(env.data.len(), 1);
    assert_eq!(env.pagination.total, 1);
}
