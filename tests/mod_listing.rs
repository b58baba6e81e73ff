use bson::doc;
use estatequery::config::QueryConfig;
use estatequery::filter::FilterCriterion;
use estatequery::listing::{ListingQuery, RawListingParams};
use estatequery::pagination::{PaginationDefaults, PaginationParams, parse};
use estatequery::query::{SortSpec, eval_filter};

fn query(pairs: &[(&str, &str)]) -> ListingQuery {
    ListingQuery::from_raw(&RawListingParams::from_pairs(pairs.iter().copied()))
}

fn pages(q: &ListingQuery) -> PaginationParams {
    parse(&q.pagination, PaginationDefaults::default(), 100)
}

fn kinds(q: &ListingQuery, cfg: &QueryConfig) -> Vec<String> {
    q.to_builder(cfg)
        .criteria()
        .iter()
        .map(|c| match c {
            FilterCriterion::Exact { field, .. } => format!("exact:{field}"),
            FilterCriterion::Range { field, .. } => format!("range:{field}"),
            FilterCriterion::SubstringOr { .. } => "substring".to_string(),
            FilterCriterion::SetContainsAll { field, .. } => format!("all:{field}"),
            FilterCriterion::TextSearch { .. } => "text".to_string(),
            FilterCriterion::GeoNear { .. } => "geo".to_string(),
        })
        .collect()
}

#[test]
fn no_parameters_filters_out_archived() {
    let q = query(&[]);
    let b = q.to_builder(&QueryConfig::default());
    assert_eq!(b.build_document(), doc! {"archived": false});
    let f = b.build();
    assert!(eval_filter(&doc! {"title": "a", "archived": false}, &f));
    assert!(!eval_filter(&doc! {"title": "b", "archived": true}, &f));
}

#[test]
fn archived_true_only_from_literal_true() {
    assert!(query(&[("archived", "true")]).archived);
    assert!(!query(&[("archived", "TRUE")]).archived);
    assert!(!query(&[("archived", "yes")]).archived);
    assert!(!query(&[("archived", "false")]).archived);
}

#[test]
fn criteria_follow_selectivity_order() {
    let q = query(&[
        ("archived", "false"),
        ("amenities", "pool"),
        ("bathrooms", "1"),
        ("bedrooms", "2"),
        ("maxPrice", "500000"),
        ("city", "London"),
        ("searchTerm", "garden"),
        ("location", "camden"),
        ("type", "sale"),
        ("lat", "51.5"),
        ("lng", "-0.12"),
        ("radius", "1500"),
    ]);
    let cfg = QueryConfig {
        text_search: true,
        geo_field: Some("location.coordinates".into()),
        ..QueryConfig::default()
    };
    assert_eq!(
        kinds(&q, &cfg),
        vec![
            "exact:type",
            "substring",
            "text",
            "exact:location.city",
            "range:price",
            "exact:bedrooms",
            "exact:bathrooms",
            "all:amenities",
            "geo",
            "exact:archived",
        ]
    );
}

#[test]
fn geo_parameters_ignored_without_geo_field() {
    let q = query(&[("lat", "51.5"), ("lng", "-0.12"), ("radius", "1500")]);
    assert_eq!(kinds(&q, &QueryConfig::default()), vec!["exact:archived"]);
}

#[test]
fn zero_prices_and_rooms_are_not_filters() {
    let q = query(&[("minPrice", "0"), ("maxPrice", "0"), ("bedrooms", "0"), ("bathrooms", "abc")]);
    assert_eq!(kinds(&q, &QueryConfig::default()), vec!["exact:archived"]);
}

#[test]
fn fractional_prices_survive() {
    let q = query(&[("minPrice", "99.5")]);
    let f = q.to_builder(&QueryConfig::default()).build();
    assert!(eval_filter(&doc! {"price": 100, "archived": false}, &f));
    assert!(!eval_filter(&doc! {"price": 99, "archived": false}, &f));
}

#[test]
fn amenities_from_json_array() {
    let raw = RawListingParams::from_json(r#"{"amenities": ["pool", "gym"], "bedrooms": 3}"#).unwrap();
    let q = ListingQuery::from_raw(&raw);
    assert_eq!(q.amenities, vec!["pool", "gym"]);
    let f = q.to_builder(&QueryConfig::default()).build();
    assert!(eval_filter(&doc! {"amenities": ["gym", "pool", "lift"], "bedrooms": 3, "archived": false}, &f));
    assert!(!eval_filter(&doc! {"amenities": ["gym"], "bedrooms": 3, "archived": false}, &f));
}

#[test]
fn malformed_json_is_an_error() {
    assert!(RawListingParams::from_json("\"London\"").is_err());
    assert!(RawListingParams::from_json("{\"city\": ").is_err());
}

#[test]
fn object_page_falls_back_to_first_page() {
    let raw = RawListingParams::from_json(r#"{"page": {}, "limit": "5"}"#).unwrap();
    let q = ListingQuery::from_raw(&raw);
    let p = pages(&q);
    assert_eq!((p.page(), p.limit()), (1, 5));
}

#[test]
fn operator_object_price_adds_no_criterion() {
    let raw = RawListingParams::from_json(r#"{"minPrice": {"$gt": 1}, "city": {"nested": 1}}"#).unwrap();
    let q = ListingQuery::from_raw(&raw);
    assert_eq!(q.min_price, None);
    assert_eq!(q.city, None);
    assert_eq!(kinds(&q, &QueryConfig::default()), vec!["exact:archived"]);
}

#[test]
fn null_list_and_overflowing_number_use_defaults() {
    let q = ListingQuery::from_raw(&RawListingParams::from_json(r#"{"limit": [null], "maxPrice": 1e400}"#).unwrap());
    assert_eq!(q.max_price, None);
    assert_eq!(pages(&q).limit(), 10);

    let q = ListingQuery::from_raw(&RawListingParams::from_json(r#"{"page": 1e400, "bedrooms": 2}"#).unwrap());
    assert_eq!(pages(&q).page(), 1);
    assert_eq!(q.bedrooms, Some(2.0));
}

#[test]
fn repeated_json_key_keeps_last_value() {
    let raw = RawListingParams::from_json(r#"{"page": "2", "page": "3"}"#).unwrap();
    assert_eq!(ListingQuery::from_raw(&raw).pagination.page.as_deref(), Some("3"));
}

#[test]
fn sort_override() {
    assert_eq!(query(&[("sort", "-price")]).sort_specs(), vec![SortSpec::desc("price")]);
    assert_eq!(query(&[("sort", " ")]).sort_specs(), vec![SortSpec::desc("createdAt")]);
}
