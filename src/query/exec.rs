use crate::collection::Collection;
use crate::document::Document;
use std::cmp::Ordering;

use super::eval::{compare_docs, eval_filter, text_score};
use super::telemetry;
use super::types::{Filter, FindOptions, MAX_SORT_FIELDS, SortSpec, TEXT_SCORE_FIELD};

/// Returns the matching documents, sorted by `opts.sort` (ties broken by id) and sliced by
/// `opts.skip` / `opts.limit`.
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Vec<Document> {
    let start = std::time::Instant::now();
    let specs: Vec<SortSpec> =
        opts.sort.iter().flatten().take(MAX_SORT_FIELDS).cloned().collect();
    let wants_score = specs.iter().any(|s| s.field == TEXT_SCORE_FIELD);
    let text = if wants_score { filter.text_node() } else { None };

    let mut matched: Vec<(Document, f64)> = col
        .get_all_documents()
        .into_iter()
        .filter(|d| eval_filter(&d.data, filter))
        .map(|d| {
            let score = match text {
                Some(Filter::Text { search, fields }) => text_score(&d.data, search, fields),
                _ => 0.0,
            };
            (d, score)
        })
        .collect();

    matched.sort_by(|(a, sa), (b, sb)| {
        let ord = compare_docs(&a.data, &b.data, &specs, Some((*sa, *sb)));
        if ord == Ordering::Equal { a.id.cmp(&b.id) } else { ord }
    });

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(usize::MAX);
    let page: Vec<Document> = matched.into_iter().skip(skip).take(limit).map(|(d, _)| d).collect();

    let dur_ms = start.elapsed().as_millis();
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"find\",\"collection\":\"{}\",\"duration_ms\":{},\"result_count\":{},\"limit\":{:?},\"skip\":{:?}}}",
        col.name_str(),
        crate::utils::num::u128_to_u64_saturating(dur_ms),
        page.len(),
        opts.limit,
        opts.skip
    );
    telemetry::log_query(&col.name_str(), filter, dur_ms, opts.limit, opts.skip);
    page
}

pub fn count_docs(col: &Collection, filter: &Filter) -> usize {
    let start = std::time::Instant::now();
    let n = col.count_matching(|d| eval_filter(d, filter));
    telemetry::log_query(&col.name_str(), filter, start.elapsed().as_millis(), None, None);
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CmpOp, Order};
    use bson::doc;

    fn seeded() -> Collection {
        let col = Collection::new("t".into());
        for (i, age) in [30, 40, 35, 40].iter().enumerate() {
            col.insert_document(Document::new(doc! {"age": *age, "n": i as i32}));
        }
        col
    }

    #[test]
    fn sort_skip_limit() {
        let col = seeded();
        let opts = FindOptions {
            sort: Some(vec![SortSpec { field: "age".into(), order: Order::Desc }]),
            skip: Some(1),
            limit: Some(2),
            ..FindOptions::default()
        };
        let docs = find_docs(&col, &Filter::True, &opts);
        let ages: Vec<i32> = docs.iter().map(|d| d.data.get_i32("age").unwrap()).collect();
        assert_eq!(ages, vec![40, 35]);
    }

    #[test]
    fn ties_are_ordered_by_id() {
        let col = seeded();
        let opts = FindOptions { sort: Some(vec![SortSpec::desc("age")]), ..FindOptions::default() };
        let docs = find_docs(&col, &Filter::True, &opts);
        assert!(docs[0].id < docs[1].id);
    }

    #[test]
    fn count_ignores_pagination() {
        let col = seeded();
        let f = Filter::Cmp { path: "age".into(), op: CmpOp::Gte, value: 35.into() };
        assert_eq!(count_docs(&col, &f), 3);
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        assert_eq!(find_docs(&col, &f, &opts).len(), 1);
    }
}
