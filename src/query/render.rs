//! Rendering of [`Filter`] trees into Mongo-style predicate documents.
//!
//! Conjunctions are flattened into a single document when their keys do not collide
//! (`{"type": "sale", "price": {"$gte": 1, "$lte": 2}}`); colliding keys such as two `$or`
//! groups fall back to an explicit `$and` array.

use bson::{Bson, Document as BsonDocument, doc};

use super::eval::EARTH_RADIUS_M;
use super::types::{CmpOp, Filter};

#[must_use]
pub fn to_document(filter: &Filter) -> BsonDocument {
    match filter {
        Filter::True => BsonDocument::new(),
        Filter::And(fs) => render_and(fs),
        Filter::Or(fs) => {
            let branches: Vec<Bson> = fs.iter().map(|f| Bson::Document(to_document(f))).collect();
            doc! { "$or": branches }
        }
        Filter::Not(f) => doc! { "$nor": [Bson::Document(to_document(f))] },
        Filter::Exists { path, exists } => field(path, doc! { "$exists": *exists }),
        Filter::In { path, values } => field(path, doc! { "$in": values.clone() }),
        Filter::Nin { path, values } => field(path, doc! { "$nin": values.clone() }),
        Filter::Cmp { path, op: CmpOp::Eq, value } => {
            // Operator-looking documents must stay wrapped to remain literal.
            if matches!(value, Bson::Document(_)) {
                field(path, doc! { "$eq": value.clone() })
            } else {
                let mut d = BsonDocument::new();
                d.insert(path.clone(), value.clone());
                d
            }
        }
        Filter::Cmp { path, op, value } => {
            let mut cond = BsonDocument::new();
            cond.insert(op.operator(), value.clone());
            field(path, cond)
        }
        Filter::Regex { path, pattern, case_insensitive } => {
            let mut cond = doc! { "$regex": pattern.clone() };
            if *case_insensitive {
                cond.insert("$options", "i");
            }
            field(path, cond)
        }
        Filter::All { path, values } => field(path, doc! { "$all": values.clone() }),
        Filter::Text { search, .. } => doc! { "$text": { "$search": search.clone() } },
        Filter::GeoWithin { path, lat, lng, radius_m } => {
            let center = Bson::Array(vec![Bson::Double(*lng), Bson::Double(*lat)]);
            let radians = Bson::Double(*radius_m / EARTH_RADIUS_M);
            field(path, doc! { "$geoWithin": { "$centerSphere": [center, radians] } })
        }
    }
}

fn field(path: &str, cond: BsonDocument) -> BsonDocument {
    let mut d = BsonDocument::new();
    d.insert(path.to_string(), Bson::Document(cond));
    d
}

fn render_and(fs: &[Filter]) -> BsonDocument {
    let parts: Vec<BsonDocument> = fs.iter().map(to_document).collect();
    let mut merged = BsonDocument::new();
    for part in &parts {
        for (k, v) in part {
            if !merge_into(&mut merged, k, v) {
                let all: Vec<Bson> = parts.iter().cloned().map(Bson::Document).collect();
                return doc! { "$and": all };
            }
        }
    }
    merged
}

/// Inserts `k: v`; operator documents on the same path combine when their operators are
/// disjoint. Returns false on an irreconcilable collision.
fn merge_into(target: &mut BsonDocument, k: &str, v: &Bson) -> bool {
    if !target.contains_key(k) {
        target.insert(k.to_string(), v.clone());
        return true;
    }
    let Bson::Document(incoming) = v else { return false };
    let Some(Bson::Document(existing)) = target.get_mut(k) else { return false };
    if !is_operator_doc(existing)
        || !is_operator_doc(incoming)
        || incoming.keys().any(|op| existing.contains_key(op))
    {
        return false;
    }
    for (op, val) in incoming {
        existing.insert(op.clone(), val.clone());
    }
    true
}

fn is_operator_doc(d: &BsonDocument) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}
