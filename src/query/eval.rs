use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{
    CmpOp, Filter, MAX_PATH_DEPTH, MAX_PATTERN_LEN, MAX_SORT_FIELDS, Order, SortSpec,
    TEXT_SCORE_FIELD, TextField,
};

/// Radius used both for distance checks and for radian conversion when rendering.
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

#[must_use]
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            (Some(v), CmpOp::Eq) => matches_eq(v, value),
            (Some(v), CmpOp::Gt) => bson_cmp(v, value).is_some_and(|o| o == Ordering::Greater),
            (Some(v), CmpOp::Gte) => bson_cmp(v, value).is_some_and(|o| o != Ordering::Less),
            (Some(v), CmpOp::Lt) => bson_cmp(v, value).is_some_and(|o| o == Ordering::Less),
            (Some(v), CmpOp::Lte) => bson_cmp(v, value).is_some_and(|o| o != Ordering::Greater),
            (None, _) => false,
        },
        Filter::Regex { path, pattern, case_insensitive } => match get_path(doc, path) {
            Some(Bson::String(s)) => regex_match(pattern, *case_insensitive, s),
            Some(Bson::Array(items)) => items.iter().any(|it| match it {
                Bson::String(s) => regex_match(pattern, *case_insensitive, s),
                _ => false,
            }),
            _ => false,
        },
        Filter::All { path, values } => match get_path(doc, path) {
            Some(Bson::Array(items)) => values.iter().all(|want| items.iter().any(|it| bson_equal(it, want))),
            // A scalar field only satisfies a single-element requirement.
            Some(v) => !values.is_empty() && values.iter().all(|want| bson_equal(v, want)),
            None => false,
        },
        Filter::Text { search, fields } => text_score(doc, search, fields) > 0.0,
        Filter::GeoWithin { path, lat, lng, radius_m } => get_path(doc, path)
            .and_then(point_of)
            .is_some_and(|(plat, plng)| haversine_m(*lat, *lng, plat, plng) <= *radius_m),
    }
}

fn regex_match(pattern: &str, case_insensitive: bool, s: &str) -> bool {
    if pattern.len() > MAX_PATTERN_LEN {
        return false;
    }
    regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .is_ok_and(|re| re.is_match(s))
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().any(|x| matches_eq(v, x))
}

/// Equality with array-membership semantics: an array field equals a scalar it contains.
fn matches_eq(field: &Bson, value: &Bson) -> bool {
    if bson_equal(field, value) {
        return true;
    }
    match (field, value) {
        (Bson::Array(items), v) if !matches!(v, Bson::Array(_)) => {
            items.iter().any(|it| bson_equal(it, v))
        }
        _ => false,
    }
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut iter = path.split('.');
    let first = iter.next()?;
    let mut depth = 1usize;
    let mut cur: Option<&Bson> = doc.get(first);
    for part in iter {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Some(Bson::Document(d)) => cur = d.get(part),
            _ => return None,
        }
    }
    cur
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn to_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[allow(clippy::float_cmp, clippy::cast_precision_loss)]
pub(crate) fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x) == *y,
        (Bson::Int64(x), Bson::Int32(y)) => *x == i64::from(*y),
        (Bson::Int32(x), Bson::Double(y)) => f64::from(*x) == *y,
        (Bson::Double(x), Bson::Int32(y)) => *x == f64::from(*y),
        (Bson::Int64(x), Bson::Double(y)) => (*x as f64) == *y,
        (Bson::Double(x), Bson::Int64(y)) => *x == (*y as f64),
        _ => a == b,
    }
}

/// Ordering between comparable values; `None` when the types cannot be compared.
#[must_use]
pub fn bson_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(af), Some(bf)) = (to_f64(a), to_f64(b)) {
        return af.partial_cmp(&bf);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        _ => None,
    }
}

/// Total order used for sorting: comparable values by value, otherwise by type rank.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    bson_cmp(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Boolean(_) => 5,
        Bson::DateTime(_) => 6,
        _ => 7,
    }
}

/// Compares two documents by `specs`. `scores` carries the text-relevance score of each side
/// and is consulted for [`TEXT_SCORE_FIELD`] keys.
#[must_use]
pub fn compare_docs(
    a: &BsonDocument,
    b: &BsonDocument,
    specs: &[SortSpec],
    scores: Option<(f64, f64)>,
) -> Ordering {
    for s in specs.iter().take(MAX_SORT_FIELDS) {
        let ord = if s.field == TEXT_SCORE_FIELD {
            scores.map_or(Ordering::Equal, |(sa, sb)| sa.total_cmp(&sb))
        } else {
            match (get_path(a, &s.field), get_path(b, &s.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_bson(x, y),
            }
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Lowercased alphanumeric tokens.
pub(crate) fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Weighted relevance: for every field, its weight times the number of distinct search
/// tokens found in it. Zero means no match.
#[must_use]
pub fn text_score(doc: &BsonDocument, search: &str, fields: &[TextField]) -> f64 {
    let mut wanted = tokenize(search);
    wanted.sort();
    wanted.dedup();
    if wanted.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    for f in fields {
        let Some(v) = get_path(doc, &f.path) else { continue };
        let mut tokens = Vec::new();
        collect_text(v, &mut tokens);
        let hits = wanted.iter().filter(|w| tokens.contains(w)).count();
        #[allow(clippy::cast_precision_loss)]
        {
            score += f64::from(f.weight) * hits as f64;
        }
    }
    score
}

fn collect_text(v: &Bson, out: &mut Vec<String>) {
    match v {
        Bson::String(s) => out.extend(tokenize(s)),
        Bson::Array(items) => items.iter().for_each(|it| collect_text(it, out)),
        _ => {}
    }
}

/// Extracts (lat, lng) from a GeoJSON point, a `[lng, lat]` pair or a `{lat, lng}` document.
pub(crate) fn point_of(v: &Bson) -> Option<(f64, f64)> {
    match v {
        Bson::Array(pair) if pair.len() == 2 => Some((to_f64(&pair[1])?, to_f64(&pair[0])?)),
        Bson::Document(d) => {
            if let Some(coords) = d.get("coordinates") {
                return point_of(coords);
            }
            Some((to_f64(d.get("lat")?)?, to_f64(d.get("lng")?)?))
        }
        _ => None,
    }
}

#[must_use]
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dp = (lat2 - lat1).to_radians();
    let dl = (lng2 - lng1).to_radians();
    let a = (dp / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}
