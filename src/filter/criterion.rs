use bson::Bson;

use crate::query::{CmpOp, Filter, TextField};

/// One named predicate fragment of a listing search.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCriterion {
    Exact { field: String, value: Bson },
    /// At least one bound is always present.
    Range { field: String, min: Option<f64>, max: Option<f64> },
    /// Case-insensitive whole-field or partial match of `term` on any of `fields`.
    SubstringOr { fields: Vec<String>, term: String },
    SetContainsAll { field: String, values: Vec<Bson> },
    TextSearch { term: String, fields: Vec<TextField> },
    GeoNear { field: String, lat: f64, lng: f64, radius_m: f64 },
}

impl FilterCriterion {
    #[must_use]
    pub fn to_filter(&self) -> Filter {
        match self {
            Self::Exact { field, value } => {
                Filter::Cmp { path: field.clone(), op: CmpOp::Eq, value: value.clone() }
            }
            Self::Range { field, min, max } => {
                let mut bounds = Vec::with_capacity(2);
                if let Some(lo) = min {
                    bounds.push(Filter::Cmp { path: field.clone(), op: CmpOp::Gte, value: number_bson(*lo) });
                }
                if let Some(hi) = max {
                    bounds.push(Filter::Cmp { path: field.clone(), op: CmpOp::Lte, value: number_bson(*hi) });
                }
                conjunction(bounds)
            }
            Self::SubstringOr { fields, term } => {
                let escaped = regex::escape(term);
                let anchored = format!("^{escaped}$");
                Filter::Or(
                    fields
                        .iter()
                        .flat_map(|f| {
                            [
                                Filter::Regex { path: f.clone(), pattern: anchored.clone(), case_insensitive: true },
                                Filter::Regex { path: f.clone(), pattern: escaped.clone(), case_insensitive: true },
                            ]
                        })
                        .collect(),
                )
            }
            Self::SetContainsAll { field, values } => {
                Filter::All { path: field.clone(), values: values.clone() }
            }
            Self::TextSearch { term, fields } => {
                Filter::Text { search: term.clone(), fields: fields.clone() }
            }
            Self::GeoNear { field, lat, lng, radius_m } => {
                Filter::GeoWithin { path: field.clone(), lat: *lat, lng: *lng, radius_m: *radius_m }
            }
        }
    }
}

/// Combines criteria with logical AND. No criteria matches everything.
#[must_use]
pub fn compile(criteria: &[FilterCriterion]) -> Filter {
    conjunction(criteria.iter().map(FilterCriterion::to_filter).collect())
}

fn conjunction(mut parts: Vec<Filter>) -> Filter {
    match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    }
}

/// Whole numbers render as integers so predicates read the way they were requested.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(crate) fn number_bson(v: f64) -> Bson {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Bson::Int64(v as i64)
    } else {
        Bson::Double(v)
    }
}
