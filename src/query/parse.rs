use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};

use super::eval::{EARTH_RADIUS_M, point_of, to_f64};
use super::types::{CmpOp, Filter, MAX_IN_SET, TextField};

/// Parses a Mongo-style predicate document, the inverse of `render::to_document`.
///
/// `text_fields` resolves `$text` clauses, which carry no field list of their own.
///
/// # Errors
/// Returns `DbError::QueryError` on unknown operators or malformed operands.
pub fn parse_filter_doc(doc: &BsonDocument, text_fields: &[TextField]) -> Result<Filter, DbError> {
    let mut parts = Vec::with_capacity(doc.len());
    for (key, val) in doc {
        parts.push(parse_clause(key, val, text_fields)?);
    }
    Ok(collapse_and(parts))
}

/// # Errors
/// Returns an error if the JSON string is not an object or holds an invalid predicate.
pub fn parse_filter_json(json: &str, text_fields: &[TextField]) -> Result<Filter, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    let doc = crate::utils::json::json_value_to_bson_document(&val)?;
    parse_filter_doc(&doc, text_fields)
}

fn collapse_and(mut parts: Vec<Filter>) -> Filter {
    match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    }
}

fn parse_clause(key: &str, val: &Bson, text_fields: &[TextField]) -> Result<Filter, DbError> {
    match key {
        "$and" | "$or" | "$nor" => {
            let Bson::Array(items) = val else {
                return Err(DbError::QueryError(format!("{key} requires an array")));
            };
            let subs = items
                .iter()
                .map(|it| match it {
                    Bson::Document(d) => parse_filter_doc(d, text_fields),
                    _ => Err(DbError::QueryError(format!("{key} entries must be documents"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match key {
                "$and" => Filter::And(subs),
                "$or" => Filter::Or(subs),
                _ => Filter::Not(Box::new(Filter::Or(subs))),
            })
        }
        "$text" => {
            let search = match val {
                Bson::Document(d) => match d.get("$search") {
                    Some(Bson::String(s)) => s.clone(),
                    _ => return Err(DbError::QueryError("$text requires $search".into())),
                },
                _ => return Err(DbError::QueryError("$text requires a document".into())),
            };
            Ok(Filter::Text { search, fields: text_fields.to_vec() })
        }
        k if k.starts_with('$') => Err(DbError::QueryError(format!("unknown operator {k}"))),
        path => match val {
            Bson::Document(cond) if cond.keys().next().is_some_and(|k| k.starts_with('$')) => {
                parse_conditions(path, cond)
            }
            other => Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: other.clone() }),
        },
    }
}

fn parse_conditions(path: &str, cond: &BsonDocument) -> Result<Filter, DbError> {
    let mut parts = Vec::with_capacity(cond.len());
    let case_insensitive = matches!(cond.get("$options"), Some(Bson::String(o)) if o.contains('i'));
    for (op, val) in cond {
        let p = path.to_string();
        let f = match op.as_str() {
            "$eq" => Filter::Cmp { path: p, op: CmpOp::Eq, value: val.clone() },
            "$gt" => Filter::Cmp { path: p, op: CmpOp::Gt, value: val.clone() },
            "$gte" => Filter::Cmp { path: p, op: CmpOp::Gte, value: val.clone() },
            "$lt" => Filter::Cmp { path: p, op: CmpOp::Lt, value: val.clone() },
            "$lte" => Filter::Cmp { path: p, op: CmpOp::Lte, value: val.clone() },
            "$ne" => Filter::Not(Box::new(Filter::Cmp { path: p, op: CmpOp::Eq, value: val.clone() })),
            "$in" => Filter::In { path: p, values: array_operand(op, val)? },
            "$nin" => Filter::Nin { path: p, values: array_operand(op, val)? },
            "$all" => Filter::All { path: p, values: array_operand(op, val)? },
            "$exists" => match val {
                Bson::Boolean(b) => Filter::Exists { path: p, exists: *b },
                _ => return Err(DbError::QueryError("$exists requires a boolean".into())),
            },
            "$regex" => match val {
                Bson::String(s) => Filter::Regex { path: p, pattern: s.clone(), case_insensitive },
                _ => return Err(DbError::QueryError("$regex requires a string".into())),
            },
            "$options" => continue,
            "$geoWithin" => parse_geo_within(p, val)?,
            other => return Err(DbError::QueryError(format!("unknown operator {other}"))),
        };
        parts.push(f);
    }
    Ok(collapse_and(parts))
}

fn array_operand(op: &str, val: &Bson) -> Result<Vec<Bson>, DbError> {
    match val {
        Bson::Array(items) if items.len() > MAX_IN_SET => {
            Err(DbError::QueryError(format!("{op} accepts at most {MAX_IN_SET} values")))
        }
        Bson::Array(items) => Ok(items.clone()),
        _ => Err(DbError::QueryError(format!("{op} requires an array"))),
    }
}

fn parse_geo_within(path: String, val: &Bson) -> Result<Filter, DbError> {
    let bad = || DbError::QueryError("$geoWithin requires $centerSphere: [[lng, lat], radians]".into());
    let Bson::Document(d) = val else { return Err(bad()) };
    let Some(Bson::Array(sphere)) = d.get("$centerSphere") else { return Err(bad()) };
    if sphere.len() != 2 {
        return Err(bad());
    }
    let (lat, lng) = point_of(&sphere[0]).ok_or_else(bad)?;
    let radians = to_f64(&sphere[1]).ok_or_else(bad)?;
    Ok(Filter::GeoWithin { path, lat, lng, radius_m: radians * EARTH_RADIUS_M })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::render::to_document;

    #[test]
    fn parses_operators_and_equality() {
        let f = parse_filter_json(
            r#"{"type":"sale","price":{"$gte":100,"$lte":200},"amenities":{"$all":["pool"]}}"#,
            &[],
        )
        .unwrap();
        let Filter::And(parts) = f else { panic!("expected conjunction") };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn rendered_document_parses_back_to_same_rendering() {
        let f = Filter::And(vec![
            Filter::Cmp { path: "type".into(), op: CmpOp::Eq, value: "sale".into() },
            Filter::Or(vec![
                Filter::Regex { path: "location.city".into(), pattern: "^lon$".into(), case_insensitive: true },
                Filter::Regex { path: "location.city".into(), pattern: "lon".into(), case_insensitive: true },
            ]),
        ]);
        let rendered = to_document(&f);
        let back = parse_filter_doc(&rendered, &[]).unwrap();
        assert_eq!(to_document(&back), rendered);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert!(matches!(parse_filter_json(r#"{"a":{"$near":1}}"#, &[]), Err(DbError::QueryError(_))));
        assert!(parse_filter_json("[1]", &[]).is_err());
    }

    #[test]
    fn oversized_set_operand_is_rejected() {
        let values: Vec<Bson> = (0..=MAX_IN_SET).map(|i| Bson::String(format!("a{i}"))).collect();
        let d = bson::doc! {"amenities": {"$all": values}};
        assert!(matches!(parse_filter_doc(&d, &[]), Err(DbError::QueryError(_))));
    }
}
