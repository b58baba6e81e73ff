//! Listing search parameters: loose client input to a typed query, then to filter criteria.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use serde_json::value::RawValue as JsonText;

use crate::config::QueryConfig;
use crate::document::CREATED_AT_FIELD;
use crate::errors::DbError;
use crate::filter::{FilterBuilder, number_bson};
use crate::pagination::PaginationRequest;
use crate::query::SortSpec;

pub const CITY_FIELD: &str = "location.city";
pub const ADDRESS_FIELD: &str = "location.address";
const LOCATION_FIELDS: [&str; 2] = [CITY_FIELD, ADDRESS_FIELD];

/// A single query-string or JSON value as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<RawValue>),
}

impl RawValue {
    /// Null, objects and non-finite numbers have no raw form. Lists keep their usable elements.
    #[must_use]
    pub fn from_json_value(v: Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => n.as_f64().filter(|n| n.is_finite()).map(Self::Number),
            Value::String(s) => Some(Self::Text(s)),
            Value::Array(items) => Some(Self::List(items.into_iter().filter_map(Self::from_json_value).collect())),
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Trimmed, non-empty text. Lists yield their first element.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Self::Number(n) if n.is_finite() => Some(format_number(*n)),
            Self::Number(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::List(items) => items.first().and_then(Self::as_text),
        }
    }

    /// Finite numeric value. Text is parsed after trimming.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Bool(_) => None,
            Self::List(items) => items.first().and_then(Self::as_number),
        }
        .filter(|n| n.is_finite())
    }

    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().filter_map(Self::as_text).collect(),
            other => other.as_text().into_iter().collect(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 { (n as i64).to_string() } else { n.to_string() }
}

/// Listing search parameters before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingParams {
    #[serde(rename = "type")]
    pub property_type: Option<RawValue>,
    pub city: Option<RawValue>,
    pub location: Option<RawValue>,
    pub search_term: Option<RawValue>,
    pub min_price: Option<RawValue>,
    pub max_price: Option<RawValue>,
    pub bedrooms: Option<RawValue>,
    pub bathrooms: Option<RawValue>,
    pub amenities: Option<RawValue>,
    pub archived: Option<RawValue>,
    pub lat: Option<RawValue>,
    pub lng: Option<RawValue>,
    pub radius: Option<RawValue>,
    pub sort: Option<RawValue>,
    pub page: Option<RawValue>,
    pub limit: Option<RawValue>,
}

impl RawListingParams {
    fn slot(&mut self, key: &str) -> Option<&mut Option<RawValue>> {
        Some(match key {
            "type" => &mut self.property_type,
            "city" => &mut self.city,
            "location" => &mut self.location,
            "searchTerm" => &mut self.search_term,
            "minPrice" => &mut self.min_price,
            "maxPrice" => &mut self.max_price,
            "bedrooms" => &mut self.bedrooms,
            "bathrooms" => &mut self.bathrooms,
            "amenities" | "amenities[]" => &mut self.amenities,
            "archived" => &mut self.archived,
            "lat" => &mut self.lat,
            "lng" => &mut self.lng,
            "radius" => &mut self.radius,
            "sort" => &mut self.sort,
            "page" => &mut self.page,
            "limit" => &mut self.limit,
            other => {
                log::debug!("ignoring unknown listing parameter {other}");
                return None;
            }
        })
    }

    /// Query-string style key/value pairs. Repeated `amenities` keys accumulate; for every
    /// other key the last occurrence wins. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut out = Self::default();
        for (k, v) in pairs {
            let key = k.as_ref();
            let v = RawValue::Text(v.into());
            if matches!(key, "amenities" | "amenities[]") {
                out.amenities = Some(match out.amenities.take() {
                    None => RawValue::List(vec![v]),
                    Some(RawValue::List(mut items)) => {
                        items.push(v);
                        RawValue::List(items)
                    }
                    Some(prev) => RawValue::List(vec![prev, v]),
                });
            } else if let Some(slot) = out.slot(key) {
                *slot = Some(v);
            }
        }
        out
    }

    /// A JSON object of parameters. Values of an unusable shape (null, nested objects,
    /// numbers outside the `f64` range) are treated as absent. A repeated key keeps its
    /// last value.
    ///
    /// # Errors
    /// Input that is not a syntactically valid JSON object.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        let fields: HashMap<String, Box<JsonText>> = serde_json::from_str(json)?;
        let mut out = Self::default();
        for (key, text) in fields {
            let value = match serde_json::from_str::<Value>(text.get()) {
                Ok(v) => RawValue::from_json_value(v),
                Err(e) => {
                    log::debug!("ignoring unreadable listing parameter {key}: {e}");
                    None
                }
            };
            if let Some(slot) = out.slot(&key) {
                *slot = value;
            }
        }
        Ok(out)
    }
}

/// Validated listing search. Absent filters are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingQuery {
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub location: Option<String>,
    pub search_term: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub amenities: Vec<String>,
    pub archived: bool,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_m: Option<f64>,
    pub sort: Option<SortSpec>,
    pub pagination: PaginationRequest,
}

/// Zero counts as "not provided" for price and room filters.
fn nonzero(v: Option<&RawValue>) -> Option<f64> {
    v.and_then(RawValue::as_number).filter(|n| *n != 0.0)
}

fn text(v: Option<&RawValue>) -> Option<String> {
    v.and_then(RawValue::as_text)
}

impl ListingQuery {
    #[must_use]
    pub fn from_raw(raw: &RawListingParams) -> Self {
        let archived = match &raw.archived {
            Some(RawValue::Bool(b)) => *b,
            other => text(other.as_ref()).is_some_and(|s| s == "true"),
        };
        Self {
            property_type: text(raw.property_type.as_ref()),
            city: text(raw.city.as_ref()),
            location: text(raw.location.as_ref()),
            search_term: text(raw.search_term.as_ref()),
            min_price: nonzero(raw.min_price.as_ref()),
            max_price: nonzero(raw.max_price.as_ref()),
            bedrooms: nonzero(raw.bedrooms.as_ref()),
            bathrooms: nonzero(raw.bathrooms.as_ref()),
            amenities: raw.amenities.as_ref().map(RawValue::as_list).unwrap_or_default(),
            archived,
            lat: raw.lat.as_ref().and_then(RawValue::as_number),
            lng: raw.lng.as_ref().and_then(RawValue::as_number),
            radius_m: raw.radius.as_ref().and_then(RawValue::as_number),
            sort: text(raw.sort.as_ref()).and_then(|s| SortSpec::parse(&s)),
            pagination: PaginationRequest {
                page: text(raw.page.as_ref()),
                limit: text(raw.limit.as_ref()),
            },
        }
    }

    /// Criteria in selectivity order: type, location, search term, city, price, rooms,
    /// amenities, geo, archived.
    #[must_use]
    pub fn to_builder(&self, cfg: &QueryConfig) -> FilterBuilder {
        let mut b = FilterBuilder::new();
        if let Some(fields) = cfg.text_fields() {
            b = b.with_text_search(fields);
        }
        if let Some(geo) = &cfg.geo_field {
            b = b.with_geo(geo.as_str());
        }

        b = b
            .exact("type", self.property_type.as_deref())
            .substring_or(&LOCATION_FIELDS, self.location.as_deref());
        b = if b.text_search_enabled() {
            b.text_search(self.search_term.as_deref())
        } else {
            b.substring_or(&LOCATION_FIELDS, self.search_term.as_deref())
        };
        b.exact(CITY_FIELD, self.city.as_deref())
            .range("price", self.min_price, self.max_price)
            .exact("bedrooms", self.bedrooms.map(number_bson))
            .exact("bathrooms", self.bathrooms.map(number_bson))
            .set_contains_all("amenities", self.amenities.iter().map(String::as_str))
            .geo_near(self.lat, self.lng, self.radius_m)
            .exact("archived", Some(self.archived))
    }

    /// The requested sort, or newest first.
    #[must_use]
    pub fn sort_specs(&self) -> Vec<SortSpec> {
        vec![self.sort.clone().unwrap_or_else(|| SortSpec::desc(CREATED_AT_FIELD))]
    }
}
