use bson::{Bson, Document as BsonDocument};

use super::criterion::{FilterCriterion, compile};
use crate::query::{Filter, TextField, render};

/// Accumulates search criteria in the order they are added.
///
/// The builder is a value: each method consumes it and returns the extended builder, so a
/// partially built query can be cloned and branched freely. Every method is a no-op when its
/// input is absent or empty. Text and geo criteria additionally require the builder to be
/// configured with [`FilterBuilder::with_text_search`] / [`FilterBuilder::with_geo`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterBuilder {
    criteria: Vec<FilterCriterion>,
    text_fields: Option<Vec<TextField>>,
    geo_field: Option<String>,
}

impl FilterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables full-text search over the given weighted fields. An empty list leaves it off.
    #[must_use]
    pub fn with_text_search(mut self, fields: Vec<TextField>) -> Self {
        self.text_fields = (!fields.is_empty()).then_some(fields);
        self
    }

    /// Enables geospatial filtering against the point stored at `field`.
    #[must_use]
    pub fn with_geo(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.geo_field = (!field.trim().is_empty()).then_some(field);
        self
    }

    #[must_use]
    pub fn text_search_enabled(&self) -> bool {
        self.text_fields.is_some()
    }

    #[must_use]
    pub fn geo_enabled(&self) -> bool {
        self.geo_field.is_some()
    }

    fn push(mut self, c: FilterCriterion) -> Self {
        self.criteria.push(c);
        self
    }

    #[must_use]
    pub fn exact<V: Into<Bson>>(self, field: &str, value: Option<V>) -> Self {
        match value.map(Into::into) {
            None | Some(Bson::Null) => self,
            Some(Bson::String(s)) if s.trim().is_empty() => self,
            Some(v) => self.push(FilterCriterion::Exact { field: field.to_string(), value: v }),
        }
    }

    /// `field >= min` and/or `field <= max`; non-finite bounds count as absent.
    #[must_use]
    pub fn range(self, field: &str, min: Option<f64>, max: Option<f64>) -> Self {
        let min = min.filter(|v| v.is_finite());
        let max = max.filter(|v| v.is_finite());
        if min.is_none() && max.is_none() {
            return self;
        }
        self.push(FilterCriterion::Range { field: field.to_string(), min, max })
    }

    #[must_use]
    pub fn substring_or<S: AsRef<str>>(self, fields: &[S], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else { return self };
        if fields.is_empty() {
            return self;
        }
        self.push(FilterCriterion::SubstringOr {
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
            term: term.to_string(),
        })
    }

    #[must_use]
    pub fn set_contains_all<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values: Vec<Bson> = values
            .into_iter()
            .map(Into::into)
            .filter(|v| !matches!(v, Bson::String(s) if s.trim().is_empty()))
            .collect();
        if values.is_empty() {
            return self;
        }
        self.push(FilterCriterion::SetContainsAll { field: field.to_string(), values })
    }

    #[must_use]
    pub fn text_search(self, term: Option<&str>) -> Self {
        let Some(fields) = self.text_fields.clone() else { return self };
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else { return self };
        self.push(FilterCriterion::TextSearch { term: term.to_string(), fields })
    }

    /// Points within `radius_m` metres of (`lat`, `lng`). Out-of-range coordinates and
    /// non-positive radii are ignored.
    #[must_use]
    pub fn geo_near(self, lat: Option<f64>, lng: Option<f64>, radius_m: Option<f64>) -> Self {
        let Some(field) = self.geo_field.clone() else { return self };
        let (Some(lat), Some(lng), Some(radius_m)) = (lat, lng, radius_m) else { return self };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return self;
        }
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return self;
        }
        self.push(FilterCriterion::GeoNear { field, lat, lng, radius_m })
    }

    #[must_use]
    pub fn criteria(&self) -> &[FilterCriterion] {
        &self.criteria
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Compiles the accumulated criteria. Repeated calls give equal results.
    #[must_use]
    pub fn build(&self) -> Filter {
        compile(&self.criteria)
    }

    /// The compiled predicate as a Mongo-style document.
    #[must_use]
    pub fn build_document(&self) -> BsonDocument {
        render::to_document(&self.build())
    }
}
