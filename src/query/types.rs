use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PATTERN_LEN: usize = 512;
pub(crate) const MAX_POPULATE_FIELDS: usize = 8;

/// Pseudo-field usable in a [`SortSpec`] to order by full-text relevance.
pub const TEXT_SCORE_FIELD: &str = "$textScore";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }

    /// Parses `field` (ascending) or `-field` (descending). Blank input yields `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(rest) if !rest.trim().is_empty() => Some(Self::desc(rest.trim())),
            Some(_) => None,
            None if s.is_empty() => None,
            None => Some(Self::asc(s.strip_prefix('+').unwrap_or(s))),
        }
    }
}

/// Replace the id stored at `path` with the referenced record from collection `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateSpec {
    pub path: String,
    pub from: String,
}

/// Options for `find_docs`.
///
/// Sorting is applied before slicing. Ties left by the sort keys are broken by document id,
/// so consecutive pages never overlap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    #[serde(default)]
    pub populate: Vec<PopulateSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

/// A field participating in full-text search, with its relevance weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub path: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, pattern: String, case_insensitive: bool },
    /// Array at `path` contains every one of `values`.
    All { path: String, values: Vec<Bson> },
    /// Any search token appears in any of the weighted fields.
    Text { search: String, fields: Vec<TextField> },
    /// Point at `path` lies within `radius_m` metres of (`lat`, `lng`).
    GeoWithin { path: String, lat: f64, lng: f64, radius_m: f64 },
}

impl Filter {
    /// Short operator label for logs.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::And(_) => "$and",
            Self::Or(_) => "$or",
            Self::Not(_) => "$not",
            Self::Exists { .. } => "$exists",
            Self::In { .. } => "$in",
            Self::Nin { .. } => "$nin",
            Self::Cmp { op, .. } => op.operator(),
            Self::Regex { .. } => "$regex",
            Self::All { .. } => "$all",
            Self::Text { .. } => "$text",
            Self::GeoWithin { .. } => "$geoWithin",
        }
    }

    /// Finds the first text-search node, used to score results for relevance sorting.
    #[must_use]
    pub fn text_node(&self) -> Option<&Self> {
        match self {
            Self::Text { .. } => Some(self),
            Self::And(fs) | Self::Or(fs) => fs.iter().find_map(Self::text_node),
            _ => None,
        }
    }
}
