// Telemetry is a submodule of query
pub mod telemetry;

// Submodules for separation of concerns
mod eval;
mod exec;
mod parse;
pub mod render;
mod types;

// Public API re-exports
pub use eval::{EARTH_RADIUS_M, bson_cmp, compare_bson, compare_docs, eval_filter, haversine_m, text_score};
pub use exec::{count_docs, find_docs};
pub use parse::{parse_filter_doc, parse_filter_json};
pub use render::to_document;
pub use telemetry::QueryProbe;
pub(crate) use types::MAX_POPULATE_FIELDS;
pub use types::{
    CmpOp, Filter, FindOptions, Order, PopulateSpec, SortSpec, TEXT_SCORE_FIELD, TextField,
};
