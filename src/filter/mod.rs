//! Composition of listing search criteria into a single query predicate.

mod builder;
mod criterion;

pub use builder::FilterBuilder;
pub use criterion::{FilterCriterion, compile};
pub(crate) use criterion::number_bson;
