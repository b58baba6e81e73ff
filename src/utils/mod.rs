//! Utility modules: developer logging, JSON/BSON conversion, numeric conversions.
pub mod devlog;
pub mod json;
pub mod num;
