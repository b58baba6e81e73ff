pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod import;
pub mod listing;
pub mod logger;
pub mod orchestrator;
pub mod pagination;
pub mod query;
pub mod types;
pub mod utils;
pub mod workflow;

pub use config::QueryConfig;
pub use errors::DbError;
pub use filter::{FilterBuilder, FilterCriterion};
pub use listing::{ListingQuery, RawListingParams};
pub use orchestrator::{CollectionStore, DocumentStore, ResponseEnvelope, execute_paged, search_listings};
pub use pagination::{PaginationParams, PaginationRequest, PaginationResult};
