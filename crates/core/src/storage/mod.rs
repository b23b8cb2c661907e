mod error;
mod pipeline;
mod query;
mod traits;
mod types;

pub use error::{DateWindowError, RepositoryError, Result};
pub use pipeline::{run_pipeline, Accumulator, Pipeline, Stage};
pub use query::{
    compare_documents, compare_values, lookup, run_query, Direction, Filter, FindQuery, Patch, Sort,
};
pub use traits::{Document, DocumentStore};
pub use types::{key_timestamp, DateWindow, Page, Pagination, DEFAULT_LIMIT, DEFAULT_PAGE};
