//! OData collection access
//!
//! - [`filter`]: `$filter` / `$select` query construction
//! - [`envelope`]: the two paging envelopes (next-link and cursor)
//! - [`fetcher`]: follows continuation links until a collection is exhausted

pub mod envelope;
pub mod fetcher;
pub mod filter;

pub use envelope::Page;
pub use fetcher::PagedFetcher;
pub use filter::{Filter, Query};
