// Library interface for rust_manga_importer
// The binary and the integration tests both drive the pipeline through these modules

pub mod config;
pub mod dedupe;
pub mod error;
pub mod fetcher;
pub mod helpers;
pub mod http_client;
pub mod importer;
pub mod models;
pub mod range;
pub mod rate_limit;
pub mod report;
pub mod sanitize;
pub mod sources;
pub mod storage;

pub use config::{Config, EmptySelectionPolicy};
pub use error::{FetchError, ImportError, ItemFetchError, SourceError};
pub use fetcher::{Fetch, RateLimitedFetcher};
pub use importer::{ImportOutcome, Importer};
pub use models::{ImportRequest, ImportResult, Quality, SourceKind};
pub use sources::{SourceAdapter, SourceContext, SourceRegistry};
pub use storage::PageStore;
