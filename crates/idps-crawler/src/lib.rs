mod config;
mod crawler;
mod document;
mod error;
mod fetch;
mod frontier;
mod generator;
mod record;
mod selector;
mod store;
mod task;
mod value;

pub use config::{CrawlerConfig, RunOptions};
pub use crawler::{CrawlReport, Crawler, StopSignal};
pub use document::Document;
pub use error::{
    ConfigurationError, DocumentError, ExtractionError, FetchError, FrontierEmpty,
    PersistenceError,
};
pub use fetch::{Fetcher, HttpFetcher};
pub use frontier::Frontier;
pub use generator::UrlGenerator;
pub use record::{extract_records, Extraction, Fields, Record, RecordKey};
pub use selector::{Selector, TypedSelector};
pub use store::{MemoryStore, NoStore, RecordSource, Store};
pub use task::Task;
pub use value::{Value, ValueType};

pub use futures::future::BoxFuture;
