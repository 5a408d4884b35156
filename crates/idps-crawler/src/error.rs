use thiserror::Error;

/// A URL could not be turned into a document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("couldn't download {url} got: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("couldn't download {url} got status {status}")]
    Status { url: String, status: u16 },

    #[error("couldn't decompress {url} got: {source}")]
    Decompress {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't parse {url} got: {source}")]
    Document {
        url: String,
        #[source]
        source: DocumentError,
    },

    #[error("couldn't download {url} got: {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Decompress { url, .. }
            | Self::Document { url, .. }
            | Self::Other { url, .. } => url,
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid XML: {0}")]
    Xml(String),
}

/// A single field couldn't be produced; the field is absent from its record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("selector {selector}: couldn't evaluate query got: {message}")]
    Query { selector: String, message: String },

    #[error("selector {selector}: refinement doesn't match {raw:?}")]
    NoMatch { selector: String, raw: String },

    #[error("selector {selector}: {raw:?} is not a valid {expected}")]
    TypeMismatch {
        selector: String,
        raw: String,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
#[error("couldn't store {count} records of task {task} got: {message}")]
pub struct PersistenceError {
    pub task: String,
    pub count: usize,
    pub message: String,
}

/// The task definition can't be run at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("task name is empty")]
    EmptyTaskName,

    #[error("task {task}: selector #{index} has an empty name")]
    EmptySelectorName { task: String, index: usize },

    #[error("task {task}: duplicate selector name {name}")]
    DuplicateSelector { task: String, name: String },

    #[error("selector {selector}: invalid XPath {query:?} got: {message}")]
    InvalidQuery {
        selector: String,
        query: String,
        message: String,
    },

    #[error("selector {selector}: invalid refinement {pattern:?} got: {message}")]
    InvalidRefinement {
        selector: String,
        pattern: String,
        message: String,
    },

    #[error("url template {template:?}: placeholder {{{field}}} is not a source field")]
    UnknownPlaceholder { template: String, field: String },

    #[error("url template {template:?}: unterminated placeholder")]
    UnterminatedPlaceholder { template: String },

    #[error("url template {template:?}: source field {field} is never used")]
    UnusedSourceField { template: String, field: String },

    #[error("url template {template:?}: dynamic generator without source fields")]
    MissingSourceFields { template: String },

    #[error("task {task}: recursive generator reads unknown field {field}")]
    UnknownSourceField { task: String, field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("frontier is empty")]
pub struct FrontierEmpty;
