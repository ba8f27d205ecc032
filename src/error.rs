//! Error kinds surfaced by the core.

use thiserror::Error;

/// Errors produced by ingestion, tidying, filtering, colouring and enrichment.
#[derive(Debug, Error)]
pub enum Error {
    /// Ingestion of a file whose extension no reader handles.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Underlying I/O or parse failure, with the diagnostic chain as source.
    #[error("failed to read {context}: {source:#}")]
    Read {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// A read succeeded but produced no rows.
    #[error("{0} contains no rows")]
    EmptyPayload(String),

    /// A colouring strategy was asked to classify an empty or all-missing attribute.
    #[error("cannot classify column {0}: no non-missing numeric values")]
    InvalidMeasure(String),

    /// A filter, enrichment or tidy step referenced a column not in the table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A logical dataset name is not registered.
    #[error("no dataset registered under {0:?}")]
    RegistryMiss(String),

    /// Bad configuration: unknown colormap, post-processor or unreadable config file.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown EPSG code or a failed coordinate transform.
    #[error("projection error: {0}")]
    Projection(String),

    /// Remote fetch failure.
    #[error("failed to fetch {url}: {source:#}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// A metric references a Census variable missing from a snapshot.
    #[error("census variable {0} is not present in the snapshot")]
    UnknownVariable(String),

    /// Polars rejected an operation on an otherwise valid table.
    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

impl Error {
    /// Wrap a reader failure, keeping the underlying diagnostic.
    pub(crate) fn read(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Read { context: context.into(), source: source.into() }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A non-fatal condition reported alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub component: &'static str,
    pub message: String,
}

impl Warning {
    pub(crate) fn new(component: &'static str, message: impl Into<String>) -> Self {
        let warning = Self { component, message: message.into() };
        log::warn!("[{}] {}", warning.component, warning.message);
        warning
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.component, self.message)
    }
}
