//! Error taxonomy for the ingestion pipeline and dataset store.

use std::path::PathBuf;
use thiserror::Error;

/// Rejection of an uploaded file. Display strings are the user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The input cannot be read as delimited tabular data.
    #[error("Invalid CSV file")]
    InvalidFormat,

    /// A required header is absent.
    #[error("Missing column: {0}")]
    MissingColumn(String),
}

/// Failure inside the dataset store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset {0} not found")]
    NotFound(u64),

    #[error("storage I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset aggregates are not finite")]
    NonFiniteAggregates,

    #[error("corrupt record at {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Anything the dataset service can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("report rendering failed: {0:#}")]
    Render(anyhow::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl ServiceError {
    /// Whether the error is a missing dataset.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::NotFound(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_messages() {
        assert_eq!(IngestError::InvalidFormat.to_string(), "Invalid CSV file");
        assert_eq!(
            IngestError::MissingColumn("Flowrate".to_string()).to_string(),
            "Missing column: Flowrate"
        );
    }

    #[test]
    fn test_service_error_passes_through_ingest_message() {
        let err = ServiceError::from(IngestError::MissingColumn("Type".to_string()));
        assert_eq!(err.to_string(), "Missing column: Type");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_detection() {
        let err = ServiceError::from(StoreError::NotFound(3));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "dataset 3 not found");
    }
}
