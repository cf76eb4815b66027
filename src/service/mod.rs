//! Dataset service.
//!
//! Runs the upload pipeline (normalize, aggregate, persist and prune) and
//! translates stored datasets into the external response shapes. Uploads are
//! rejected before anything is persisted.

use crate::analysis::{aggregate, category_shares, generate_summary_text};
use crate::error::ServiceError;
use crate::ingest::normalize;
use crate::models::{Dataset, DatasetDraft, DatasetReport, DatasetResponse, PLACEHOLDER_FILE_NAME};
use crate::report::ReportRenderer;
use crate::store::DatasetStore;
use std::sync::Arc;
use tracing::{debug, info};

/// A rendered report ready to be written or served.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Entry point for uploads, history and single-dataset queries.
#[derive(Debug, Clone)]
pub struct DatasetService {
    store: Arc<DatasetStore>,
}

impl DatasetService {
    pub fn new(store: Arc<DatasetStore>) -> Self {
        Self { store }
    }

    /// Ingest one uploaded file and persist the resulting dataset.
    pub fn upload(&self, file_name: Option<&str>, bytes: &[u8]) -> Result<DatasetResponse, ServiceError> {
        let file_name = file_name
            .filter(|name| !name.is_empty())
            .unwrap_or(PLACEHOLDER_FILE_NAME);

        let normalized = normalize(bytes)?;
        let aggregates = aggregate(&normalized.rows);
        debug!("Summary for {}:\n{}", file_name, generate_summary_text(&aggregates));

        let dataset = self.store.create(DatasetDraft {
            source_file_name: file_name.to_string(),
            aggregates,
            rows: normalized.rows,
        })?;

        info!(
            "Ingested {} as dataset {}: {} rows kept, {} dropped",
            file_name,
            dataset.id,
            dataset.row_count(),
            normalized.dropped
        );

        Ok(DatasetResponse::from(&dataset))
    }

    /// The most recent datasets, newest first.
    pub fn history(&self) -> Result<Vec<DatasetResponse>, ServiceError> {
        let datasets = self.store.list_recent(self.store.retention())?;
        Ok(datasets.iter().map(DatasetResponse::from).collect())
    }

    /// One dataset in report shape.
    pub fn get_by_id(&self, id: u64) -> Result<DatasetReport, ServiceError> {
        let dataset = self.store.get(id)?;
        Ok(build_report(&dataset))
    }

    /// Render one dataset with the given renderer.
    pub fn render_report(
        &self,
        id: u64,
        renderer: &dyn ReportRenderer,
    ) -> Result<RenderedReport, ServiceError> {
        let dataset = self.store.get(id)?;
        let bytes = renderer.render(&dataset).map_err(ServiceError::Render)?;

        Ok(RenderedReport {
            file_name: crate::report::report_file_name(id, renderer),
            content_type: renderer.content_type(),
            bytes,
        })
    }
}

/// Map a stored dataset into the report DTO.
pub fn build_report(dataset: &Dataset) -> DatasetReport {
    DatasetReport {
        dataset: DatasetResponse::from(dataset),
        type_breakdown: category_shares(
            &dataset.aggregates.category_distribution,
            dataset.row_count(),
        ),
    }
}
