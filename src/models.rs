//! Data models for equipment analytics.
//!
//! This module contains the core records (rows, aggregates, datasets) and the
//! response shapes handed to external consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name recorded when an upload does not carry one.
pub const PLACEHOLDER_FILE_NAME: &str = "dataset.csv";

/// One physical equipment record from an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRow {
    /// Equipment identifier (not required to be unique).
    #[serde(rename = "equipmentName")]
    pub name: String,
    /// Equipment type/class, kept exactly as it appeared in the source.
    #[serde(rename = "type")]
    pub category: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

/// Summary statistics derived from a sequence of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    /// Number of rows the statistics were computed over.
    pub row_count: usize,
    /// Mean flowrate, `0.0` when there are no rows.
    pub average_flowrate: f64,
    /// Mean pressure, `0.0` when there are no rows.
    pub average_pressure: f64,
    /// Mean temperature, `0.0` when there are no rows.
    pub average_temperature: f64,
    /// Row count per category.
    pub category_distribution: BTreeMap<String, usize>,
}

impl Aggregates {
    /// Whether every average is a finite number (JSON has no encoding for the rest).
    pub fn is_finite(&self) -> bool {
        self.average_flowrate.is_finite()
            && self.average_pressure.is_finite()
            && self.average_temperature.is_finite()
    }
}

/// A validated, aggregated upload that has not been persisted yet.
///
/// The store turns a draft into a [`Dataset`] by assigning the id and the
/// upload timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDraft {
    pub source_file_name: String,
    pub aggregates: Aggregates,
    pub rows: Vec<EquipmentRow>,
}

impl DatasetDraft {
    /// Finalize the draft with its store-assigned identity.
    pub fn into_dataset(self, id: u64, uploaded_at: DateTime<Utc>) -> Dataset {
        Dataset {
            id,
            source_file_name: self.source_file_name,
            uploaded_at,
            aggregates: self.aggregates,
            rows: self.rows,
        }
    }
}

/// One upload's persisted result. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: u64,
    pub source_file_name: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub aggregates: Aggregates,
    /// Rows in source order, malformed rows excluded.
    pub rows: Vec<EquipmentRow>,
}

impl Dataset {
    /// Number of valid rows retained.
    pub fn row_count(&self) -> usize {
        self.aggregates.row_count
    }

    /// Ordering key for recency: later upload first, higher id on ties.
    pub fn recency_key(&self) -> (DateTime<Utc>, u64) {
        (self.uploaded_at, self.id)
    }
}

/// Response shape for uploads and history entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetResponse {
    pub id: u64,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "uploadDate")]
    pub upload_date: String,
    pub total_equipment: usize,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub type_distribution: BTreeMap<String, usize>,
    pub data: Vec<EquipmentRow>,
}

impl From<&Dataset> for DatasetResponse {
    fn from(dataset: &Dataset) -> Self {
        let file_name = if dataset.source_file_name.is_empty() {
            PLACEHOLDER_FILE_NAME.to_string()
        } else {
            dataset.source_file_name.clone()
        };

        Self {
            id: dataset.id,
            file_name,
            upload_date: dataset.uploaded_at.to_rfc3339(),
            total_equipment: dataset.aggregates.row_count,
            avg_flowrate: dataset.aggregates.average_flowrate,
            avg_pressure: dataset.aggregates.average_pressure,
            avg_temperature: dataset.aggregates.average_temperature,
            type_distribution: dataset.aggregates.category_distribution.clone(),
            data: dataset.rows.clone(),
        }
    }
}

/// Share of one category in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    #[serde(rename = "type")]
    pub category: String,
    pub count: usize,
    /// Percentage of all rows, in `0.0..=100.0`.
    pub percentage: f64,
}

/// Single-dataset report shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    #[serde(flatten)]
    pub dataset: DatasetResponse,
    /// Categories ranked by count (highest first).
    pub type_breakdown: Vec<CategoryShare>,
}
