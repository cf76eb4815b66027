//! Equipment aggregation and statistics.
//!
//! This module computes the summary statistics stored alongside every
//! dataset, plus the derived breakdowns used in reports. All functions are
//! pure.

use crate::models::{Aggregates, CategoryShare, EquipmentRow};
use std::collections::BTreeMap;

/// Compute the aggregate fields of a dataset from its rows.
pub fn aggregate(rows: &[EquipmentRow]) -> Aggregates {
    Aggregates {
        row_count: rows.len(),
        average_flowrate: mean(rows.iter().map(|r| r.flowrate)),
        average_pressure: mean(rows.iter().map(|r| r.pressure)),
        average_temperature: mean(rows.iter().map(|r| r.temperature)),
        category_distribution: category_distribution(rows),
    }
}

/// Population mean of the values, `0.0` for an empty sequence.
///
/// The mean of finite values is always finite, even when their plain sum
/// would overflow.
pub fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let (sum, count) = values
        .clone()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        return 0.0;
    }

    let n = count as f64;
    if sum.is_finite() {
        sum / n
    } else {
        // Scaling each value first bounds every partial sum by the largest magnitude
        values.map(|v| v / n).sum()
    }
}

/// Count rows per category. Categories match exactly (case-sensitive, untrimmed).
pub fn category_distribution(rows: &[EquipmentRow]) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = BTreeMap::new();

    for row in rows {
        *dist.entry(row.category.clone()).or_default() += 1;
    }

    dist
}

/// Rank categories by count (highest first, then by name) with their share of `total`.
///
/// A zero total is treated as one so that percentages stay finite.
pub fn category_shares(distribution: &BTreeMap<String, usize>, total: usize) -> Vec<CategoryShare> {
    let denominator = total.max(1) as f64;

    let mut shares: Vec<CategoryShare> = distribution
        .iter()
        .map(|(category, &count)| CategoryShare {
            category: category.clone(),
            count,
            percentage: count as f64 / denominator * 100.0,
        })
        .collect();

    // BTreeMap iteration is already name-ordered, so a stable sort keeps ties alphabetical
    shares.sort_by_key(|share| std::cmp::Reverse(share.count));
    shares
}

/// Generate a text summary of the aggregates.
pub fn generate_summary_text(aggregates: &Aggregates) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Equipment: {}", aggregates.row_count));
    lines.push(format!(
        "- Average Flowrate: {:.2}",
        aggregates.average_flowrate
    ));
    lines.push(format!(
        "- Average Pressure: {:.2}",
        aggregates.average_pressure
    ));
    lines.push(format!(
        "- Average Temperature: {:.2}",
        aggregates.average_temperature
    ));

    if !aggregates.category_distribution.is_empty() {
        lines.push(String::new());
        lines.push("By Type:".to_string());

        for share in category_shares(&aggregates.category_distribution, aggregates.row_count) {
            lines.push(format!("- {}: {}", share.category, share.count));
        }
    }

    lines.join("\n")
}
