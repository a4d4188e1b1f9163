//! Normalization metrics.
//!
//! A [`MetricsCollector`] belongs to exactly one pipeline run. Stages
//! record into it as they finish and [`MetricsCollector::finish`] turns it
//! into an immutable [`NormalizationMetrics`] snapshot.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decompose::NormalizedTable;

/// Snapshot of one normalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationMetrics {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Name of the source table
    pub table_name: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub processing_time_ms: u64,
    /// Source tables (always 1)
    pub original_tables: usize,
    /// Source columns, before remediation
    pub original_columns: usize,
    /// Source rows, before remediation
    pub original_rows: usize,
    /// Source cells, before remediation
    pub original_cells: usize,
    /// Tables after decomposition
    pub normalized_tables: usize,
    /// Columns summed over all normalized tables
    pub normalized_columns: usize,
    /// Rows summed over all normalized tables
    pub normalized_rows: usize,
    /// Cells summed over all normalized tables
    pub normalized_cells: usize,
    /// Missing cells filled or removed by remediation
    pub nulls_handled: usize,
    /// Rows removed by `drop` strategies
    pub rows_dropped: usize,
    /// Constraint violations reported by the validator
    pub constraint_violations: usize,
    /// Discovered functional dependencies
    pub functional_dependencies: usize,
    /// Discovered candidate keys
    pub candidate_keys: usize,
    /// Foreign key links proposed
    pub foreign_keys: usize,
    /// Referential integrity checks performed
    pub integrity_checks: usize,
    /// Indexes proposed
    pub indexes_proposed: usize,
    /// Duplicated value tuples removed by decomposition, as a percentage
    pub redundancy_reduction_pct: f64,
    /// Cells saved relative to the source table, as a percentage
    pub cell_reduction_pct: f64,
    /// Whether joining the tables back reproduced the cleaned rows
    pub lossless_join: bool,
    /// Normal form reached
    pub normalization_level: String,
}

/// Redundancy reduction over the derived tables, as a percentage.
///
/// `joined_rows` is the row count of the tables joined back together.
/// Each derived table would hold that many rows before decomposition, so
/// the reduction is `1 - sum(derived rows) / (joined_rows * derived tables)`.
/// Without derived tables there is nothing to reduce and the result is 0.
pub fn redundancy_reduction(joined_rows: usize, derived_rows: &[usize]) -> f64 {
    let equivalent_before = joined_rows * derived_rows.len();
    if equivalent_before == 0 {
        return 0.0;
    }
    let after: usize = derived_rows.iter().sum();
    ((1.0 - after as f64 / equivalent_before as f64) * 100.0).clamp(0.0, 100.0)
}

/// Accumulates counts over one pipeline run.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    started_at: DateTime<Utc>,
    table_name: String,
    original_columns: usize,
    original_rows: usize,
    nulls_handled: usize,
    rows_dropped: usize,
    constraint_violations: usize,
    functional_dependencies: usize,
    candidate_keys: usize,
    normalized_tables: usize,
    normalized_columns: usize,
    normalized_rows: usize,
    normalized_cells: usize,
    foreign_keys: usize,
    integrity_checks: usize,
    indexes_proposed: usize,
    redundancy_reduction_pct: f64,
    lossless_join: bool,
}

impl MetricsCollector {
    /// Starts the clock for a run over `table_name`.
    pub fn start(table_name: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            table_name: table_name.into(),
            original_columns: 0,
            original_rows: 0,
            nulls_handled: 0,
            rows_dropped: 0,
            constraint_violations: 0,
            functional_dependencies: 0,
            candidate_keys: 0,
            normalized_tables: 0,
            normalized_columns: 0,
            normalized_rows: 0,
            normalized_cells: 0,
            foreign_keys: 0,
            integrity_checks: 0,
            indexes_proposed: 0,
            redundancy_reduction_pct: 0.0,
            lossless_join: false,
        }
    }

    /// Records the shape of the source table.
    pub fn record_source(&mut self, columns: usize, rows: usize) {
        self.original_columns = columns;
        self.original_rows = rows;
    }

    /// Records the validator's findings.
    pub fn record_validation(&mut self, violations: usize) {
        self.constraint_violations = violations;
    }

    /// Records what remediation changed.
    pub fn record_remediation(&mut self, nulls_handled: usize, rows_dropped: usize) {
        self.nulls_handled = nulls_handled;
        self.rows_dropped = rows_dropped;
    }

    /// Records discovery results.
    pub fn record_discovery(&mut self, dependencies: usize, candidate_keys: usize) {
        self.functional_dependencies = dependencies;
        self.candidate_keys = candidate_keys;
    }

    /// Records the shape of the decomposition.
    pub fn record_decomposition(&mut self, tables: &[NormalizedTable]) {
        self.normalized_tables = tables.len();
        self.normalized_columns = tables.iter().map(|t| t.columns.len()).sum();
        self.normalized_rows = tables.iter().map(NormalizedTable::row_count).sum();
        self.normalized_cells = tables.iter().map(|t| t.columns.len() * t.row_count()).sum();
    }

    /// Records the link and index plan.
    pub fn record_plan(&mut self, foreign_keys: usize, indexes: usize, integrity_checks: usize) {
        self.foreign_keys = foreign_keys;
        self.indexes_proposed = indexes;
        self.integrity_checks = integrity_checks;
    }

    /// Records the rejoin outcome and the redundancy it implies.
    pub fn record_rejoin(&mut self, joined_rows: usize, derived_rows: &[usize], lossless: bool) {
        self.redundancy_reduction_pct = redundancy_reduction(joined_rows, derived_rows);
        self.lossless_join = lossless;
    }

    /// Stops the clock and returns the snapshot.
    pub fn finish(self) -> NormalizationMetrics {
        let elapsed = self.started.elapsed();
        let original_cells = self.original_columns * self.original_rows;
        let cell_reduction_pct = if original_cells == 0 {
            0.0
        } else {
            let saved = original_cells.saturating_sub(self.normalized_cells);
            saved as f64 / original_cells as f64 * 100.0
        };

        NormalizationMetrics {
            run_id: Uuid::new_v4(),
            table_name: self.table_name,
            started_at: self.started_at,
            completed_at: Utc::now(),
            processing_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            original_tables: 1,
            original_columns: self.original_columns,
            original_rows: self.original_rows,
            original_cells,
            normalized_tables: self.normalized_tables,
            normalized_columns: self.normalized_columns,
            normalized_rows: self.normalized_rows,
            normalized_cells: self.normalized_cells,
            nulls_handled: self.nulls_handled,
            rows_dropped: self.rows_dropped,
            constraint_violations: self.constraint_violations,
            functional_dependencies: self.functional_dependencies,
            candidate_keys: self.candidate_keys,
            foreign_keys: self.foreign_keys,
            integrity_checks: self.integrity_checks,
            indexes_proposed: self.indexes_proposed,
            redundancy_reduction_pct: self.redundancy_reduction_pct,
            cell_reduction_pct,
            lossless_join: self.lossless_join,
            normalization_level: "3NF".to_string(),
        }
    }
}

impl NormalizationMetrics {
    /// Report lines in display order, as `(label, value)` pairs.
    pub fn report_lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Original Tables", self.original_tables.to_string()),
            ("Normalized Tables", self.normalized_tables.to_string()),
            ("Original Columns", self.original_columns.to_string()),
            ("Total Normalized Columns", self.normalized_columns.to_string()),
            ("Normalization Level", self.normalization_level.clone()),
            ("NULL Values Handled", self.nulls_handled.to_string()),
            ("Rows Dropped", self.rows_dropped.to_string()),
            ("Functional Dependencies", self.functional_dependencies.to_string()),
            ("Candidate Keys", self.candidate_keys.to_string()),
            ("Foreign Keys", self.foreign_keys.to_string()),
            ("Referential Integrity Checks", self.integrity_checks.to_string()),
            ("Indexes Proposed", self.indexes_proposed.to_string()),
            (
                "Redundancy Reduction",
                format!("{:.2}%", self.redundancy_reduction_pct),
            ),
            ("Cell Reduction", format!("{:.2}%", self.cell_reduction_pct)),
            ("Lossless Join", self.lossless_join.to_string()),
            (
                "Processing Time",
                format!("{:.3} seconds", self.processing_time_ms as f64 / 1000.0),
            ),
            (
                "Constraint Violations Found",
                self.constraint_violations.to_string(),
            ),
        ]
    }

    /// Logs the report at INFO level.
    pub fn log_report(&self) {
        tracing::info!("Normalization metrics for '{}' (run {})", self.table_name, self.run_id);
        for (label, value) in self.report_lines() {
            tracing::info!("  {:<30} {}", format!("{}:", label), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redundancy_reduction() {
        assert!((redundancy_reduction(3, &[2]) - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(redundancy_reduction(3, &[]), 0.0);
        assert_eq!(redundancy_reduction(0, &[0]), 0.0);
        assert_eq!(redundancy_reduction(4, &[4, 4]), 0.0);
    }

    #[test]
    fn test_collector_snapshot() {
        let mut collector = MetricsCollector::start("orders");
        collector.record_source(3, 3);
        collector.record_validation(1);
        collector.record_remediation(2, 0);
        collector.record_discovery(4, 1);
        collector.record_plan(1, 4, 1);
        collector.record_rejoin(3, &[2], true);

        let metrics = collector.finish();
        assert_eq!(metrics.table_name, "orders");
        assert_eq!(metrics.original_tables, 1);
        assert_eq!(metrics.original_cells, 9);
        assert_eq!(metrics.nulls_handled, 2);
        assert_eq!(metrics.functional_dependencies, 4);
        assert_eq!(metrics.integrity_checks, 1);
        assert_eq!(metrics.normalization_level, "3NF");
        assert!(metrics.lossless_join);
        assert!(metrics.completed_at >= metrics.started_at);
        assert!(metrics.redundancy_reduction_pct > 33.0);
    }

    #[test]
    fn test_report_lines_include_redundancy() {
        let metrics = MetricsCollector::start("t").finish();
        let lines = metrics.report_lines();
        assert!(lines.iter().any(|(label, value)| *label == "Redundancy Reduction" && value == "0.00%"));
    }
}
