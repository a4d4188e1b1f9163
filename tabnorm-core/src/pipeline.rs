//! Normalization pipeline facade.
//!
//! This module provides [`NormalizationPipeline`], which runs the stages in
//! order: validate, remediate, discover, decompose, plan, measure. A run owns
//! all of its intermediate state, so independent pipelines can run on
//! separate threads without coordination.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::config::PipelineConfig;
use crate::decompose::{
    Decomposition, JoinedRows, NormalizedTable, decompose, rejoin, verify_third_normal_form,
};
use crate::dependency::{DependencySet, discover};
use crate::metrics::{MetricsCollector, NormalizationMetrics};
use crate::models::{RawTable, Value};
use crate::planner::{IntegrityPlan, check_integrity, plan_integrity};
use crate::remediation::{ColumnRemediation, remediate};
use crate::validator::{TableValidator, ValidationReport};
use crate::{NormalizeError, Result};

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct NormalizationResult {
    /// Validator findings on the source table
    pub validation: ValidationReport,
    /// What remediation did per column
    pub remediation: Vec<ColumnRemediation>,
    /// Dependencies discovered on the cleaned table
    pub dependencies: DependencySet,
    /// Normalized tables and the cover they came from
    pub decomposition: Decomposition,
    /// Foreign keys and indexes
    pub plan: IntegrityPlan,
    /// Run metrics
    pub metrics: NormalizationMetrics,
}

impl NormalizationResult {
    /// Normalized tables, root first.
    pub fn tables(&self) -> &[NormalizedTable] {
        &self.decomposition.tables
    }

    /// Normalized tables by name.
    pub fn tables_by_name(&self) -> IndexMap<&str, &NormalizedTable> {
        self.decomposition
            .tables
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect()
    }

    /// Looks up one normalized table.
    pub fn table(&self, name: &str) -> Option<&NormalizedTable> {
        self.decomposition.tables.iter().find(|t| t.name == name)
    }
}

/// Normalization pipeline for one configuration.
///
/// # Example
///
/// ```rust,ignore
/// use tabnorm_core::{NormalizationPipeline, PipelineConfig};
///
/// let pipeline = NormalizationPipeline::new(PipelineConfig::default())?;
/// let result = pipeline.run(&table)?;
/// for table in result.tables() {
///     println!("{}: {} rows", table.name, table.row_count());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct NormalizationPipeline {
    config: PipelineConfig,
    validator: TableValidator,
}

impl NormalizationPipeline {
    /// Creates a pipeline, validating the configuration and compiling its
    /// constraint patterns.
    ///
    /// # Errors
    /// Returns a configuration error for out-of-range settings or invalid
    /// patterns.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let validator = TableValidator::new(&config)?;
        Ok(Self { config, validator })
    }

    /// Creates a pipeline with the default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: PipelineConfig::default(),
            validator: TableValidator::default(),
        }
    }

    /// Returns a reference to the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage over `table`.
    ///
    /// # Errors
    /// Stops at the first failing stage: type mismatches, incompatible NULL
    /// strategies, an empty table, or an internal consistency failure in
    /// decomposition or planning.
    pub fn run(&self, table: &RawTable) -> Result<NormalizationResult> {
        let mut metrics = MetricsCollector::start(table.name());
        tracing::info!(
            "Normalizing '{}' ({} rows x {} columns)",
            table.name(),
            table.row_count(),
            table.column_count()
        );
        if table.column_count() == 0 {
            return Err(NormalizeError::invalid_table(
                table.name(),
                "table has no columns",
            ));
        }
        metrics.record_source(table.column_count(), table.row_count());

        tracing::info!("[1/6] Validating types and constraints");
        let validation = self.validator.validate(table)?;
        metrics.record_validation(validation.violations.len());

        tracing::info!("[2/6] Remediating NULL values");
        let remediation = remediate(table, &self.config.null_strategy)?;
        metrics.record_remediation(remediation.nulls_handled(), remediation.rows_dropped);
        let cleaned = remediation.table;

        tracing::info!("[3/6] Discovering functional dependencies");
        let options = self.config.discovery_options();
        let dependencies = discover(&cleaned, &options);
        metrics.record_discovery(
            dependencies.dependencies.len(),
            dependencies.candidate_keys.len(),
        );

        tracing::info!("[4/6] Decomposing to third normal form");
        let prefix = self.config.table_prefix(table.name());
        let decomposition = decompose(&cleaned, &dependencies, prefix, &options)?;
        if self.config.verify_normal_form {
            verify_third_normal_form(&decomposition.tables, &options)?;
        }
        metrics.record_decomposition(&decomposition.tables);

        tracing::info!("[5/6] Planning foreign keys and indexes");
        let mut plan = plan_integrity(
            &decomposition.tables,
            &dependencies,
            self.config.determinant_index_threshold,
        );
        let checks = check_integrity(&mut plan, &decomposition.tables)?;
        metrics.record_plan(plan.links.len(), plan.indexes.len(), checks);

        tracing::info!("[6/6] Rejoining tables");
        let joined = rejoin(&decomposition.tables)?;
        let lossless = is_lossless(&cleaned, &joined);
        if !lossless {
            tracing::warn!(
                "Rejoined tables do not reproduce the {} distinct rows of '{}'",
                cleaned.distinct_row_count(),
                cleaned.name()
            );
        }
        let derived_rows: Vec<usize> = decomposition.derived().map(|t| t.row_count()).collect();
        metrics.record_rejoin(joined.rows.len(), &derived_rows, lossless);

        let metrics = metrics.finish();
        metrics.log_report();

        Ok(NormalizationResult {
            validation,
            remediation: remediation.per_column,
            dependencies,
            decomposition,
            plan,
            metrics,
        })
    }
}

/// Returns true when `joined` holds exactly the distinct rows of `table`.
pub fn is_lossless(table: &RawTable, joined: &JoinedRows) -> bool {
    let Some(rows) = joined.reordered(&table.column_names()) else {
        return false;
    };
    let joined_set: HashSet<&Vec<Value>> = rows.iter().collect();
    let original: HashSet<&Vec<Value>> = table.rows().iter().collect();
    rows.len() == joined_set.len() && joined_set == original
}
