//! Pipeline configuration.
//!
//! This module provides the caller-supplied inputs of a normalization run:
//! expected column types, per-column constraints, NULL strategies and the
//! bounds placed on dependency discovery. A configuration is usually loaded
//! from a JSON file and then adjusted with the `with_*` builder methods.

use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dependency::DiscoveryOptions;
use crate::models::{DataType, Value};
use crate::{NormalizeError, Result};

/// Largest determinant size the discoverer is allowed to explore.
pub const MAX_DETERMINANT_SIZE_LIMIT: usize = 8;

/// Table name prefix used when neither the config nor the source names one.
pub const DEFAULT_TABLE_NAME: &str = "data";

/// Per-column rules checked by the validator.
///
/// Every rule is optional. Constraints are attached by the caller and never
/// inferred from the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSpec {
    /// Values must not repeat (missing values are ignored)
    pub unique: bool,
    /// Values must not be missing
    pub not_null: bool,
    /// Inclusive numeric bounds as `[min, max]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
    /// Regular expression every value must match from its start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Closed set of permitted values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl ConstraintSpec {
    /// Creates an empty constraint spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to require unique values.
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Builder method to forbid missing values.
    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Builder method to set inclusive numeric bounds.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Builder method to set a regex pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Builder method to set the permitted values.
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }
}

/// How missing values in one column are remediated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStrategy", into = "RawStrategy")]
pub enum NullStrategy {
    /// Remove every row where the column is missing
    Drop,
    /// Arithmetic mean of the present values (numeric only)
    Mean,
    /// Median of the present values (numeric only)
    Median,
    /// Most frequent present value, first seen wins ties
    Mode,
    /// Nearest preceding present value
    ForwardFill,
    /// Nearest following present value
    BackwardFill,
    /// Type-appropriate default
    Default,
    /// Caller-supplied constant
    Literal(Value),
}

impl NullStrategy {
    /// Every named strategy with a short description, in display order.
    pub const DESCRIPTIONS: [(&'static str, &'static str); 8] = [
        ("drop", "remove every row where the column is missing"),
        ("mean", "fill with the arithmetic mean of present values (numeric only)"),
        ("median", "fill with the median of present values (numeric only)"),
        ("mode", "fill with the most frequent present value, first seen wins ties"),
        ("forward_fill", "fill with the nearest preceding present value"),
        ("backward_fill", "fill with the nearest following present value"),
        ("default", "fill with 0, 0.0, \"Unknown\", false or 1900-01-01 by column type"),
        ("literal", "fill with a caller-supplied constant: {\"literal\": <value>}"),
    ];

    /// Strategy name as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            NullStrategy::Drop => "drop",
            NullStrategy::Mean => "mean",
            NullStrategy::Median => "median",
            NullStrategy::Mode => "mode",
            NullStrategy::ForwardFill => "forward_fill",
            NullStrategy::BackwardFill => "backward_fill",
            NullStrategy::Default => "default",
            NullStrategy::Literal(_) => "literal",
        }
    }

    /// Returns true for strategies that only make sense on numeric columns.
    pub fn requires_numeric(&self) -> bool {
        matches!(self, NullStrategy::Mean | NullStrategy::Median)
    }
}

impl std::fmt::Display for NullStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for NullStrategy {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(NullStrategy::Drop),
            "mean" => Ok(NullStrategy::Mean),
            "median" => Ok(NullStrategy::Median),
            "mode" => Ok(NullStrategy::Mode),
            "forward_fill" | "ffill" => Ok(NullStrategy::ForwardFill),
            "backward_fill" | "bfill" => Ok(NullStrategy::BackwardFill),
            "default" => Ok(NullStrategy::Default),
            other => Err(ConfigValidationError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Wire form of a strategy: a bare name or `{"literal": value}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawStrategy {
    Named(String),
    Literal { literal: Value },
}

impl TryFrom<RawStrategy> for NullStrategy {
    type Error = ConfigValidationError;

    fn try_from(raw: RawStrategy) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawStrategy::Named(name) => name.parse(),
            RawStrategy::Literal { literal } => Ok(NullStrategy::Literal(literal)),
        }
    }
}

impl From<NullStrategy> for RawStrategy {
    fn from(strategy: NullStrategy) -> Self {
        match strategy {
            NullStrategy::Literal(literal) => RawStrategy::Literal { literal },
            other => RawStrategy::Named(other.name().to_string()),
        }
    }
}

/// Configuration of one normalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Prefix of every derived table name; the source table's own name when
    /// unset
    pub table_name: Option<String>,
    /// Expected type per column; mismatches stop the run
    pub expected_types: IndexMap<String, DataType>,
    /// Constraints per column; violations are reported, not raised
    pub constraints: IndexMap<String, ConstraintSpec>,
    /// NULL strategy per column, applied in map order
    pub null_strategy: IndexMap<String, NullStrategy>,
    /// Largest determinant set explored during discovery
    pub max_determinant_size: usize,
    /// Optional row cap for discovery on large tables
    pub discovery_sample_size: Option<usize>,
    /// Minimum number of FD determinants a column must appear in to get an index
    pub determinant_index_threshold: usize,
    /// Re-run discovery on each derived table to confirm 3NF
    pub verify_normal_form: bool,
}

/// Validation errors for pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("max_determinant_size must be between 1 and {MAX_DETERMINANT_SIZE_LIMIT}, got {0}")]
    InvalidDeterminantSize(usize),
    #[error("discovery_sample_size must be at least 2, got {0}")]
    InvalidSampleSize(usize),
    #[error("determinant_index_threshold must be at least 1")]
    InvalidIndexThreshold,
    #[error("constraint range for column '{column}' has min {min} greater than max {max}")]
    InvalidRange { column: String, min: f64, max: f64 },
    #[error("unknown NULL strategy '{0}'")]
    UnknownStrategy(String),
    #[error("table_name must not be empty")]
    EmptyTableName,
}

impl From<ConfigValidationError> for NormalizeError {
    fn from(error: ConfigValidationError) -> Self {
        NormalizeError::configuration(error.to_string())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            table_name: None,
            expected_types: IndexMap::new(),
            constraints: IndexMap::new(),
            null_strategy: IndexMap::new(),
            max_determinant_size: 3,
            discovery_sample_size: None,
            determinant_index_threshold: 2,
            verify_normal_form: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a new pipeline config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NormalizeError::io(format!("Failed to read config {}", path.display()), e))?;
        Self::from_json_str(&content)
    }

    /// Parses and validates a configuration from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| NormalizeError::serialization("Failed to parse pipeline config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Prefix for derived table names: the configured name, else the source
    /// table's name, else [`DEFAULT_TABLE_NAME`].
    pub fn table_prefix<'a>(&'a self, source: &'a str) -> &'a str {
        match self.table_name.as_deref() {
            Some(name) => name,
            None if !source.trim().is_empty() => source,
            None => DEFAULT_TABLE_NAME,
        }
    }

    /// Builder method to add an expected column type.
    pub fn with_expected_type(mut self, column: impl Into<String>, data_type: DataType) -> Self {
        self.expected_types.insert(column.into(), data_type);
        self
    }

    /// Builder method to add a column constraint.
    pub fn with_constraint(mut self, column: impl Into<String>, spec: ConstraintSpec) -> Self {
        self.constraints.insert(column.into(), spec);
        self
    }

    /// Builder method to add a NULL strategy. Order of calls is the order
    /// of application.
    pub fn with_null_strategy(mut self, column: impl Into<String>, strategy: NullStrategy) -> Self {
        self.null_strategy.insert(column.into(), strategy);
        self
    }

    /// Builder method to set the determinant size ceiling.
    pub fn with_max_determinant_size(mut self, size: usize) -> Self {
        if !(1..=MAX_DETERMINANT_SIZE_LIMIT).contains(&size) {
            tracing::warn!(
                "max_determinant_size {} clamped to valid range [1, {}]",
                size,
                MAX_DETERMINANT_SIZE_LIMIT
            );
        }
        self.max_determinant_size = size.clamp(1, MAX_DETERMINANT_SIZE_LIMIT);
        self
    }

    /// Builder method to set the discovery sample size.
    pub fn with_discovery_sample_size(mut self, size: Option<usize>) -> Self {
        if let Some(rows) = size.filter(|rows| *rows < 2) {
            tracing::warn!("discovery_sample_size {} raised to minimum of 2", rows);
        }
        self.discovery_sample_size = size.map(|rows| rows.max(2));
        self
    }

    /// Builder method to set the determinant index threshold.
    pub fn with_determinant_index_threshold(mut self, threshold: usize) -> Self {
        self.determinant_index_threshold = threshold.max(1);
        self
    }

    /// Builder method to enable/disable the 3NF verification pass.
    pub fn with_verify_normal_form(mut self, verify: bool) -> Self {
        self.verify_normal_form = verify;
        self
    }

    /// Discovery bounds derived from this config.
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            max_determinant_size: self.max_determinant_size,
            sample_size: self.discovery_sample_size,
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error if a bound is outside its valid range or a
    /// constraint range is inverted.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self
            .table_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptyTableName);
        }
        if !(1..=MAX_DETERMINANT_SIZE_LIMIT).contains(&self.max_determinant_size) {
            return Err(ConfigValidationError::InvalidDeterminantSize(
                self.max_determinant_size,
            ));
        }
        if let Some(rows) = self.discovery_sample_size.filter(|rows| *rows < 2) {
            return Err(ConfigValidationError::InvalidSampleSize(rows));
        }
        if self.determinant_index_threshold == 0 {
            return Err(ConfigValidationError::InvalidIndexThreshold);
        }
        for (column, spec) in &self.constraints {
            if let Some((min, max)) = spec.range {
                if min > max {
                    return Err(ConfigValidationError::InvalidRange {
                        column: column.clone(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }
}
