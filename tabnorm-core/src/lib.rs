//! Core normalization engine for tabnorm.
//!
//! This crate turns one flat table into a set of tables in third normal
//! form, and reports on what it did along the way.
//!
//! # Pipeline
//! - **Validation**: expected types and per-column constraints
//! - **Remediation**: configurable NULL strategies per column
//! - **Discovery**: functional dependencies and candidate keys, level-wise
//!   up to a determinant size ceiling
//! - **Decomposition**: canonical cover plus synthesis into 3NF tables,
//!   verified by re-running discovery on the results
//! - **Planning**: foreign keys between the tables and index proposals,
//!   checked against the data
//! - **Metrics**: counts, redundancy reduction and a lossless-join check
//!
//! Loading from files and exporting results live in [`loader`] and
//! [`export`]; the pipeline itself only sees in-memory tables.

pub mod config;
pub mod decompose;
pub mod dependency;
pub mod error;
pub mod export;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod remediation;
pub mod validator;

// Re-export commonly used types
pub use config::{ConfigValidationError, ConstraintSpec, NullStrategy, PipelineConfig};
pub use decompose::{Decomposition, NormalizedTable};
pub use dependency::{ColumnSet, DependencySet, DiscoveryOptions, FunctionalDependency};
pub use error::{NormalizeError, Result, TypeMismatch};
pub use export::NormalizationReport;
pub use logging::{LogFormat, init_logging};
pub use metrics::NormalizationMetrics;
pub use models::{ColumnDef, DataType, RawTable, Value};
pub use pipeline::{NormalizationPipeline, NormalizationResult};
pub use planner::{ForeignKeyLink, IndexSpec, IntegrityPlan};
pub use validator::{ConstraintViolation, ValidationReport};
