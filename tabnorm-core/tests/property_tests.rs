//! Property-based tests for the normalization pipeline.
//!
//! Tables are generated with three small-domain integer columns so that
//! dependencies, duplicates and missing values all occur often.
//!
//! ## Properties
//! - **FD soundness**: every reported dependency holds on the cleaned table
//! - **Remediation idempotence**: remediating clean output again changes nothing
//! - **Third normal form**: the default pipeline, which verifies its output,
//!   never rejects a generated table
//! - **Lossless decomposition**: joining the tables back yields exactly the
//!   distinct cleaned rows
//! - **Redundancy bounds**: the reduction is always within `[0, 100]`

use indexmap::IndexMap;
use proptest::prelude::*;
use tabnorm_core::dependency::{DiscoveryOptions, dependency_holds, discover, is_unique};
use tabnorm_core::remediation::remediate;
use tabnorm_core::{NormalizationPipeline, NullStrategy, RawTable, Value};

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        6 => (0i64..3).prop_map(Value::Integer),
        1 => Just(Value::Null),
    ]
}

fn table() -> impl Strategy<Value = RawTable> {
    prop::collection::vec(prop::collection::vec(cell(), 3), 0..10)
        .prop_map(|rows| RawTable::from_rows("generated", &["a", "b", "c"], rows).unwrap())
}

proptest! {
    #[test]
    fn prop_discovered_dependencies_hold(table in table()) {
        let set = discover(&table, &DiscoveryOptions::default());
        for dependency in &set.dependencies {
            prop_assert!(dependency_holds(&table, dependency));
        }
        for key in &set.candidate_keys {
            prop_assert!(is_unique(&table, key));
        }
    }

    #[test]
    fn prop_remediation_is_idempotent(table in table()) {
        let strategies: IndexMap<String, NullStrategy> = [
            ("a".to_string(), NullStrategy::Mode),
            ("b".to_string(), NullStrategy::ForwardFill),
            ("c".to_string(), NullStrategy::Default),
        ]
        .into_iter()
        .collect();

        let once = remediate(&table, &strategies).unwrap();
        let twice = remediate(&once.table, &strategies).unwrap();
        prop_assert_eq!(twice.table.rows(), once.table.rows());
        prop_assert_eq!(twice.cells_filled, 0);
    }

    #[test]
    fn prop_decomposition_is_3nf(table in table()) {
        let result = NormalizationPipeline::with_defaults().run(&table);
        prop_assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn prop_decomposition_is_lossless(table in table()) {
        let result = NormalizationPipeline::with_defaults().run(&table).unwrap();
        prop_assert!(result.metrics.lossless_join);
    }

    #[test]
    fn prop_redundancy_within_bounds(table in table()) {
        let result = NormalizationPipeline::with_defaults().run(&table).unwrap();
        let pct = result.metrics.redundancy_reduction_pct;
        prop_assert!((0.0..=100.0).contains(&pct));
    }
}
