//! Markdown rendering of a normalization report.

use askama::Template;
use tabnorm_core::NormalizationReport;
use tabnorm_core::planner::IndexReason;

pub(crate) struct ColumnView {
    name: String,
    data_type: String,
    key: &'static str,
}

pub(crate) struct TableView {
    name: String,
    is_root: bool,
    primary_key: String,
    alternate_keys: String,
    row_count: usize,
    columns: Vec<ColumnView>,
}

pub(crate) struct LinkView {
    name: String,
    from: String,
    to: String,
}

pub(crate) struct IndexView {
    name: String,
    table: String,
    columns: String,
    unique: bool,
    reason: &'static str,
}

#[derive(Template)]
#[template(path = "report.md", escape = "none")]
pub(crate) struct MarkdownReport {
    source: String,
    version: String,
    generated_at: String,
    primary_key: String,
    tables: Vec<TableView>,
    dependencies: Vec<String>,
    foreign_keys: Vec<LinkView>,
    indexes: Vec<IndexView>,
    violations: Vec<String>,
    metrics: Vec<(&'static str, String)>,
}

fn column_list(columns: &[String]) -> String {
    format!("({})", columns.join(", "))
}

fn reason_label(reason: IndexReason) -> &'static str {
    match reason {
        IndexReason::PrimaryKey => "primary key",
        IndexReason::AlternateKey => "alternate key",
        IndexReason::ForeignKey => "foreign key",
        IndexReason::Determinant => "frequent determinant",
    }
}

impl MarkdownReport {
    pub(crate) fn new(source: &str, report: &NormalizationReport) -> Self {
        let tables = report
            .tables
            .iter()
            .map(|table| TableView {
                name: table.name.clone(),
                is_root: table.is_root,
                primary_key: column_list(&table.primary_key),
                alternate_keys: table
                    .alternate_keys
                    .iter()
                    .map(|key| column_list(key))
                    .collect::<Vec<_>>()
                    .join(", "),
                row_count: table.row_count,
                columns: table
                    .columns
                    .iter()
                    .map(|column| ColumnView {
                        name: column.name.clone(),
                        data_type: column.data_type.to_string(),
                        key: if table.primary_key.contains(&column.name) {
                            "PK"
                        } else if table.alternate_keys.iter().any(|k| k.contains(&column.name)) {
                            "UNIQUE"
                        } else {
                            ""
                        },
                    })
                    .collect(),
            })
            .collect();

        Self {
            source: source.to_string(),
            version: report.generator_version.clone(),
            generated_at: report.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            primary_key: column_list(&report.primary_key),
            tables,
            dependencies: report
                .functional_dependencies
                .iter()
                .map(ToString::to_string)
                .collect(),
            foreign_keys: report
                .foreign_keys
                .iter()
                .map(|link| LinkView {
                    name: link.name.clone(),
                    from: format!("{}{}", link.child_table, column_list(&link.child_columns)),
                    to: format!("{}{}", link.parent_table, column_list(&link.parent_columns)),
                })
                .collect(),
            indexes: report
                .indexes
                .iter()
                .map(|index| IndexView {
                    name: index.name.clone(),
                    table: index.table.clone(),
                    columns: column_list(&index.columns),
                    unique: index.unique,
                    reason: reason_label(index.reason),
                })
                .collect(),
            violations: report
                .constraint_violations
                .iter()
                .map(|v| format!("`{}` {}: {}", v.column, v.rule, v.message))
                .collect(),
            metrics: report.metrics.report_lines(),
        }
    }
}

/// Renders the report as Markdown.
pub(crate) fn render_markdown(source: &str, report: &NormalizationReport) -> askama::Result<String> {
    MarkdownReport::new(source, report).render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabnorm_core::{NormalizationPipeline, RawTable, Value};

    fn create_sample_report() -> NormalizationReport {
        let table = RawTable::from_rows(
            "orders",
            &["order", "cust", "email"],
            vec![
                vec![Value::Integer(1), Value::from("Alice"), Value::from("a@x.com")],
                vec![Value::Integer(2), Value::from("Bob"), Value::from("b@x.com")],
                vec![Value::Integer(3), Value::from("Alice"), Value::from("a@x.com")],
            ],
        )
        .unwrap();
        let result = NormalizationPipeline::with_defaults().run(&table).unwrap();
        NormalizationReport::from_result(&result)
    }

    #[test]
    fn test_markdown_lists_tables_and_links() {
        let markdown = render_markdown("orders.csv", &create_sample_report()).unwrap();

        assert!(markdown.starts_with("# Normalization report: orders.csv"));
        assert!(markdown.contains("### orders_order (root)"));
        assert!(markdown.contains("### orders_cust"));
        assert!(markdown.contains("- Alternate keys: (email)"));
        assert!(markdown.contains("| email | text | UNIQUE |"));
        assert!(markdown.contains("| fk_orders_order_orders_cust | orders_order(cust) | orders_cust(cust) |"));
        assert!(markdown.contains("`cust -> email`"));
        assert!(markdown.contains("| Normalization Level | 3NF |"));
    }
}
