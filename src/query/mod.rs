//! SQL composition for the two analytics queries.
//!
//! Request values never enter the SQL text. [`build_where`] emits a clause
//! that references `@name` placeholders and returns the values separately as
//! typed [`QueryParameter`]s for the warehouse to substitute.

mod buckets;

pub use buckets::TimeBucket;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::filters::FilterParams;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("valid placeholder regex"));

/// Declared type of a bound parameter, named as the warehouse spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterType {
    Date,
    String,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Date => "DATE",
            ParameterType::String => "STRING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub name: &'static str,
    pub param_type: ParameterType,
    pub value: String,
}

impl QueryParameter {
    pub fn date(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            param_type: ParameterType::Date,
            value: value.into(),
        }
    }

    pub fn string(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            param_type: ParameterType::String,
            value: value.into(),
        }
    }
}

/// A WHERE fragment (without the keyword) and the values it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub where_sql: String,
    /// One entry per placeholder, in order of first reference.
    pub parameters: Vec<QueryParameter>,
}

impl BoundQuery {
    /// Placeholder names referenced by the WHERE fragment, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholders(&self.where_sql)
    }

    pub fn parameter(&self, name: &str) -> Option<&QueryParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Build the filter clause shared by both templates.
pub fn build_where(params: &FilterParams) -> BoundQuery {
    let mut clauses = vec!["DATE(created_date) BETWEEN @start_date AND @end_date"];
    let mut parameters = vec![
        QueryParameter::date("start_date", params.start_date.as_str()),
        QueryParameter::date("end_date", params.end_date.as_str()),
    ];

    if let Some(category) = &params.category {
        clauses.push("category = @category");
        parameters.push(QueryParameter::string("category", category.as_str()));
    }

    BoundQuery {
        where_sql: clauses.join(" AND "),
        parameters,
    }
}

/// Named placeholders (`@name`) in `sql`, in order of appearance.
///
/// Templates never contain `@` inside string literals, so a plain scan is
/// exact.
pub fn placeholders(sql: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(sql)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Rewrite named placeholders to positional `?` markers, returning the
/// placeholder names in binding order.
pub fn to_positional(sql: &str) -> (String, Vec<String>) {
    let names = placeholders(sql).into_iter().map(str::to_string).collect();
    let positional = PLACEHOLDER.replace_all(sql, "?").into_owned();
    (positional, names)
}

/// SQL flavour spoken by a warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    BigQuery,
    Sqlite,
}

impl Dialect {
    fn table_ref(&self, table: &str) -> String {
        match self {
            Dialect::BigQuery => format!("`{table}`"),
            Dialect::Sqlite => table
                .split('.')
                .map(|part| format!("\"{part}\""))
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    /// Whole hours between creation and closure, NULL while still open.
    fn resolution_hours(&self) -> &'static str {
        match self {
            Dialect::BigQuery => "TIMESTAMP_DIFF(closed_date, created_date, HOUR)",
            Dialect::Sqlite => {
                "(CAST(strftime('%s', closed_date) AS INTEGER) - CAST(strftime('%s', created_date) AS INTEGER)) / 3600"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Requests per calendar day of `created_date`, ascending.
    DailyCounts,
    /// Requests per resolution-time bucket, in bucket rank order.
    ResolutionHistogram,
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::DailyCounts => "daily_counts",
            Template::ResolutionHistogram => "resolution_histogram",
        }
    }

    /// Render the full statement. `table` must come from trusted
    /// configuration; it is the only non-constant text besides `bound`'s
    /// clause.
    pub fn render(&self, dialect: Dialect, table: &str, bound: &BoundQuery) -> String {
        let table = dialect.table_ref(table);
        let where_sql = &bound.where_sql;

        match self {
            Template::DailyCounts => format!(
                r#"
        SELECT DATE(created_date) AS created_date, COUNT(*) AS date_category_count
        FROM {table}
        WHERE {where_sql}
        GROUP BY DATE(created_date)
        ORDER BY DATE(created_date)
        "#
            ),
            Template::ResolutionHistogram => format!(
                r#"
        WITH durations AS (
            SELECT
                {hours} AS hours
            FROM {table}
            WHERE {where_sql}
        )

        SELECT
          {classifier} AS time_bucket,
          COUNT(*) AS count
        FROM durations
        GROUP BY time_bucket
        ORDER BY
          {rank}
        "#,
                hours = dialect.resolution_hours(),
                classifier = TimeBucket::sql_classifier("hours"),
                rank = TimeBucket::sql_rank("time_bucket"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn filters(category: Option<&str>) -> FilterParams {
        FilterParams {
            start_date: "2025-10-01".to_string(),
            end_date: "2025-10-07".to_string(),
            category: category.map(str::to_string),
        }
    }

    fn assert_one_to_one(bound: &BoundQuery) {
        let referenced = bound.placeholders();
        let declared: Vec<&str> = bound.parameters.iter().map(|p| p.name).collect();
        assert_eq!(referenced, declared);
        let unique: HashSet<&str> = referenced.iter().copied().collect();
        assert_eq!(unique.len(), referenced.len());
    }

    #[test]
    fn test_build_where_without_category() {
        let bound = build_where(&filters(None));
        assert_eq!(
            bound.where_sql,
            "DATE(created_date) BETWEEN @start_date AND @end_date"
        );
        assert_eq!(bound.parameters.len(), 2);
        assert_eq!(bound.parameters[0], QueryParameter::date("start_date", "2025-10-01"));
        assert_eq!(bound.parameters[1], QueryParameter::date("end_date", "2025-10-07"));
        assert_one_to_one(&bound);
    }

    #[test]
    fn test_build_where_with_category() {
        let bound = build_where(&filters(Some("Graffiti")));
        assert_eq!(
            bound.where_sql,
            "DATE(created_date) BETWEEN @start_date AND @end_date AND category = @category"
        );
        assert_eq!(bound.parameters.len(), 3);
        assert_eq!(
            bound.parameter("category"),
            Some(&QueryParameter::string("category", "Graffiti"))
        );
        assert_one_to_one(&bound);
    }

    #[test]
    fn test_sentinel_and_absent_category_build_identical_queries() {
        let absent = build_where(&FilterParams::resolve([("start_date", "2025-01-01")]));
        let sentinel = build_where(&FilterParams::resolve([
            ("start_date", "2025-01-01"),
            ("category", "All Categories"),
        ]));
        assert_eq!(absent, sentinel);
        assert_eq!(absent.parameters.len(), 2);
    }

    #[test]
    fn test_injection_payload_only_travels_as_value() {
        let payload = "'; DROP TABLE x;--";
        let bound = build_where(&filters(Some(payload)));
        assert!(!bound.where_sql.contains(payload));
        assert!(!bound.where_sql.contains("DROP"));
        assert_eq!(bound.parameter("category").unwrap().value, payload);

        let clean = build_where(&filters(Some("Graffiti")));
        assert_eq!(bound.where_sql, clean.where_sql);

        for template in [Template::DailyCounts, Template::ResolutionHistogram] {
            for dialect in [Dialect::BigQuery, Dialect::Sqlite] {
                let sql = template.render(dialect, "service_requests", &bound);
                assert!(!sql.contains(payload));
                assert_eq!(sql, template.render(dialect, "service_requests", &clean));
            }
        }
    }

    #[test]
    fn test_date_values_never_rendered() {
        let bound = build_where(&filters(None));
        let sql = Template::DailyCounts.render(Dialect::BigQuery, "t", &bound);
        assert!(!sql.contains("2025-10-01"));
        assert!(!sql.contains("2025-10-07"));
    }

    #[test]
    fn test_parameter_types_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&ParameterType::Date).unwrap(), "\"DATE\"");
        assert_eq!(serde_json::to_string(&ParameterType::String).unwrap(), "\"STRING\"");
        assert_eq!(ParameterType::Date.as_str(), "DATE");
    }

    #[test]
    fn test_to_positional() {
        let (sql, names) = to_positional("a BETWEEN @start_date AND @end_date AND c = @category");
        assert_eq!(sql, "a BETWEEN ? AND ? AND c = ?");
        assert_eq!(names, vec!["start_date", "end_date", "category"]);
    }

    #[test]
    fn test_daily_counts_render_bigquery() {
        let bound = build_where(&filters(None));
        let sql = Template::DailyCounts.render(
            Dialect::BigQuery,
            "bigquery-public-data.san_francisco_311.311_service_requests",
            &bound,
        );
        assert!(sql.contains("FROM `bigquery-public-data.san_francisco_311.311_service_requests`"));
        assert!(sql.contains("WHERE DATE(created_date) BETWEEN @start_date AND @end_date"));
        assert!(sql.contains("GROUP BY DATE(created_date)"));
        assert!(sql.contains("ORDER BY DATE(created_date)"));
    }

    #[test]
    fn test_histogram_render_per_dialect() {
        let bound = build_where(&filters(None));

        let bigquery = Template::ResolutionHistogram.render(Dialect::BigQuery, "t", &bound);
        assert!(bigquery.contains("TIMESTAMP_DIFF(closed_date, created_date, HOUR) AS hours"));
        assert!(bigquery.contains("WHEN hours <= 0 THEN '<1 Hour'"));
        assert!(bigquery.contains("ELSE 'Not Resolved'"));
        assert!(bigquery.contains("GROUP BY time_bucket"));
        assert!(bigquery.contains("WHEN '10+ Days' THEN 11"));

        let sqlite = Template::ResolutionHistogram.render(Dialect::Sqlite, "main.requests", &bound);
        assert!(sqlite.contains("FROM \"main\".\"requests\""));
        assert!(sqlite.contains("strftime('%s', closed_date)"));
        assert!(!sqlite.contains("TIMESTAMP_DIFF"));
    }

    #[test]
    fn test_rendered_placeholders_match_parameters() {
        let bound = build_where(&filters(Some("Graffiti")));
        for template in [Template::DailyCounts, Template::ResolutionHistogram] {
            let sql = template.render(Dialect::BigQuery, "t", &bound);
            let declared: Vec<&str> = bound.parameters.iter().map(|p| p.name).collect();
            assert_eq!(placeholders(&sql), declared);
        }
    }
}
