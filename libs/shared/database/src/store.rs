use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;

/// Logical tables shared by the monitoring and recovery cells.
pub mod tables {
    pub const ALERTS: &str = "backup_monitoring_alerts";
    pub const HEALTH_DATA: &str = "backup_health_data";
    pub const RECOVERY_EVENTS: &str = "disaster_recovery_events";
    pub const RECOVERY_PROCEDURES: &str = "recovery_procedures";
    pub const BACKUP_OPERATIONS: &str = "backup_operations";
    pub const RELIABILITY_REPORTS: &str = "backup_reliability_reports";
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    Gte(String, Value),
    Lt(String, Value),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _)
            | Filter::In(column, _)
            | Filter::IsNull(column)
            | Filter::Gte(column, _)
            | Filter::Lt(column, _) => column,
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, expected) => field == expected,
            Filter::In(_, options) => options.iter().any(|option| option == field),
            Filter::IsNull(_) => field.is_null(),
            Filter::Gte(_, bound) => {
                matches!(compare_values(field, bound), Some(Ordering::Greater | Ordering::Equal))
            }
            Filter::Lt(_, bound) => matches!(compare_values(field, bound), Some(Ordering::Less)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A PostgREST-shaped selection: conjunctive filters, optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn one_of(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.to_string(), value.into()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }

    /// Renders the query as a PostgREST query string (without the leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = self
            .filters
            .iter()
            .map(|filter| match filter {
                Filter::Eq(column, value) => format!("{}=eq.{}", column, encode_value(value)),
                Filter::In(column, values) => format!(
                    "{}=in.({})",
                    column,
                    values.iter().map(encode_value).collect::<Vec<_>>().join(",")
                ),
                Filter::IsNull(column) => format!("{}=is.null", column),
                Filter::Gte(column, value) => format!("{}=gte.{}", column, encode_value(value)),
                Filter::Lt(column, value) => format!("{}=lt.{}", column, encode_value(value)),
            })
            .collect();

        if let Some(order) = &self.order {
            let direction = if order.descending { "desc" } else { "asc" };
            parts.push(format!("order={}.{}", order.column, direction));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }

        parts.join("&")
    }
}

/// Durable read/append access to the logical tables.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, table: &str, row: Value) -> Result<()>;

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    /// Applies `patch` to every matching row and returns how many rows changed.
    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<usize>;
}

pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => Some(a.cmp(&b)),
                _ => Some(a.cmp(b)),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn encode_value(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    // `+` in RFC 3339 offsets must be percent-encoded
    raw.replace('%', "%25")
        .replace('+', "%2B")
        .replace(' ', "%20")
        .replace('&', "%26")
        .replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_string_encoding() {
        let query = Query::new()
            .eq("status", "active")
            .is_null("processed_at")
            .gte("created_at", "2025-01-01T00:00:00+00:00")
            .order_by("created_at", true)
            .limit(10);

        assert_eq!(
            query.to_query_string(),
            "status=eq.active&processed_at=is.null&created_at=gte.2025-01-01T00:00:00%2B00:00&order=created_at.desc&limit=10"
        );
    }

    #[test]
    fn test_in_filter_encoding() {
        let query = Query::new().one_of("status", vec![json!("active"), json!("notified")]);
        assert_eq!(query.to_query_string(), "status=in.(active,notified)");
    }

    #[test]
    fn test_filter_matching() {
        let row = json!({"status": "active", "escalation_count": 2, "processed_at": null});

        assert!(Query::new().eq("status", "active").matches(&row));
        assert!(Query::new().is_null("processed_at").matches(&row));
        assert!(Query::new().lt("escalation_count", 3).matches(&row));
        assert!(!Query::new().lt("escalation_count", 2).matches(&row));
        assert!(Query::new().gte("escalation_count", 2).matches(&row));
        assert!(!Query::new().one_of("status", vec![json!("resolved")]).matches(&row));
        assert!(Query::new().is_null("missing_column").matches(&row));
    }

    #[test]
    fn test_timestamps_compare_chronologically() {
        let row = json!({"created_at": "2025-01-01T00:00:00.500Z"});
        assert!(Query::new().gte("created_at", "2025-01-01T00:00:00Z").matches(&row));
        assert!(Query::new().lt("created_at", "2025-01-01T00:00:01+00:00").matches(&row));
    }
}
