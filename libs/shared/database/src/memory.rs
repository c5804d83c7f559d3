use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{compare_values, Query, Store};

/// Process-local store. Used when no Supabase project is configured and by tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }

    pub async fn all_rows(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables.get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert(&self, table: &str, row: Value) -> Result<()> {
        if !row.is_object() {
            return Err(anyhow!("rows must be JSON objects, got {}", row));
        }
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right).unwrap_or(std::cmp::Ordering::Equal);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<usize> {
        let patch = patch
            .as_object()
            .ok_or_else(|| anyhow!("patch must be a JSON object"))?
            .clone();

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let mut updated = 0;
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            if let Some(fields) = row.as_object_mut() {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
                updated += 1;
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_select_update() {
        let store = InMemoryStore::new();
        store.insert("alerts", json!({"id": "a", "status": "active", "n": 1})).await.unwrap();
        store.insert("alerts", json!({"id": "b", "status": "active", "n": 2})).await.unwrap();
        store.insert("alerts", json!({"id": "c", "status": "resolved", "n": 3})).await.unwrap();

        let active = store
            .select("alerts", &Query::new().eq("status", "active").order_by("n", true))
            .await
            .unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0]["id"], "b");

        let changed = store
            .update("alerts", &Query::new().eq("id", "a"), json!({"status": "notified"}))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let notified = store
            .select("alerts", &Query::new().eq("status", "notified"))
            .await
            .unwrap();
        assert_eq!(notified[0]["n"], 1);
    }

    #[tokio::test]
    async fn test_select_unknown_table_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.select("nothing", &Query::new()).await.unwrap().is_empty());
        assert_eq!(store.update("nothing", &Query::new(), json!({})).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_object_rows() {
        let store = InMemoryStore::new();
        assert!(store.insert("alerts", json!([1, 2])).await.is_err());
    }
}
