use std::cmp::Ordering;
use std::collections::HashMap;

use absterco_core::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{Direction, DocumentStore, Query};

/// In-process document store for local development and tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, Map<String, Value>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    fn not_found(collection: &str, id: &str) -> anyhow::Error {
        AppError::not_found(format!("No document {collection}/{id}")).into_anyhow()
    }

    fn as_object(data: Value, op: &str) -> AppResult<Map<String, Value>> {
        match data {
            Value::Object(obj) => Ok(obj),
            other => Err(AppError::repository(format!(
                "{op} expects a JSON object, got {other}"
            ))
            .into_anyhow()),
        }
    }

    fn with_id(id: &str, obj: &Map<String, Value>) -> Value {
        let mut out = obj.clone();
        out.insert("id".to_string(), Value::String(id.to_string()));
        Value::Object(out)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|doc| Self::with_id(id, doc)))
    }

    async fn create(&self, collection: &str, data: Value) -> AppResult<Value> {
        let mut obj = Self::as_object(data, "create")?;
        obj.remove("id");
        obj.insert(
            "createdAt".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let id = Uuid::new_v4().simple().to_string();
        let value = Self::with_id(&id, &obj);

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id, obj);

        Ok(value)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<Value> {
        let patch = Self::as_object(patch, "update")?;

        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| Self::not_found(collection, id))?;

        for (k, v) in patch {
            if k == "id" {
                continue;
            }
            record.insert(k, v);
        }

        Ok(Self::with_id(id, record))
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        if let Some(c) = self.collections.write().await.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Value> = docs
            .iter()
            .filter(|(_, doc)| {
                query
                    .filters
                    .iter()
                    .all(|f| doc.get(&f.field) == Some(&f.value))
            })
            .map(|(id, doc)| Self::with_id(id, doc))
            .collect();

        if let Some(order) = &query.order_by {
            rows.sort_by(|a, b| {
                compare_field(a.get(&order.field), b.get(&order.field), order.direction)
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }
}

/// Missing values sort last in either direction. Strings that are RFC 3339
/// timestamps compare as instants.
fn compare_field(a: Option<&Value>, b: Option<&Value>, direction: Direction) -> Ordering {
    fn present(v: Option<&Value>) -> Option<&Value> {
        v.filter(|v| !v.is_null())
    }
    match (present(a), present(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = compare_values(a, b);
            match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
