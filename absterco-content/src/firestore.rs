//! Cloud Firestore over its REST v1 API.
//!
//! Firestore documents hold typed values (`{"stringValue": "..."}`); this
//! adapter converts to and from plain JSON. Strings that parse as RFC 3339
//! timestamps are stored as `timestampValue` so ordering by them is by instant.

use std::time::Duration;

use absterco_core::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::store::{Direction, DocumentStore, Query};

#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub database: String,
    /// `host:port` of a local emulator; plain HTTP, no auth.
    pub emulator_host: Option<String>,
    /// OAuth2 bearer token for the production endpoint.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl FirestoreSettings {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: "(default)".to_string(),
            emulator_host: None,
            access_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// `.../projects/{project}/databases/{database}/documents`
    pub fn documents_url(&self) -> String {
        let origin = match &self.emulator_host {
            Some(host) => format!("http://{}", host.trim_end_matches('/')),
            None => "https://firestore.googleapis.com".to_string(),
        };
        format!(
            "{origin}/v1/projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

pub struct FirestoreStore {
    client: Client,
    settings: FirestoreSettings,
    documents_url: String,
}

impl FirestoreStore {
    pub fn new(settings: FirestoreSettings) -> AppResult<Self> {
        if settings.project_id.trim().is_empty() {
            return Err(AppError::bad_request("Firestore project id is required").into_anyhow());
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                AppError::repository("Failed to build Firestore HTTP client")
                    .with_source(e.into())
                    .into_anyhow()
            })?;

        Ok(Self {
            client,
            documents_url: settings.documents_url(),
            settings,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.settings.emulator_host, &self.settings.access_token) {
            (None, Some(token)) => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn send(&self, op: &str, request: RequestBuilder) -> AppResult<Response> {
        self.authorize(request).send().await.map_err(|e| {
            AppError::repository(format!("Firestore {op} request failed"))
                .with_source(e.into())
                .into_anyhow()
        })
    }

    async fn read_json(op: &str, response: Response) -> AppResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = if status == StatusCode::NOT_FOUND {
                AppError::not_found(format!("Firestore {op}: document not found"))
            } else {
                AppError::repository(format!("Firestore {op} failed with {status}: {body}"))
            };
            return Err(err.into_anyhow());
        }

        response.json::<Value>().await.map_err(|e| {
            AppError::repository(format!("Failed to parse Firestore {op} response"))
                .with_source(e.into())
                .into_anyhow()
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let url = format!("{}/{collection}/{id}", self.documents_url);
        let response = self.send("get", self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = Self::read_json("get", response).await?;
        Ok(Some(document_to_json(&doc)))
    }

    async fn create(&self, collection: &str, data: Value) -> AppResult<Value> {
        let mut obj = match data {
            Value::Object(obj) => obj,
            _ => return Err(AppError::repository("create expects a JSON object").into_anyhow()),
        };
        obj.remove("id");
        obj.insert(
            "createdAt".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let url = format!("{}/{collection}", self.documents_url);
        let body = json!({ "fields": to_fields(&obj) });
        let response = self.send("create", self.client.post(&url).json(&body)).await?;
        let doc = Self::read_json("create", response).await?;

        debug!(collection, "firestore.create");
        Ok(document_to_json(&doc))
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<Value> {
        let mut obj = match patch {
            Value::Object(obj) => obj,
            _ => return Err(AppError::repository("update expects a JSON object").into_anyhow()),
        };
        obj.remove("id");

        let url = format!("{}/{collection}/{id}", self.documents_url);
        let mut params: Vec<(&str, String)> = obj
            .keys()
            .map(|k| ("updateMask.fieldPaths", field_path(k)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));

        let body = json!({ "fields": to_fields(&obj) });
        let response = self
            .send("update", self.client.patch(&url).query(&params).json(&body))
            .await?;
        let doc = Self::read_json("update", response).await?;

        debug!(collection, id, "firestore.update");
        Ok(document_to_json(&doc))
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        let url = format!("{}/{collection}/{id}", self.documents_url);
        let response = self.send("delete", self.client.delete(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::read_json("delete", response).await?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Value>> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = json!({ "structuredQuery": structured_query(collection, query) });
        let response = self.send("query", self.client.post(&url).json(&body)).await?;
        let rows = Self::read_json("query", response).await?;

        // One element per result; an element without `document` only carries readTime.
        Ok(rows
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|r| r.get("document"))
                    .map(document_to_json)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Field names that are not plain identifiers must be backquoted.
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "\\`"))
    }
}

pub fn structured_query(collection: &str, query: &Query) -> Value {
    let mut q = json!({ "from": [{ "collectionId": collection }] });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(&f.field) },
                    "op": "EQUAL",
                    "value": field_value(&f.field, &f.value),
                }
            })
        })
        .collect();

    match filters.len() {
        0 => {}
        1 => q["where"] = filters.into_iter().next().unwrap_or(Value::Null),
        _ => {
            q["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } });
        }
    }

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Asc => "ASCENDING",
            Direction::Desc => "DESCENDING",
        };
        q["orderBy"] = json!([{ "field": { "fieldPath": field_path(&order.field) }, "direction": direction }]);
    }

    if let Some(limit) = query.limit {
        q["limit"] = json!(limit);
    }

    q
}

/// Top-level fields stored as `timestampValue`. Every other string stays a
/// `stringValue`, even when it happens to parse as RFC 3339.
const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt", "publishedAt"];

pub fn to_fields(obj: &Map<String, Value>) -> Value {
    Value::Object(
        obj.iter()
            .map(|(k, v)| (k.clone(), field_value(k, v)))
            .collect(),
    )
}

fn field_value(name: &str, value: &Value) -> Value {
    match value {
        Value::String(s) if TIMESTAMP_FIELDS.contains(&name) && is_timestamp(s) => {
            json!({ "timestampValue": s })
        }
        other => to_firestore_value(other),
    }
}

pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(obj) => json!({
            "mapValue": {
                "fields": obj
                    .iter()
                    .map(|(k, v)| (k.clone(), to_firestore_value(v)))
                    .collect::<Map<String, Value>>()
            }
        }),
    }
}

pub fn from_firestore_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" => inner.clone(),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "doubleValue" => inner.clone(),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(|v| v.as_array())
                .map(|items| items.iter().map(from_firestore_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => fields_to_json(inner.get("fields")),
        _ => Value::Null,
    }
}

fn fields_to_json(fields: Option<&Value>) -> Value {
    Value::Object(
        fields
            .and_then(|f| f.as_object())
            .map(|f| {
                f.iter()
                    .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                    .collect()
            })
            .unwrap_or_default(),
    )
}

/// Firestore document resource to plain JSON with `id` taken from its name.
pub fn document_to_json(doc: &Value) -> Value {
    let mut out = fields_to_json(doc.get("fields"));
    let id = doc
        .get("name")
        .and_then(|n| n.as_str())
        .and_then(|n| n.rsplit('/').next())
        .unwrap_or_default()
        .to_string();
    if let Value::Object(obj) = &mut out {
        obj.insert("id".to_string(), Value::String(id));
    }
    out
}

fn is_timestamp(s: &str) -> bool {
    s.len() >= 20 && s.contains('T') && DateTime::parse_from_rfc3339(s).is_ok()
}
