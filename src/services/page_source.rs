//! Remote paging contract and response decoding.

use crate::error::TableError;
use crate::model::query::QueryScope;
use crate::model::row::{parse_id, PageIndex, RowId};
use serde_json::Value;

/// One page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub page: PageIndex,
    pub offset: u64,
    pub limit: u64,
    pub scope: QueryScope,
}

impl PageRequest {
    /// Query parameters: offset and limit first, then the scope
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("offset".to_string(), self.offset.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        pairs.extend(self.scope.query_pairs());
        pairs
    }
}

/// A search-by-field-value lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub field: String,
    pub value: String,
    pub scope: QueryScope,
}

impl LookupRequest {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("field".to_string(), self.field.clone()),
            ("value".to_string(), self.value.clone()),
        ];
        if let Some(session_id) = self.scope.session_id {
            pairs.push(("session_id".to_string(), session_id.to_string()));
        }
        pairs
    }
}

/// Decoded page body; rows are still raw JSON and get validated by the loader
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResponse {
    pub rows: Vec<Value>,
    pub total_count: Option<u64>,
    pub total_visible_count: Option<u64>,
}

impl PageResponse {
    pub fn from_rows(rows: Vec<Value>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Dataset size the table should scroll over, if the envelope reported one
    pub fn total_rows(&self) -> Option<u64> {
        self.total_visible_count.or(self.total_count)
    }
}

/// Backend that serves pages and lookups
///
/// Calls are blocking; the page loader runs them on an executor and posts the
/// result back through the async bridge.
pub trait PageSource: Send + Sync {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TableError>;

    /// `Ok(None)` means the lookup ran and matched nothing
    fn lookup(&self, request: &LookupRequest) -> Result<Option<RowId>, TableError>;
}

fn field_u64(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// Decode a page body: either a bare array of rows or an envelope
/// `{data|rows, total_count|totalCount|total, total_visible_count}`.
pub fn parse_page_body(body: &str) -> Result<PageResponse, TableError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TableError::InvalidResponse(format!("Failed to parse page body: {e}")))?;

    match value {
        Value::Array(rows) => Ok(PageResponse::from_rows(rows)),
        Value::Object(mut map) => {
            if map.get("success") == Some(&Value::Bool(false)) {
                let message = map
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("request reported failure");
                return Err(TableError::NetworkFailure(message.to_string()));
            }

            let rows = match map.remove("data").or_else(|| map.remove("rows")) {
                Some(Value::Array(rows)) => rows,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(TableError::InvalidResponse(format!(
                        "Expected an array of rows, got {}",
                        type_name(&other)
                    )))
                }
            };

            Ok(PageResponse {
                rows,
                total_count: field_u64(&map, &["total_count", "totalCount", "total"]),
                total_visible_count: field_u64(&map, &["total_visible_count", "totalVisibleCount"]),
            })
        }
        other => Err(TableError::InvalidResponse(format!(
            "Expected an array or object, got {}",
            type_name(&other)
        ))),
    }
}

/// Decode a search body: `{success, target_id}` or `{data: [{id, ..}]}`.
/// `success: false`, a missing id or an empty `data` mean not found.
pub fn parse_lookup_body(body: &str) -> Result<Option<RowId>, TableError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TableError::InvalidResponse(format!("Failed to parse search body: {e}")))?;

    let Value::Object(map) = value else {
        return Err(TableError::InvalidResponse(format!(
            "Expected an object, got {}",
            type_name(&value)
        )));
    };

    if map.get("success") == Some(&Value::Bool(false)) {
        return Ok(None);
    }

    if let Some(target) = map.get("target_id") {
        return Ok(parse_id(target));
    }

    match map.get("data") {
        Some(Value::Array(items)) => Ok(items
            .first()
            .and_then(|item| item.get("id"))
            .and_then(parse_id)),
        Some(Value::Object(item)) => Ok(item.get("id").and_then(parse_id)),
        _ => Ok(map.get("id").and_then(parse_id)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
