//! Rows, row ids and page geometry.

use serde_json::{Map, Value};
use std::ops::RangeInclusive;

/// 1-based row id; ids are positions in the backend sequence
pub type RowId = u64;

/// 0-based page index: `floor((id - 1) / limit)`
pub type PageIndex = u64;

/// Maps between row ids and pages of a fixed size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    limit: u64,
}

impl PageGeometry {
    /// `limit` is clamped to at least 1
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn page_of(&self, id: RowId) -> PageIndex {
        id.saturating_sub(1) / self.limit
    }

    /// Offset sent to the paging API for this page
    pub fn offset(&self, page: PageIndex) -> u64 {
        page * self.limit
    }

    pub fn first_id(&self, page: PageIndex) -> RowId {
        self.offset(page) + 1
    }

    pub fn last_id(&self, page: PageIndex) -> RowId {
        (page + 1) * self.limit
    }

    pub fn ids(&self, page: PageIndex) -> RangeInclusive<RowId> {
        self.first_id(page)..=self.last_id(page)
    }

    /// Pages intersecting an id range
    pub fn pages_for(&self, range: &RangeInclusive<RowId>) -> RangeInclusive<PageIndex> {
        self.page_of(*range.start())..=self.page_of(*range.end())
    }

    pub fn intersects(&self, page: PageIndex, range: &RangeInclusive<RowId>) -> bool {
        !range.is_empty() && self.first_id(page) <= *range.end() && self.last_id(page) >= *range.start()
    }

    pub fn page_count(&self, total_rows: u64) -> u64 {
        total_rows.div_ceil(self.limit)
    }
}

/// A record with a stable id plus an open map of named fields
///
/// `fields["id"]` always mirrors `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RowId,
    fields: Map<String, Value>,
}

impl Row {
    pub fn new(id: RowId, mut fields: Map<String, Value>) -> Self {
        fields.insert("id".to_string(), Value::from(id));
        Self { id, fields }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The same fields under a new id
    pub fn with_id(self, id: RowId) -> Self {
        Self::new(id, self.fields)
    }

    /// Shallow merge: `patch` fields overwrite ours, the id stays
    pub fn merged(&self, patch: Map<String, Value>) -> Self {
        let mut fields = self.fields.clone();
        fields.extend(patch);
        Self::new(self.id, fields)
    }

    /// Build a row from a JSON element. Objects without a usable `id` take
    /// `fallback_id`; anything that is not an object yields `None`.
    pub fn from_value(value: Value, fallback_id: RowId) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let id = fields.get("id").and_then(parse_id).unwrap_or(fallback_id);
        Some(Self::new(id, fields))
    }
}

/// Accepts positive integers and numeric strings
pub fn parse_id(value: &Value) -> Option<RowId> {
    match value {
        Value::Number(n) => n.as_u64().filter(|id| *id > 0),
        Value::String(s) => s.trim().parse::<RowId>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

/// Validate the elements of one page response.
///
/// Missing ids are positional (`offset + index + 1`). Non-objects and rows
/// whose id falls outside the page are dropped.
pub fn decode_page_rows(values: Vec<Value>, page: PageIndex, geometry: &PageGeometry) -> Vec<Row> {
    let offset = geometry.offset(page);
    let ids = geometry.ids(page);
    let mut rows = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        let fallback = offset + index as u64 + 1;
        match Row::from_value(value, fallback) {
            Some(row) if ids.contains(&row.id()) => rows.push(row),
            Some(row) => {
                tracing::warn!(
                    "Dropping row {} outside page {} ({}..={})",
                    row.id(),
                    page,
                    ids.start(),
                    ids.end()
                );
            }
            None => {
                tracing::warn!("Dropping non-object element {} of page {}", index, page);
            }
        }
    }

    rows
}
