//! Generated telemetry data for running the table without a backend.
//!
//! Rows are derived from their record number with a fixed hash, so every
//! fetch of the same page returns the same values. Filters (exact match on the
//! displayed value) and sort are applied the way a backend would: ids in the
//! response are positions in the filtered, sorted sequence.

use super::page_source::{LookupRequest, PageRequest, PageResponse, PageSource};
use crate::error::TableError;
use crate::model::query::{QueryScope, SortDirection};
use crate::model::row::RowId;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::time::Duration;

const MODULES: [&str; 4] = ["Module A", "Module B", "Module C", "Module D"];
const COLORS: [&str; 4] = ["#FF0000", "#00FF00", "#0000FF", "#FFFF00"];
const BASE_UNIX_TIME: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
pub struct DemoPageSource {
    total_rows: u64,
    latency: Duration,
}

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Deterministic value in [0, 1)
fn unit(record: u64, salt: u64) -> f64 {
    (splitmix(record.wrapping_mul(31).wrapping_add(salt)) >> 11) as f64 / (1u64 << 53) as f64
}

impl DemoPageSource {
    pub fn new(total_rows: u64, latency: Duration) -> Self {
        Self {
            total_rows,
            latency,
        }
    }

    /// The record numbered `record` (1-based) for a session
    pub fn record(&self, record: u64, session_id: Option<i64>) -> Map<String, Value> {
        let module = (record % MODULES.len() as u64) as usize;
        let value = json!({
            "id": record,
            "record_id": record,
            "module_id": module + 1,
            "module_name": MODULES[module],
            "module_color": COLORS[module],
            "datetime_unix": BASE_UNIX_TIME + record * 10,
            "lat": 56.4 + (unit(record, 1) - 0.5) * 0.1,
            "lon": 84.9 + (unit(record, 2) - 0.5) * 0.1,
            "alt": (100.0 + unit(record, 3) * 50.0).round(),
            "gps_ok": unit(record, 4) > 0.1,
            "rssi": -80.0 + unit(record, 5) * 20.0,
            "snr": ((10.0 + unit(record, 6) * 10.0) * 10.0).round() / 10.0,
            "source": format!("gateway_{}", record % 3),
            "jumps": record % 5,
            "id_session": session_id.unwrap_or(1),
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn is_plain(scope: &QueryScope) -> bool {
        scope.filters.is_empty() && scope.sort.is_none()
    }

    /// Filtered and sorted records; only built when the scope needs it
    fn sequence(&self, scope: &QueryScope) -> Vec<Map<String, Value>> {
        let mut records: Vec<_> = (1..=self.total_rows)
            .map(|record| self.record(record, scope.session_id))
            .filter(|record| {
                scope
                    .filters
                    .iter()
                    .all(|(key, expected)| record.get(key).is_some_and(|v| matches(v, expected)))
            })
            .collect();

        if let Some(sort) = &scope.sort {
            records.sort_by(|a, b| {
                let ordering = compare(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        records
    }
}

fn matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn with_position(mut record: Map<String, Value>, position: u64) -> Value {
    record.insert("id".to_string(), Value::from(position));
    Value::Object(record)
}

impl PageSource for DemoPageSource {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TableError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if Self::is_plain(&request.scope) {
            let start = request.offset + 1;
            let end = (request.offset + request.limit).min(self.total_rows);
            let rows = (start..=end)
                .map(|record| Value::Object(self.record(record, request.scope.session_id)))
                .collect();
            return Ok(PageResponse {
                rows,
                total_count: Some(self.total_rows),
                total_visible_count: Some(self.total_rows),
            });
        }

        let sequence = self.sequence(&request.scope);
        let visible = sequence.len() as u64;
        let rows = sequence
            .into_iter()
            .enumerate()
            .skip(request.offset as usize)
            .take(request.limit as usize)
            .map(|(index, record)| with_position(record, index as u64 + 1))
            .collect();
        Ok(PageResponse {
            rows,
            total_count: Some(self.total_rows),
            total_visible_count: Some(visible),
        })
    }

    fn lookup(&self, request: &LookupRequest) -> Result<Option<RowId>, TableError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let position = self
            .sequence(&request.scope)
            .iter()
            .position(|record| {
                record
                    .get(&request.field)
                    .is_some_and(|v| matches(v, &request.value))
            })
            .map(|index| index as u64 + 1);
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(offset: u64, limit: u64, scope: QueryScope) -> PageRequest {
        PageRequest {
            page: offset / limit,
            offset,
            limit,
            scope,
        }
    }

    #[test]
    fn test_records_are_deterministic() {
        let source = DemoPageSource::new(100, Duration::ZERO);
        assert_eq!(source.record(17, None), source.record(17, None));
        assert_ne!(source.record(17, None), source.record(18, None));
        let lat = source.record(5, None)["lat"].as_f64().unwrap();
        assert!((56.35..56.45).contains(&lat));
    }

    #[test]
    fn test_plain_page() {
        let source = DemoPageSource::new(250, Duration::ZERO);
        let response = source
            .fetch_page(&request(200, 100, QueryScope::default()))
            .unwrap();
        assert_eq!(response.rows.len(), 50);
        assert_eq!(response.rows[0]["id"], json!(201));
        assert_eq!(response.total_rows(), Some(250));
    }

    #[test]
    fn test_filter_renumbers_positions() {
        let source = DemoPageSource::new(100, Duration::ZERO);
        let mut scope = QueryScope::default();
        scope
            .filters
            .insert("source".to_string(), "gateway_0".to_string());
        let response = source.fetch_page(&request(0, 10, scope)).unwrap();
        assert_eq!(response.total_visible_count, Some(33));
        assert_eq!(response.rows[0]["id"], json!(1));
        assert_eq!(response.rows[0]["record_id"], json!(3));
        assert_eq!(response.rows[1]["record_id"], json!(6));
    }

    #[test]
    fn test_sort_descending() {
        let source = DemoPageSource::new(50, Duration::ZERO);
        let mut scope = QueryScope::default();
        scope.sort_by("datetime_unix");
        scope.sort_by("datetime_unix");
        let response = source.fetch_page(&request(0, 5, scope)).unwrap();
        assert_eq!(response.rows[0]["record_id"], json!(50));
        assert_eq!(response.rows[0]["id"], json!(1));
    }

    #[test]
    fn test_lookup() {
        let source = DemoPageSource::new(100, Duration::ZERO);
        let found = source
            .lookup(&LookupRequest {
                field: "module_name".to_string(),
                value: "Module C".to_string(),
                scope: QueryScope::default(),
            })
            .unwrap();
        assert_eq!(found, Some(2));

        let missing = source
            .lookup(&LookupRequest {
                field: "module_name".to_string(),
                value: "Module Z".to_string(),
                scope: QueryScope::default(),
            })
            .unwrap();
        assert_eq!(missing, None);
    }
}
