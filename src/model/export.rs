//! CSV export and summary statistics over resident rows.
//!
//! Both only see the rows the cache holds; rows that were never fetched or
//! were evicted are not part of the output.

use super::columns::{truthy, ColumnSet};
use super::row::Row;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::{self, Write};

/// Field whose cells export as `OK`/`ERROR` instead of the raw value
const GPS_FIELD: &str = "gps_ok";

fn csv_cell(key: &str, value: Option<&Value>) -> String {
    let text = match value {
        _ if key == GPS_FIELD => {
            if value.is_some_and(truthy) {
                "OK".to_string()
            } else {
                "ERROR".to_string()
            }
        }
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Write the visible columns of `rows` as CSV: a header line of column
/// titles, then one line per row. Every field is quoted.
///
/// Returns the number of data lines written.
pub fn write_csv<'a, W, I>(out: &mut W, columns: &ColumnSet, rows: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Row>,
{
    let header: Vec<String> = columns
        .visible()
        .map(|def| format!("\"{}\"", def.title.replace('"', "\"\"")))
        .collect();
    writeln!(out, "{}", header.join(","))?;

    let mut written = 0;
    for row in rows {
        let line: Vec<String> = columns
            .visible()
            .map(|def| csv_cell(&def.key, row.get(&def.key)))
            .collect();
        writeln!(out, "{}", line.join(","))?;
        written += 1;
    }
    Ok(written)
}

/// Aggregates over the resident rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStats {
    /// Dataset size as the table knows it
    pub total_rows: u64,
    /// Rows the aggregates were computed from
    pub sampled_rows: usize,
    pub unique_modules: usize,
    pub unique_sessions: usize,
    /// Share of sampled rows with a good GPS fix, rounded percent
    pub gps_accuracy: u8,
    /// Oldest and newest `datetime_unix` among sampled rows
    pub time_range: Option<(i64, i64)>,
}

impl DatasetStats {
    pub fn collect<'a, I>(total_rows: u64, rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut modules = BTreeSet::new();
        let mut sessions = BTreeSet::new();
        let mut sampled = 0usize;
        let mut gps_ok = 0usize;
        let mut time_range: Option<(i64, i64)> = None;

        for row in rows {
            sampled += 1;
            if let Some(Value::String(name)) = row.get("module_name") {
                if !name.is_empty() {
                    modules.insert(name.clone());
                }
            }
            if let Some(session) = row.get("id_session").filter(|v| truthy(v)) {
                sessions.insert(session.to_string());
            }
            if row.get(GPS_FIELD).is_some_and(truthy) {
                gps_ok += 1;
            }
            if let Some(ts) = row.get("datetime_unix").and_then(Value::as_i64).filter(|ts| *ts != 0) {
                time_range = Some(match time_range {
                    Some((min, max)) => (min.min(ts), max.max(ts)),
                    None => (ts, ts),
                });
            }
        }

        let gps_accuracy = if sampled > 0 {
            ((gps_ok as f64 / sampled as f64) * 100.0).round() as u8
        } else {
            0
        };

        Self {
            total_rows,
            sampled_rows: sampled,
            unique_modules: modules.len(),
            unique_sessions: sessions.len(),
            gps_accuracy,
            time_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::columns::ColumnDef;
    use serde_json::json;

    fn row(id: u64, value: Value) -> Row {
        Row::from_value(value, id).unwrap()
    }

    #[test]
    fn test_csv_quotes_and_flags() {
        let columns = ColumnSet::new(vec![
            ColumnDef::new("id", "ID", 4, true),
            ColumnDef::new("module_name", "Name \"short\"", 8, true),
            ColumnDef::new("gps_ok", "GPS", 4, true),
            ColumnDef::new("lat", "Lat", 4, false),
        ]);
        let rows = vec![
            row(1, json!({"module_name": "Tracker \"A\", north", "gps_ok": true, "lat": 1.5})),
            row(2, json!({"gps_ok": 0})),
        ];

        let mut out = Vec::new();
        assert_eq!(write_csv(&mut out, &columns, &rows).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#""ID","Name ""short""","GPS""#);
        assert_eq!(lines[1], r#""1","Tracker ""A"", north","OK""#);
        assert_eq!(lines[2], r#""2","","ERROR""#);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_stats_aggregate() {
        let rows = vec![
            row(1, json!({"module_name": "a", "id_session": 7, "gps_ok": true, "datetime_unix": 300})),
            row(2, json!({"module_name": "b", "id_session": 7, "gps_ok": false, "datetime_unix": 100})),
            row(3, json!({"module_name": "a", "id_session": 8, "gps_ok": true, "datetime_unix": 0})),
            row(4, json!({"module_name": "", "id_session": null})),
        ];
        let stats = DatasetStats::collect(10, &rows);
        assert_eq!(stats.total_rows, 10);
        assert_eq!(stats.sampled_rows, 4);
        assert_eq!(stats.unique_modules, 2);
        assert_eq!(stats.unique_sessions, 2);
        assert_eq!(stats.gps_accuracy, 50);
        assert_eq!(stats.time_range, Some((100, 300)));
    }

    #[test]
    fn test_stats_empty() {
        let stats = DatasetStats::collect(0, std::iter::empty());
        assert_eq!(stats, DatasetStats::default());
    }
}
