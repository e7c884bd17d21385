//! Column definitions, visibility and cell formatting.

use super::row::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder for missing or null cell values
pub const MISSING_VALUE: &str = "N/A";

/// Fallback color for swatch cells without a value
pub const DEFAULT_SWATCH: &str = "#CCCCCC";

/// Column key to visible flag, as persisted by the settings store
pub type ColumnVisibility = BTreeMap<String, bool>;

/// How a cell value is turned into text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnFormat {
    /// Value as-is
    #[default]
    Text,
    /// Number with a fixed count of decimals
    Fixed { decimals: usize },
    /// Boolean rendered as one of two labels
    Flag { yes: String, no: String },
    /// Number rounded to an integer with a unit suffix
    Unit { suffix: String },
    /// Color string; hosts draw it as a colored block
    Swatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDef {
    /// Field name in the row map
    pub key: String,
    /// Header text
    pub title: String,
    /// Width in cells
    #[serde(default = "default_width")]
    pub width: u16,
    /// Visible unless the user hides it
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Whether the header may be used for server-side sort
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default)]
    pub format: ColumnFormat,
}

fn default_width() -> u16 {
    10
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    pub fn new(key: &str, title: &str, width: u16, visible: bool) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            width,
            visible,
            sortable: true,
            format: ColumnFormat::Text,
        }
    }

    pub fn with_format(mut self, format: ColumnFormat) -> Self {
        self.format = format;
        self
    }

    /// Format this column's value from a row
    pub fn format_value(&self, row: &Row) -> String {
        let value = match row.get(&self.key) {
            None | Some(Value::Null) => {
                return match self.format {
                    ColumnFormat::Swatch => DEFAULT_SWATCH.to_string(),
                    _ => MISSING_VALUE.to_string(),
                }
            }
            Some(value) => value,
        };

        match &self.format {
            ColumnFormat::Text => match value {
                Value::String(s) if s.is_empty() => MISSING_VALUE.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            ColumnFormat::Fixed { decimals } => match as_f64(value) {
                Some(n) => format!("{:.*}", *decimals, n),
                None => MISSING_VALUE.to_string(),
            },
            ColumnFormat::Flag { yes, no } => {
                if truthy(value) {
                    yes.clone()
                } else {
                    no.clone()
                }
            }
            ColumnFormat::Unit { suffix } => match as_f64(value) {
                Some(n) => format!("{}{}", n.round() as i64, suffix),
                None => MISSING_VALUE.to_string(),
            },
            ColumnFormat::Swatch => match value {
                Value::String(s) if !s.is_empty() => s.clone(),
                _ => DEFAULT_SWATCH.to_string(),
            },
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Default telemetry columns
pub fn default_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("id", "ID", 8, false),
        ColumnDef::new("module_id", "Module ID", 10, true),
        ColumnDef::new("module_name", "Name", 14, false),
        ColumnDef::new("datetime_unix", "Time", 12, true),
        ColumnDef::new("lat", "Lat", 11, false).with_format(ColumnFormat::Fixed { decimals: 6 }),
        ColumnDef::new("lon", "Lon", 11, false).with_format(ColumnFormat::Fixed { decimals: 6 }),
        ColumnDef::new("alt", "Alt", 8, true).with_format(ColumnFormat::Unit {
            suffix: " m".to_string(),
        }),
        ColumnDef::new("rssi", "RSSI", 9, true).with_format(ColumnFormat::Unit {
            suffix: " dBm".to_string(),
        }),
        ColumnDef::new("snr", "SNR", 6, true),
        ColumnDef::new("source", "Source", 9, true),
        ColumnDef::new("jumps", "Jumps", 7, true),
        ColumnDef::new("gps_ok", "GPS", 7, true).with_format(ColumnFormat::Flag {
            yes: "OK".to_string(),
            no: "ERR".to_string(),
        }),
    ]
}

/// Ordered column definitions plus the current visibility map
#[derive(Debug, Clone)]
pub struct ColumnSet {
    defs: Vec<ColumnDef>,
    visibility: ColumnVisibility,
}

impl ColumnSet {
    pub fn new(defs: Vec<ColumnDef>) -> Self {
        let visibility = Self::defaults_of(&defs);
        Self { defs, visibility }
    }

    fn defaults_of(defs: &[ColumnDef]) -> ColumnVisibility {
        defs.iter().map(|def| (def.key.clone(), def.visible)).collect()
    }

    pub fn defs(&self) -> &[ColumnDef] {
        &self.defs
    }

    pub fn get(&self, key: &str) -> Option<&ColumnDef> {
        self.defs.iter().find(|def| def.key == key)
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visibility.get(key).copied().unwrap_or(false)
    }

    pub fn visible(&self) -> impl Iterator<Item = &ColumnDef> {
        self.defs.iter().filter(|def| self.is_visible(&def.key))
    }

    pub fn visibility(&self) -> &ColumnVisibility {
        &self.visibility
    }

    /// Returns true if the visibility changed. Unknown keys are ignored.
    pub fn set_visible(&mut self, key: &str, visible: bool) -> bool {
        match self.visibility.get_mut(key) {
            Some(current) if *current != visible => {
                *current = visible;
                true
            }
            _ => false,
        }
    }

    /// Restore the per-column defaults
    pub fn reset(&mut self) {
        self.visibility = Self::defaults_of(&self.defs);
    }

    /// Overlay persisted visibility; keys not in the column set are skipped
    pub fn apply(&mut self, saved: &ColumnVisibility) {
        for (key, visible) in saved {
            if let Some(current) = self.visibility.get_mut(key) {
                *current = *visible;
            } else {
                tracing::debug!("Ignoring saved visibility for unknown column '{}'", key);
            }
        }
    }

    /// Cells for the visible columns, in display order
    pub fn format_row(&self, row: &Row) -> Vec<String> {
        self.visible().map(|def| def.format_value(row)).collect()
    }

    /// Sum of visible column widths
    pub fn visible_width(&self) -> u32 {
        self.visible().map(|def| def.width as u32).sum()
    }
}
