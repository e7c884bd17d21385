//! Query scope forwarded with every page fetch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Server-side sort order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: String,
    pub direction: SortDirection,
}

/// Session, filters and sort that define which dataset ids refer to
///
/// Row ids are positions within this scope, so any change to it invalidates
/// every cached page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryScope {
    pub session_id: Option<i64>,
    pub filters: BTreeMap<String, String>,
    pub sort: Option<SortState>,
}

impl QueryScope {
    /// Sort by `field`: same field flips direction, a new field starts ascending
    pub fn sort_by(&mut self, field: &str) -> &SortState {
        let direction = match &self.sort {
            Some(current) if current.field == field => current.direction.toggled(),
            _ => SortDirection::Asc,
        };
        self.sort.insert(SortState {
            field: field.to_string(),
            direction,
        })
    }

    /// Query parameters in a stable order: session, sort, then filters by key
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(session_id) = self.session_id {
            pairs.push(("session_id".to_string(), session_id.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.field.clone()));
            pairs.push(("order".to_string(), sort.direction.as_str().to_string()));
        }
        for (key, value) in &self.filters {
            pairs.push((key.clone(), value.clone()));
        }
        pairs
    }

    /// Identity under which column settings are stored
    pub fn settings_key(&self, table_name: &str) -> String {
        match self.session_id {
            Some(session_id) => format!("{table_name}#{session_id}"),
            None => table_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_toggles_on_same_field() {
        let mut scope = QueryScope::default();
        assert_eq!(scope.sort_by("rssi").direction, SortDirection::Asc);
        assert_eq!(scope.sort_by("rssi").direction, SortDirection::Desc);
        assert_eq!(scope.sort_by("rssi").direction, SortDirection::Asc);
        let sort = scope.sort_by("snr");
        assert_eq!(sort.field, "snr");
        assert_eq!(sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_query_pairs_order() {
        let mut scope = QueryScope {
            session_id: Some(7),
            ..QueryScope::default()
        };
        scope.filters.insert("source".to_string(), "lora".to_string());
        scope.filters.insert("module_id".to_string(), "3".to_string());
        scope.sort_by("rssi");

        let pairs = scope.query_pairs();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["session_id", "sort", "order", "module_id", "source"]);
        assert_eq!(pairs[2].1, "asc");
    }

    #[test]
    fn test_settings_key() {
        let mut scope = QueryScope::default();
        assert_eq!(scope.settings_key("telemetry"), "telemetry");
        scope.session_id = Some(12);
        assert_eq!(scope.settings_key("telemetry"), "telemetry#12");
    }
}
