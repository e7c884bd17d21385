// TableTestHarness - a mounted table driven by a manual executor
//
// Fetches queue up in the executor until the test runs them, so tests control
// completion order exactly. `settle()` runs everything and ticks until quiet.

use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use telemetry_table::app::{Collaborators, HostGeometry, HostReady, VirtualTable};
use telemetry_table::error::TableError;
use telemetry_table::model::query::QueryScope;
use telemetry_table::model::row::RowId;
use telemetry_table::services::async_bridge::AsyncBridge;
use telemetry_table::services::executor::ManualExecutor;
use telemetry_table::services::page_source::{
    LookupRequest, PageRequest, PageResponse, PageSource,
};
use telemetry_table::services::settings::MemorySettingsStore;
use telemetry_table::view::frame_queue::ScrollInput;
use telemetry_table::TableConfig;

/// Default viewport: 10 rows of 45px
pub const VIEWPORT_HEIGHT: f64 = 450.0;

/// The one row whose name is not generated
pub const ALICE_ID: RowId = 42;

pub fn name_of(id: RowId) -> String {
    if id == ALICE_ID {
        "Alice".to_string()
    } else {
        format!("user{id}")
    }
}

/// Positional backend with scriptable failures
pub struct ScriptedSource {
    total_rows: u64,
    requests: Mutex<Vec<PageRequest>>,
    lookups: Mutex<Vec<LookupRequest>>,
    failing: Mutex<HashMap<u64, TableError>>,
    lookup_error: Mutex<Option<TableError>>,
}

impl ScriptedSource {
    pub fn new(total_rows: u64) -> Self {
        Self {
            total_rows,
            requests: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            failing: Mutex::new(HashMap::new()),
            lookup_error: Mutex::new(None),
        }
    }

    pub fn requested_pages(&self) -> Vec<u64> {
        self.requests.lock().unwrap().iter().map(|r| r.page).collect()
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<LookupRequest> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    pub fn fail_page(&self, page: u64) {
        self.failing.lock().unwrap().insert(
            page,
            TableError::NetworkFailure("HTTP status 503".to_string()),
        );
    }

    /// Answer `page` with a 4xx the table must not retry
    pub fn reject_page(&self, page: u64) {
        self.failing
            .lock()
            .unwrap()
            .insert(page, TableError::Rejected("HTTP status 400".to_string()));
    }

    pub fn heal_all(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn fail_lookups(&self, error: TableError) {
        *self.lookup_error.lock().unwrap() = Some(error);
    }
}

impl PageSource for ScriptedSource {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TableError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.failing.lock().unwrap().get(&request.page) {
            return Err(error.clone());
        }
        let start = request.offset + 1;
        let end = (request.offset + request.limit).min(self.total_rows);
        let rows = (start..=end)
            .map(|id| {
                json!({
                    "id": id,
                    "name": name_of(id),
                    "rssi": -((id % 120) as i64),
                    "source": format!("gateway_{}", id % 3),
                })
            })
            .collect();
        Ok(PageResponse {
            rows,
            total_count: Some(self.total_rows),
            total_visible_count: None,
        })
    }

    fn lookup(&self, request: &LookupRequest) -> Result<Option<RowId>, TableError> {
        self.lookups.lock().unwrap().push(request.clone());
        if let Some(error) = self.lookup_error.lock().unwrap().clone() {
            return Err(error);
        }
        if request.field != "name" {
            return Ok(None);
        }
        Ok((1..=self.total_rows).find(|id| name_of(*id) == request.value))
    }
}

pub struct TableTestHarness {
    pub table: VirtualTable,
    pub source: Arc<ScriptedSource>,
    pub executor: Arc<ManualExecutor>,
    pub settings: Arc<MemorySettingsStore>,
    pub host: HostReady,
}

impl TableTestHarness {
    /// 10,000 rows, default config, 450px viewport
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    pub fn with_config(config: TableConfig) -> Self {
        let host = HostReady::with_geometry(HostGeometry::new(800.0, VIEWPORT_HEIGHT));
        Self::with_host(config, host)
    }

    pub fn with_host(config: TableConfig, host: HostReady) -> Self {
        let backend_rows = config.total_rows;
        Self::with_parts(config, host, backend_rows, QueryScope::default())
    }

    /// A backend whose row count differs from the configured initial size
    pub fn with_backend_rows(config: TableConfig, backend_rows: u64) -> Self {
        let host = HostReady::with_geometry(HostGeometry::new(800.0, VIEWPORT_HEIGHT));
        Self::with_parts(config, host, backend_rows, QueryScope::default())
    }

    /// Mounted with an initial query scope
    pub fn with_scope(scope: QueryScope) -> Self {
        let config = TableConfig::default();
        let host = HostReady::with_geometry(HostGeometry::new(800.0, VIEWPORT_HEIGHT));
        let backend_rows = config.total_rows;
        Self::with_parts(config, host, backend_rows, scope)
    }

    fn with_parts(
        config: TableConfig,
        host: HostReady,
        backend_rows: u64,
        scope: QueryScope,
    ) -> Self {
        let source = Arc::new(ScriptedSource::new(backend_rows));
        let executor = Arc::new(ManualExecutor::new());
        let settings = Arc::new(MemorySettingsStore::new());
        let table = VirtualTable::mount_with_scope(
            "users",
            config,
            host.clone(),
            Collaborators {
                source: source.clone(),
                executor: executor.clone(),
                settings: settings.clone(),
                bridge: AsyncBridge::new(),
            },
            scope,
        )
        .expect("mount");
        Self {
            table,
            source,
            executor,
            settings,
            host,
        }
    }

    /// Run every queued task and tick until no more work appears
    pub fn settle(&mut self) {
        for _ in 0..64 {
            let ran = self.executor.run_all();
            self.table.tick();
            if ran == 0 && self.executor.pending() == 0 {
                return;
            }
        }
        panic!("table did not settle");
    }

    /// Scroll so that `id` is the first visible row, through the frame queue
    pub fn scroll_to_row(&mut self, id: RowId) {
        let offset = (id - 1) as f64 * self.table.config().row_height;
        self.table.scroll(ScrollInput::To(offset));
        self.table.tick();
    }

    pub fn visible(&self) -> std::ops::RangeInclusive<RowId> {
        self.table
            .window_sample()
            .expect("window")
            .visible()
    }
}
