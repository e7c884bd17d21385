// HTTP page source against a local tiny_http server

use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use telemetry_table::app::{Collaborators, HostGeometry, HostReady, VirtualTable};
use telemetry_table::error::TableError;
use telemetry_table::model::query::QueryScope;
use telemetry_table::services::async_bridge::AsyncBridge;
use telemetry_table::services::executor::InlineExecutor;
use telemetry_table::services::http_source::HttpPageSource;
use telemetry_table::services::page_source::{LookupRequest, PageRequest, PageSource};
use telemetry_table::services::settings::MemorySettingsStore;
use telemetry_table::TableConfig;
use tiny_http::{Header, Response, Server};

type Responder = Box<dyn Fn(&str) -> (u16, String) + Send + Sync>;

/// Serves one canned handler and records every request URL
struct TestServer {
    base_url: String,
    urls: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(respond: Responder) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let port = server.server_addr().to_ip().expect("ip address").port();
        let urls = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let urls = urls.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(20)) else {
                        continue;
                    };
                    let url = request.url().to_string();
                    urls.lock().unwrap().push(url.clone());
                    let (status, body) = respond(&url);
                    let header =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .unwrap();
                    let response = Response::from_string(body)
                        .with_status_code(status)
                        .with_header(header);
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            base_url: format!("http://127.0.0.1:{port}/api/table"),
            urls,
            stop,
            handle: Some(handle),
        }
    }

    fn source(&self) -> HttpPageSource {
        HttpPageSource::new(&self.base_url, Duration::from_secs(5))
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn query_value<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Envelope of `limit` rows starting at `offset + 1` out of `total`
fn paged_body(url: &str, total: u64) -> String {
    let offset: u64 = query_value(url, "offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: u64 = query_value(url, "limit").and_then(|v| v.parse().ok()).unwrap_or(50);
    let rows: Vec<_> = (offset + 1..=(offset + limit).min(total))
        .map(|id| json!({"id": id, "name": format!("user{id}"), "rssi": -60}))
        .collect();
    json!({"success": true, "data": rows, "total_count": total, "has_more": offset + limit < total})
        .to_string()
}

fn page_request(page: u64, scope: QueryScope) -> PageRequest {
    PageRequest {
        page,
        offset: page * 50,
        limit: 50,
        scope,
    }
}

#[test]
fn test_fetch_page_sends_offset_and_limit() {
    let server = TestServer::start(Box::new(|url| (200, paged_body(url, 10_000))));
    let source = server.source();

    let response = source.fetch_page(&page_request(2, QueryScope::default())).unwrap();

    assert_eq!(response.rows.len(), 50);
    assert_eq!(response.rows[0]["id"], 101);
    assert_eq!(response.total_rows(), Some(10_000));

    let urls = server.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("/api/table?"), "{}", urls[0]);
    assert_eq!(query_value(&urls[0], "offset"), Some("100"));
    assert_eq!(query_value(&urls[0], "limit"), Some("50"));
}

#[test]
fn test_fetch_page_forwards_scope() {
    let server = TestServer::start(Box::new(|url| (200, paged_body(url, 100))));
    let source = server.source();

    let mut scope = QueryScope {
        session_id: Some(7),
        ..QueryScope::default()
    };
    scope.filters.insert("source".to_string(), "gateway_1".to_string());
    scope.sort_by("rssi");

    source.fetch_page(&page_request(0, scope)).unwrap();

    let url = &server.urls()[0];
    assert_eq!(query_value(url, "session_id"), Some("7"));
    assert_eq!(query_value(url, "sort"), Some("rssi"));
    assert_eq!(query_value(url, "order"), Some("asc"));
    assert_eq!(query_value(url, "source"), Some("gateway_1"));
}

#[test]
fn test_server_error_is_network_failure() {
    let server = TestServer::start(Box::new(|_| (500, "{}".to_string())));
    let source = server.source();

    let err = source
        .fetch_page(&page_request(0, QueryScope::default()))
        .unwrap_err();
    assert_eq!(err, TableError::NetworkFailure("HTTP status 500".to_string()));
}

#[test]
fn test_client_error_is_rejected() {
    let server = TestServer::start(Box::new(|_| (400, "{}".to_string())));
    let source = server.source();

    let err = source
        .fetch_page(&page_request(0, QueryScope::default()))
        .unwrap_err();
    assert_eq!(err, TableError::Rejected("HTTP status 400".to_string()));
    assert!(!err.is_retryable());
}

#[test]
fn test_reported_failure_is_network_failure() {
    let server = TestServer::start(Box::new(|_| {
        (200, json!({"success": false, "error": "database busy"}).to_string())
    }));
    let source = server.source();

    let err = source
        .fetch_page(&page_request(0, QueryScope::default()))
        .unwrap_err();
    assert_eq!(err, TableError::NetworkFailure("database busy".to_string()));
}

#[test]
fn test_malformed_body_is_invalid_response() {
    let server = TestServer::start(Box::new(|_| (200, "<html>".to_string())));
    let source = server.source();

    let err = source
        .fetch_page(&page_request(0, QueryScope::default()))
        .unwrap_err();
    assert!(matches!(err, TableError::InvalidResponse(_)), "{err:?}");
}

#[test]
fn test_lookup_hits_search_endpoint() {
    let server = TestServer::start(Box::new(|url| {
        if query_value(url, "value") == Some("Alice") {
            (200, json!({"success": true, "target_id": 4242}).to_string())
        } else {
            (200, json!({"success": false}).to_string())
        }
    }));
    let source = server.source();

    let found = source
        .lookup(&LookupRequest {
            field: "name".to_string(),
            value: "Alice".to_string(),
            scope: QueryScope::default(),
        })
        .unwrap();
    assert_eq!(found, Some(4242));

    let missing = source
        .lookup(&LookupRequest {
            field: "name".to_string(),
            value: "Nobody".to_string(),
            scope: QueryScope::default(),
        })
        .unwrap();
    assert_eq!(missing, None);

    let urls = server.urls();
    assert!(urls[0].starts_with("/api/table/search?"), "{}", urls[0]);
    assert_eq!(query_value(&urls[0], "field"), Some("name"));
}

#[test]
fn test_table_over_http_adopts_reported_size() {
    let server = TestServer::start(Box::new(|url| (200, paged_body(url, 120))));
    let host = HostReady::with_geometry(HostGeometry::new(800.0, 450.0));
    let mut table = VirtualTable::mount(
        "users",
        TableConfig::default(),
        host,
        Collaborators {
            source: Arc::new(server.source()),
            executor: Arc::new(InlineExecutor),
            settings: Arc::new(MemorySettingsStore::new()),
            bridge: AsyncBridge::new(),
        },
    )
    .unwrap();

    // The inline executor has already delivered page 0
    table.tick();
    table.tick();

    let stats = table.stats();
    assert_eq!(stats.total_rows, 120);
    assert!(table.cached_row(1).is_some());
    assert_eq!(table.slot_for(1).map(|slot| slot.id), Some(1));
    assert!(table.scroll_to_id(500).is_err());
    table.scroll_to_id(120).unwrap();
    table.tick();
    table.tick();
    assert!(table.cached_row(120).is_some());
}
