use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use crossterm::event::{
    poll as event_poll, read as event_read, DisableMouseCapture, EnableMouseCapture,
    Event as CrosstermEvent, KeyEventKind,
};
use crossterm::execute;
use ratatui::layout::Rect;
use ratatui::DefaultTerminal;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry_table::app::{Collaborators, HostReady, VirtualTable};
use telemetry_table::model::query::QueryScope;
use telemetry_table::config_io::{resolve_config, DirectoryContext};
use telemetry_table::services::async_bridge::AsyncBridge;
use telemetry_table::services::demo_source::DemoPageSource;
use telemetry_table::services::http_source::HttpPageSource;
use telemetry_table::services::page_source::PageSource;
use telemetry_table::services::settings::{
    ColumnSettingsStore, JsonFileSettingsStore, MemorySettingsStore,
};
use telemetry_table::services::tracing_setup;
use telemetry_table::ui::{ScreenLayout, TableScreen};
use telemetry_table::TableConfig;

/// Browse a large remote telemetry table in the terminal
#[derive(Parser, Debug)]
#[command(name = "telemetry-table")]
#[command(about = "Windowed viewer for remotely paginated telemetry tables", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the paging API base URL
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Serve generated rows instead of calling the API
    #[arg(long)]
    demo: bool,

    /// Number of generated rows in demo mode
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    demo_rows: u64,

    /// Artificial latency per demo request, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 150)]
    demo_latency: u64,

    /// Scope the table to one session
    #[arg(long, value_name = "ID")]
    session: Option<i64>,

    /// Jump to this row id after mounting
    #[arg(long, value_name = "ID")]
    goto: Option<i64>,

    /// Path to log file (default: data directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Keep column choices in memory only
    #[arg(long)]
    no_settings: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    print_schema: bool,

    /// Print the directories used and exit
    #[arg(long)]
    show_paths: bool,
}

const TABLE_NAME: &str = "users";
const FRAME_DURATION: Duration = Duration::from_millis(16);

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if args.print_schema {
        println!("{}", TableConfig::json_schema()?);
        return Ok(());
    }

    let dir_context = DirectoryContext::from_system().context("Failed to resolve directories")?;

    if args.show_paths {
        println!("config:   {}", dir_context.config_path().display());
        println!("columns:  {}", dir_context.column_settings_path().display());
        println!("log:      {}", dir_context.log_path().display());
        return Ok(());
    }

    let mut config = resolve_config(&dir_context, args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(api_url) = &args.api_url {
        config.api_url = api_url.clone();
    }
    // One terminal line per row
    config.row_height = 1.0;
    config.min_thumb = 1.0;
    config.min_panel_width = 20;
    if args.demo {
        config.total_rows = args.demo_rows;
    }

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let log_path = args.log_file.clone().unwrap_or_else(|| dir_context.log_path());
    if let Err(e) = tracing_setup::init_global(&log_path) {
        eprintln!("Warning: logging disabled ({}): {}", log_path.display(), e);
    }
    tracing::info!("Starting telemetry-table {}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let source: Arc<dyn PageSource> = if args.demo {
        Arc::new(DemoPageSource::new(
            args.demo_rows,
            Duration::from_millis(args.demo_latency),
        ))
    } else {
        Arc::new(HttpPageSource::new(
            &config.api_url,
            Duration::from_millis(config.request_timeout_ms),
        ))
    };
    let settings: Arc<dyn ColumnSettingsStore> = if args.no_settings {
        Arc::new(MemorySettingsStore::new())
    } else {
        Arc::new(JsonFileSettingsStore::new(dir_context.column_settings_path()))
    };
    let collaborators = Collaborators {
        source,
        executor: Arc::new(runtime.handle().clone()),
        settings,
        bridge: AsyncBridge::new(),
    };

    let mut terminal = ratatui::init();
    if let Err(e) = execute!(stdout(), EnableMouseCapture) {
        tracing::warn!("Mouse capture unavailable: {}", e);
    }

    let result = run(&mut terminal, config, collaborators, &args);

    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    if let Err(e) = &result {
        tracing::error!("Exited with error: {:#}", e);
    }
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

fn run(
    terminal: &mut DefaultTerminal,
    config: TableConfig,
    collaborators: Collaborators,
    args: &Args,
) -> AnyhowResult<()> {
    let host = HostReady::new();
    let size = terminal.size()?;
    let area = Rect::new(0, 0, size.width, size.height);
    let mut layout = ScreenLayout::new(area);
    host.report(layout.host_geometry(area));

    let scope = QueryScope {
        session_id: args.session,
        ..QueryScope::default()
    };
    let mut table =
        VirtualTable::mount_with_scope(TABLE_NAME, config, host.clone(), collaborators, scope)?;

    let mut screen = TableScreen::new();
    screen.set_layout(layout);
    if let Some(id) = args.goto {
        screen.jump_to(&mut table, id);
    }
    let mut last_render = Instant::now();
    let mut needs_render = true;

    loop {
        if table.tick() {
            needs_render = true;
        }
        if screen.poll(&mut table) {
            needs_render = true;
        }
        if screen.should_quit() {
            break;
        }

        if needs_render && last_render.elapsed() >= FRAME_DURATION {
            terminal.draw(|frame| screen.draw(frame, &table))?;
            // The terminal has no scroll notification to echo back
            table.scroll_presented();
            last_render = Instant::now();
            needs_render = false;
        }

        if !event_poll(FRAME_DURATION)? {
            continue;
        }
        match event_read()? {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                screen.handle_key(&mut table, key);
                needs_render = true;
            }
            CrosstermEvent::Mouse(mouse) => {
                screen.handle_mouse(&mut table, mouse);
                needs_render = true;
            }
            CrosstermEvent::Resize(width, height) => {
                let area = Rect::new(0, 0, width, height);
                layout = ScreenLayout::new(area);
                screen.set_layout(layout);
                host.report(layout.host_geometry(area));
                needs_render = true;
            }
            _ => {}
        }
    }

    table.destroy();
    Ok(())
}
