// Framework bootstrap for the campus server runtime.

use crate::domain::World;
use crate::frameworks::config;
use crate::interface_adapters::net::{snapshot_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game::world_task;
use crate::use_cases::{GameEvent, Outbound, Snapshot};

use axum::{Router, extract::ws::Utf8Bytes, routing::get};
use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Removes `//` line comments so relaxed world files parse as plain JSON.
/// Comment markers inside string literals are left alone.
fn strip_line_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Drop the rest of the line, keep the newline.
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Loads the world file named by the environment. A missing file falls back
/// to the built-in campus; a file that exists but does not parse or does not
/// validate is a fatal startup error.
fn load_world(path: &str) -> Result<World> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path, "world file not found; using built-in campus");
            return Ok(World::default_campus());
        }
        Err(e) => return Err(e),
    };

    let world: World = serde_json::from_str(&strip_line_comments(&source))
        .map_err(|e| std::io::Error::other(format!("world file {path}: {e}")))?;
    world
        .validate()
        .map_err(|e| std::io::Error::other(format!("world file {path}: {e}")))?;

    tracing::info!(
        path,
        rooms = world.rooms.len(),
        obstacles = world.obstacles.len(),
        "world loaded"
    );
    Ok(world)
}

fn build_state(world: Arc<World>) -> Arc<AppState> {
    // Channel wiring for the single world loop.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::EVENT_CHANNEL_CAPACITY);
    let (snapshot_tx, _snapshot_rx) =
        broadcast::channel::<Snapshot>(config::SNAPSHOT_BROADCAST_CAPACITY);
    let (snapshot_bytes_tx, _snapshot_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::SNAPSHOT_BROADCAST_CAPACITY);
    let (snapshot_latest_tx, _snapshot_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
    let (outbound_tx, _outbound_rx) =
        broadcast::channel::<Outbound>(config::OUTBOUND_BROADCAST_CAPACITY);

    // Spawn the authoritative world loop: the only task that mutates
    // simulation state.
    tokio::spawn(world_task(
        input_rx,
        snapshot_tx.clone(),
        outbound_tx.clone(),
        Arc::clone(&world),
        config::TICK_INTERVAL,
        config::NAME_SWEEP_INTERVAL,
    ));

    // Spawn the snapshot serializer in the adapter layer.
    tokio::spawn(snapshot_serializer(
        snapshot_tx.subscribe(),
        snapshot_bytes_tx.clone(),
        snapshot_latest_tx.clone(),
    ));

    Arc::new(AppState {
        input_tx,
        snapshot_tx,
        snapshot_bytes_tx,
        snapshot_latest_tx,
        outbound_tx,
        world,
    })
}

pub async fn run(listener: tokio::net::TcpListener, world: World) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(Arc::new(world));

    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let world = load_world(&config::world_file()).inspect_err(|e| {
        tracing::error!(error = %e, "invalid world configuration");
    })?;

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, world).await
}
