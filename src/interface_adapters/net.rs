use crate::domain::tuning::MovementTuning;
use crate::domain::{SessionId, ToyKind, Vec2, World};
use crate::interface_adapters::protocol::{
    ActionDto, ClientMessage, HitDto, InitDto, ServerMessage, SnapshotDto, SpaceDto, WorldDto,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{GameEvent, Outbound, SessionEvent, Snapshot};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    EventsClosed,
    SnapshotsClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;

/// Serializes each snapshot once and broadcasts the shared bytes, keeping the
/// latest copy in a watch channel for lag recovery.
pub async fn snapshot_serializer(
    mut snapshot_rx: broadcast::Receiver<Snapshot>,
    snapshot_bytes_tx: broadcast::Sender<Utf8Bytes>,
    snapshot_latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match snapshot_rx.recv().await {
            Ok(snapshot) => {
                let msg = ServerMessage::State(SnapshotDto::from(snapshot));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize snapshot");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                let _ = snapshot_latest_tx.send(bytes.clone());
                let _ = snapshot_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "snapshot serializer lagged; skipping to latest");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("snapshot channel closed; serializer exiting");
                break;
            }
        }
    }
}

/// Process-unique, monotonically increasing session id. Seeding the counter
/// from the clock keeps ids distinct across restarts for log correlation.
fn next_session_id() -> SessionId {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        AtomicU64::new(nanos)
    });
    counter.fetch_add(1, Ordering::Relaxed)
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = next_session_id();
    let span = info_span!("conn", session_id);
    run_connection(socket, state, session_id).instrument(span).await
}

async fn run_connection(mut socket: WebSocket, state: Arc<AppState>, session_id: SessionId) {
    let mut ctx = match bootstrap_connection(&state, session_id).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    info!("client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

#[derive(Default)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    // Count lag recovery snapshots sent to this client.
    lag_recoveries: u64,
}

struct LogThrottles {
    input_full: Instant,
    invalid_msg: Instant,
    snapshot_lag: Instant,
}

impl LogThrottles {
    fn new() -> Self {
        let past = Instant::now() - LOG_THROTTLE;
        LogThrottles {
            input_full: past,
            invalid_msg: past,
            snapshot_lag: past,
        }
    }
}

struct ConnCtx {
    session_id: SessionId,
    input_tx: mpsc::Sender<GameEvent>,
    snapshot_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    snapshot_latest_rx: watch::Receiver<Utf8Bytes>,
    outbound_rx: broadcast::Receiver<Outbound>,
    world: Arc<World>,
    stats: ConnStats,
    throttles: LogThrottles,
    close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(state: &Arc<AppState>, session_id: SessionId) -> Result<ConnCtx, NetError> {
    // Subscribe to broadcasts *before* any await so no packets are missed.
    let snapshot_bytes_rx = state.snapshot_bytes_tx.subscribe();
    let snapshot_latest_rx = state.snapshot_latest_tx.subscribe();
    let outbound_rx = state.outbound_tx.subscribe();

    // Create the (unnamed) player record. The session only becomes visible
    // to peers once its join is accepted.
    state
        .input_tx
        .send(GameEvent::Connect { session_id })
        .await
        .map_err(|_| NetError::EventsClosed)?;

    Ok(ConnCtx {
        session_id,
        input_tx: state.input_tx.clone(),
        snapshot_bytes_rx,
        snapshot_latest_rx,
        outbound_rx,
        world: Arc::clone(&state.world),
        stats: ConnStats::default(),
        throttles: LogThrottles::new(),
        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let session_id = ctx.session_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        snapshot_bytes_rx,
        snapshot_latest_rx,
        outbound_rx,
        world,
        stats,
        throttles,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming message from client
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    session_id,
                    input_tx,
                    stats,
                    throttles,
                    close_frame,
                ).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing snapshot
            snapshot_msg = snapshot_bytes_rx.recv() => {
                match snapshot_msg {
                    Ok(bytes) => match forward_snapshot_bytes(bytes, socket, stats).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut throttles.snapshot_lag) {
                            warn!(missed = n, "snapshots lagged; sending latest");
                        }

                        // Resync strategy: send the latest snapshot bytes.
                        let latest = snapshot_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            stats.lag_recoveries += 1;
                            match forward_snapshot_bytes(latest, socket, stats).await {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::SnapshotsClosed);
                        true
                    }
                }
            }

            // Outgoing event-style message
            outbound = outbound_rx.recv() => {
                match outbound {
                    Ok(out) => match forward_outbound(out, session_id, world, socket, stats, close_frame).await {
                        Ok(LoopControl::Continue) => false,
                        Ok(LoopControl::Disconnect) => true,
                        Err(e) => {
                            fatal = Some(e);
                            true
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Events are not resyncable; the next snapshot
                        // carries the authoritative state anyway.
                        warn!(missed = n, "outbound events lagged");
                        false
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::EventsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(session_id, input_tx, stats).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal { Err(err) } else { Ok(()) }
}

/// Maps a parsed client message onto a world event. Unknown toy kinds are
/// validation rejections: dropped with a throttled warn, nothing echoed.
fn to_game_event(
    msg: ClientMessage,
    session_id: SessionId,
    invalid_log: &mut Instant,
) -> Option<GameEvent> {
    match msg {
        ClientMessage::Join { name } => Some(GameEvent::Join {
            session_id,
            requested_name: name,
        }),
        ClientMessage::Input(input) => Some(GameEvent::Input {
            session_id,
            input: input.into(),
        }),
        ClientMessage::Chat { text } => Some(GameEvent::Chat { session_id, text }),
        ClientMessage::Equip { kind } => match ToyKind::parse(&kind) {
            Some(kind) => Some(GameEvent::Equip { session_id, kind }),
            None => {
                if should_log(invalid_log) {
                    warn!(session_id, kind = %kind, "unknown toy kind on equip; dropping");
                }
                None
            }
        },
        ClientMessage::ClearEquip => Some(GameEvent::ClearEquip { session_id }),
        ClientMessage::EnterRoom { room_id } => Some(GameEvent::EnterRoom {
            session_id,
            room_id,
        }),
        ClientMessage::EnterSubroom {
            room_id,
            subroom_id,
        } => Some(GameEvent::EnterSubroom {
            session_id,
            room_id,
            subroom_id,
        }),
        ClientMessage::LeaveRoom => Some(GameEvent::LeaveRoom { session_id }),
        ClientMessage::Action(action) => {
            let Some(kind) = ToyKind::parse(&action.kind) else {
                if should_log(invalid_log) {
                    warn!(session_id, kind = %action.kind, "unknown toy kind on action; dropping");
                }
                return None;
            };
            if !action.target.x.is_finite() || !action.target.y.is_finite() {
                if should_log(invalid_log) {
                    warn!(session_id, "non-finite action target; dropping");
                }
                return None;
            }
            Some(GameEvent::Action {
                session_id,
                kind,
                target: Vec2::new(action.target.x, action.target.y),
                correlation_id: action.correlation_id,
            })
        }
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    session_id: SessionId,
    input_tx: &mpsc::Sender<GameEvent>,
    stats: &mut ConnStats,
    throttles: &mut LogThrottles,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        let Some(event) = to_game_event(msg, session_id, &mut throttles.invalid_msg)
                        else {
                            return Ok(LoopControl::Continue);
                        };
                        dispatch_event(event, session_id, input_tx, throttles).await
                    }
                    Err(parse_err) => {
                        stats.invalid_json += 1;
                        if should_log(&mut throttles.invalid_msg) {
                            warn!(
                                session_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if stats.invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            // Liveness probing is the transport's job; axum answers pings.
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(session_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(session_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

/// High-rate events (input, chat) are dropped when the world channel is
/// full; everything else waits for capacity.
async fn dispatch_event(
    event: GameEvent,
    session_id: SessionId,
    input_tx: &mpsc::Sender<GameEvent>,
    throttles: &mut LogThrottles,
) -> Result<LoopControl, NetError> {
    let droppable = matches!(event, GameEvent::Input { .. } | GameEvent::Chat { .. });
    if droppable {
        match input_tx.try_send(event) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(mpsc::error::TrySendError::Full(_)) => {
                if should_log(&mut throttles.input_full) {
                    warn!(session_id, "event channel full; dropping input");
                }
                Ok(LoopControl::Continue)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NetError::EventsClosed),
        }
    } else {
        input_tx
            .send(event)
            .await
            .map(|_| LoopControl::Continue)
            .map_err(|_| NetError::EventsClosed)
    }
}

async fn forward_snapshot_bytes(
    snapshot_msg: Utf8Bytes,
    socket: &mut WebSocket,
    stats: &mut ConnStats,
) -> LoopControl {
    let bytes_len = snapshot_msg.len();
    match socket
        .send(Message::Text(snapshot_msg))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            stats.msgs_out += 1;
            stats.bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send snapshot");
            LoopControl::Disconnect
        }
    }
}

/// Delivers one addressed event to this connection, skipping events meant
/// for other sessions. A kicked event is the last thing a session sees.
async fn forward_outbound(
    out: Outbound,
    session_id: SessionId,
    world: &Arc<World>,
    socket: &mut WebSocket,
    stats: &mut ConnStats,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    if out.to.is_some_and(|to| to != session_id) {
        return Ok(LoopControl::Continue);
    }

    let (msg, disconnect_after) = match out.event {
        SessionEvent::JoinAccepted { name } => (
            ServerMessage::Init(InitDto {
                session_id: session_id.to_string(),
                name,
                world: WorldDto::from(world.as_ref()),
                avatar_radius: MovementTuning::default().avatar_radius,
                toy_kinds: ToyKind::ALL.iter().map(|k| k.as_str()).collect(),
            }),
            false,
        ),
        SessionEvent::RoomChanged {
            room_id,
            subroom_id,
        } => (
            ServerMessage::RoomChanged(SpaceDto {
                room_id,
                subroom_id,
            }),
            false,
        ),
        SessionEvent::Action(action) => (ServerMessage::Action(ActionDto::from(&action)), false),
        SessionEvent::Hit(hit) => (ServerMessage::Hit(HitDto::from(&hit)), false),
        SessionEvent::Kicked { reason } => {
            info!(session_id, reason = %reason, "session kicked");
            (ServerMessage::Kicked { reason }, true)
        }
    };

    let sent = send_message(socket, &msg).await?;
    stats.msgs_out += 1;
    stats.bytes_out += sent as u64;

    if disconnect_after {
        *close_frame = Some(CloseFrame {
            code: close_code::POLICY,
            reason: "kicked".into(),
        });
        Ok(LoopControl::Disconnect)
    } else {
        Ok(LoopControl::Continue)
    }
}

async fn disconnect_cleanup(
    session_id: SessionId,
    input_tx: &mpsc::Sender<GameEvent>,
    stats: &ConnStats,
) -> Result<(), NetError> {
    // Remove the player record so the next tick never broadcasts a ghost.
    input_tx
        .send(GameEvent::Leave { session_id })
        .await
        .map_err(|_| NetError::EventsClosed)?;

    debug!(
        session_id,
        msgs_in = stats.msgs_in,
        msgs_out = stats.msgs_out,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        invalid_json = stats.invalid_json,
        lag_recoveries = stats.lag_recoveries,
        "connection stats"
    );
    info!(session_id, "client disconnected");
    Ok(())
}
