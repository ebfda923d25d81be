// Async driver for the world simulation. All mutation happens here, on one
// task: events are drained between ticks and hit resolution runs inside
// event application, so it can never interleave with movement integration.

use crate::domain::World;
use crate::use_cases::WorldSim;
use crate::use_cases::types::{GameEvent, Outbound, Snapshot};

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc};
use tracing::info;

pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    snapshot_tx: broadcast::Sender<Snapshot>,
    outbound_tx: broadcast::Sender<Outbound>,
    world: Arc<World>,
    tick_interval: Duration,
    sweep_interval: Duration,
) {
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let mut sim = WorldSim::new(world, epoch_ms, sweep_interval.as_secs_f64());

    // Drive the fixed-step loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    let dt = tick_interval.as_secs_f32();

    loop {
        interval.tick().await;

        // Drain every pending client event before integrating the tick.
        loop {
            match input_rx.try_recv() {
                Ok(event) => {
                    for out in sim.apply(event) {
                        let _ = outbound_tx.send(out);
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    info!("event channel closed; world task exiting");
                    return;
                }
            }
        }

        let (snapshot, evictions) = sim.step(dt);
        for out in evictions {
            let _ = outbound_tx.send(out);
        }
        // Send errors just mean no subscriber is connected right now.
        let _ = snapshot_tx.send(snapshot);
    }
}
