use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("CAMPUS_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn world_file() -> String {
    env::var("CAMPUS_WORLD_FILE").unwrap_or_else(|_| "world.json".to_string())
}

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const SNAPSHOT_BROADCAST_CAPACITY: usize = 128;
pub const OUTBOUND_BROADCAST_CAPACITY: usize = 256;

// 20 simulation ticks per second.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
// Residual duplicate-name sweep cadence.
pub const NAME_SWEEP_INTERVAL: Duration = Duration::from_secs(15);
