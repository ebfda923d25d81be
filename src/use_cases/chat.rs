// Chat sanitizing and rate limiting for transient bubbles.

use crate::domain::Player;
use crate::domain::tuning::ChatTuning;

/// Strips control characters, collapses whitespace runs, and caps length.
/// Returns `None` when nothing displayable survives.
pub fn sanitize_chat(text: &str, cfg: &ChatTuning) -> Option<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(cfg.max_len).collect();
    if capped.is_empty() { None } else { Some(capped) }
}

/// Rate-limit check against the sender's last accepted chat. Purely a local
/// state read; the caller records the new timestamp on acceptance.
pub fn within_rate_limit(player: &Player, now: f64, cfg: &ChatTuning) -> bool {
    now - player.last_chat_at >= cfg.min_interval
}
