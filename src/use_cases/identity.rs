// Display-name policy: sanitizing, uniqueness, and duplicate eviction.

use crate::domain::{Player, SessionId};
use std::collections::HashMap;

pub const MAX_NAME_LEN: usize = 16;
pub const DEFAULT_NAME: &str = "Visitor";

/// Strips a requested name to the allow-listed charset and caps its length.
/// Returns the fallback name when nothing survives.
pub fn sanitize_name(requested: &str) -> String {
    let kept: String = requested
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '.'))
        .collect();
    let trimmed: String = kept.trim().chars().take(MAX_NAME_LEN).collect();
    let trimmed = trimmed.trim().to_string();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed
    }
}

/// Uniqueness key: case-insensitive with whitespace runs collapsed.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Result of a name claim.
#[derive(Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claimer owns the name; any listed sessions lost it and must go.
    Accepted { evicted: Vec<SessionId> },
    /// An earlier-connected session holds the name; the claimer must go.
    Rejected,
}

/// Resolves a name claim among the claimer and every current holder of the
/// same normalized name. The earliest-connected session wins; everyone else
/// is evicted.
pub fn claim_name(
    players: &HashMap<SessionId, Player>,
    claimer: SessionId,
    sanitized: &str,
) -> ClaimOutcome {
    let Some(claimant) = players.get(&claimer) else {
        return ClaimOutcome::Rejected;
    };
    let key = normalize_name(sanitized);

    let mut holders: Vec<&Player> = players
        .values()
        .filter(|p| p.id != claimer)
        .filter(|p| p.name.as_deref().is_some_and(|n| normalize_name(n) == key))
        .collect();

    let claimer_wins = holders
        .iter()
        .all(|holder| earlier(claimant, holder) == claimant.id);

    if claimer_wins {
        holders.sort_by(|a, b| a.connected_at.total_cmp(&b.connected_at));
        ClaimOutcome::Accepted {
            evicted: holders.iter().map(|p| p.id).collect(),
        }
    } else {
        ClaimOutcome::Rejected
    }
}

/// Residual-duplicate sweep: for every normalized name held by more than one
/// session, keep the earliest-connected holder and return the rest.
pub fn duplicate_sweep(players: &HashMap<SessionId, Player>) -> Vec<SessionId> {
    let mut by_name: HashMap<String, Vec<&Player>> = HashMap::new();
    for player in players.values() {
        if let Some(name) = &player.name {
            by_name.entry(normalize_name(name)).or_default().push(player);
        }
    }

    let mut evicted = Vec::new();
    for (_, mut holders) in by_name {
        if holders.len() < 2 {
            continue;
        }
        holders.sort_by(|a, b| {
            a.connected_at
                .total_cmp(&b.connected_at)
                .then(a.id.cmp(&b.id))
        });
        evicted.extend(holders[1..].iter().map(|p| p.id));
    }
    evicted.sort_unstable();
    evicted
}

// Session-id tiebreak keeps near-simultaneous connects deterministic.
fn earlier(a: &Player, b: &Player) -> SessionId {
    match a.connected_at.total_cmp(&b.connected_at) {
        std::cmp::Ordering::Less => a.id,
        std::cmp::Ordering::Greater => b.id,
        std::cmp::Ordering::Equal => a.id.min(b.id),
    }
}
