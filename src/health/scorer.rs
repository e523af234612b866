//! Health-score based endpoint selection.
//!
//! Score = `success_rate * 100 - error_count * 5 - avg_response_time / 50`.
//! Ties resolve to the earliest endpoint in list order.

use tokio::time::Instant;

use crate::endpoint::state::EndpointState;

/// Health score of a single endpoint.
pub fn health_score(ep: &EndpointState) -> f64 {
    ep.success_rate * 100.0 - ep.error_count * 5.0 - ep.avg_response_time / 50.0
}

/// Pick the best endpoint index.
///
/// Endpoints in cooldown are skipped unless every endpoint is cooling down, in
/// which case the one recovering soonest wins.
pub fn select_best(endpoints: &[EndpointState], now: Instant) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, ep) in endpoints.iter().enumerate() {
        if ep.in_cooldown(now) {
            continue;
        }
        let score = health_score(ep);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((idx, score));
        }
    }
    if let Some((idx, _)) = best {
        return Some(idx);
    }

    // Everything is cooling down.
    let mut soonest: Option<(usize, Instant)> = None;
    for (idx, ep) in endpoints.iter().enumerate() {
        if let Some(until) = ep.cooldown_until {
            if soonest.map_or(true, |(_, s)| until < s) {
                soonest = Some((idx, until));
            }
        }
    }
    soonest.map(|(idx, _)| idx)
}
