//! Failure classification and endpoint cooldown.
//!
//! # Classes (checked in priority order)
//! - RateLimit (429 / "too many requests"): cooldown `min(cap, n * step)`
//! - ServerError (500-599): cooldown `min(cap, n * step)` with shorter defaults
//! - Auth (401/403): fixed cooldown
//! - Unclassified: counters only; the health score degrades the endpoint
//!
//! `n` is the endpoint's consecutive error count after the failure.
//! `error_count` is only used for ranking and never feeds cooldown math.

use std::time::Duration;
use tokio::time::Instant;

use crate::blockchain::types::RpcError;
use crate::config::CooldownConfig;
use crate::endpoint::state::EndpointState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimit,
    ServerError,
    Auth,
    Unclassified,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::RateLimit => "rate_limit",
            FailureClass::ServerError => "server_error",
            FailureClass::Auth => "auth",
            FailureClass::Unclassified => "unclassified",
        }
    }
}

fn classify_status(status: u16) -> Option<FailureClass> {
    match status {
        429 => Some(FailureClass::RateLimit),
        500..=599 => Some(FailureClass::ServerError),
        401 | 403 => Some(FailureClass::Auth),
        _ => None,
    }
}

fn classify_message(message: &str) -> FailureClass {
    let lower = message.to_ascii_lowercase();
    let has_code = |code: &str| {
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == code)
    };

    if has_code("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        FailureClass::RateLimit
    } else if has_server_code(&lower) {
        FailureClass::ServerError
    } else if has_code("401")
        || has_code("403")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
    {
        FailureClass::Auth
    } else {
        FailureClass::Unclassified
    }
}

/// Any standalone three-digit 5xx token.
fn has_server_code(lower: &str) -> bool {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() == 3)
        .filter_map(|token| token.parse::<u16>().ok())
        .any(|code| (500..=599).contains(&code))
}

/// Classify an operation error, status code first, then message text.
pub fn classify(err: &RpcError) -> FailureClass {
    match err {
        RpcError::Timeout(_) | RpcError::Cancelled => FailureClass::Unclassified,
        RpcError::Http { status, message } => {
            classify_status(*status).unwrap_or_else(|| classify_message(message))
        }
        other => classify_message(&other.to_string()),
    }
}

/// Cooldown length for a failure class, if it forces one.
pub fn cooldown_for(class: FailureClass, consecutive_errors: u32, config: &CooldownConfig) -> Option<Duration> {
    let n = u64::from(consecutive_errors);
    let secs = match class {
        FailureClass::RateLimit => n
            .saturating_mul(config.rate_limit_step_secs)
            .min(config.rate_limit_max_secs),
        FailureClass::ServerError => n
            .saturating_mul(config.server_error_step_secs)
            .min(config.server_error_max_secs),
        FailureClass::Auth => config.auth_secs,
        FailureClass::Unclassified => return None,
    };
    // A zero cooldown would not lie in the future.
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Apply a successful attempt.
pub fn record_success(ep: &mut EndpointState) {
    ep.consecutive_errors = 0;
    ep.error_count = (ep.error_count - 0.5).max(0.0);
}

/// Apply a failed attempt. Returns the cooldown placed on the endpoint, if any.
pub fn record_failure(
    ep: &mut EndpointState,
    class: FailureClass,
    config: &CooldownConfig,
    now: Instant,
) -> Option<Duration> {
    ep.error_count += 1.0;
    ep.consecutive_errors = ep.consecutive_errors.saturating_add(1);
    ep.last_error_time = Some(now);

    let cooldown = cooldown_for(class, ep.consecutive_errors, config)?;
    ep.cooldown_until = Some(now + cooldown);

    tracing::warn!(
        url = %ep.url,
        class = class.as_str(),
        cooldown_secs = cooldown.as_secs(),
        consecutive_errors = ep.consecutive_errors,
        "Endpoint has been put into cooldown"
    );
    Some(cooldown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::client::RpcConnection;
    use alloy::transports::TransportErrorKind;

    fn http(status: u16) -> RpcError {
        RpcError::Http { status, message: String::new() }
    }

    fn endpoint() -> EndpointState {
        EndpointState::new(RpcConnection::connect("http://rpc-a.test/".parse().unwrap()))
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(classify(&http(429)), FailureClass::RateLimit);
        assert_eq!(classify(&http(500)), FailureClass::ServerError);
        assert_eq!(classify(&http(503)), FailureClass::ServerError);
        assert_eq!(classify(&http(401)), FailureClass::Auth);
        assert_eq!(classify(&http(403)), FailureClass::Auth);
        assert_eq!(classify(&http(404)), FailureClass::Unclassified);
    }

    #[test]
    fn test_classify_messages() {
        let transport = |m: &str| RpcError::Transport(m.to_string());
        assert_eq!(
            classify(&transport("HTTP error 429 with body: slow down")),
            FailureClass::RateLimit
        );
        assert_eq!(classify(&transport("Too Many Requests")), FailureClass::RateLimit);
        assert_eq!(classify(&transport("HTTP error 502 with body: ")), FailureClass::ServerError);
        assert_eq!(classify(&RpcError::Other("Forbidden".into())), FailureClass::Auth);
        assert_eq!(classify(&transport("connection reset by peer")), FailureClass::Unclassified);
        // Codes embedded in larger numbers do not count.
        assert_eq!(classify(&transport("read 15000 bytes")), FailureClass::Unclassified);
    }

    #[test]
    fn test_classify_alloy_http_errors() {
        let cases = [
            (429, FailureClass::RateLimit),
            (503, FailureClass::ServerError),
            (501, FailureClass::ServerError),
            (520, FailureClass::ServerError),
            (529, FailureClass::ServerError),
            (403, FailureClass::Auth),
            (404, FailureClass::Unclassified),
        ];
        for (status, expected) in cases {
            let err = RpcError::from(TransportErrorKind::http_error(status, String::new()));
            assert_eq!(err.status(), Some(status));
            assert_eq!(classify(&err), expected, "status {}", status);
        }
    }

    #[test]
    fn test_classify_any_5xx_in_message() {
        let transport = |m: &str| RpcError::Transport(m.to_string());
        assert_eq!(classify(&transport("upstream answered 505")), FailureClass::ServerError);
        assert_eq!(classify(&transport("cloudflare 520: origin error")), FailureClass::ServerError);
        assert_eq!(classify(&transport("status 600")), FailureClass::Unclassified);
        assert_eq!(classify(&transport("took 5000 ms")), FailureClass::Unclassified);
    }

    #[test]
    fn test_timeouts_are_unclassified() {
        let err = RpcError::Timeout(Duration::from_millis(500));
        assert_eq!(classify(&err), FailureClass::Unclassified);
        assert_eq!(classify(&RpcError::Cancelled), FailureClass::Unclassified);
    }

    #[test]
    fn test_rate_limit_cooldown_bounded_and_non_decreasing() {
        let config = CooldownConfig::default();
        let mut previous = Duration::ZERO;
        for n in 1..=20 {
            let cooldown = cooldown_for(FailureClass::RateLimit, n, &config).unwrap();
            assert_eq!(cooldown, Duration::from_secs((u64::from(n) * 10).min(60)));
            assert!(cooldown >= previous);
            assert!(cooldown <= Duration::from_secs(60));
            previous = cooldown;
        }
    }

    #[test]
    fn test_other_cooldowns() {
        let config = CooldownConfig::default();
        assert_eq!(cooldown_for(FailureClass::ServerError, 2, &config), Some(Duration::from_secs(10)));
        assert_eq!(cooldown_for(FailureClass::ServerError, 9, &config), Some(Duration::from_secs(30)));
        assert_eq!(cooldown_for(FailureClass::Auth, 1, &config), Some(Duration::from_secs(300)));
        assert_eq!(cooldown_for(FailureClass::Unclassified, 5, &config), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_failure_and_success() {
        let config = CooldownConfig::default();
        let now = Instant::now();
        let mut ep = endpoint();

        let cooldown = record_failure(&mut ep, FailureClass::RateLimit, &config, now);
        assert_eq!(cooldown, Some(Duration::from_secs(10)));
        assert_eq!(ep.cooldown_until, Some(now + Duration::from_secs(10)));
        assert_eq!(ep.error_count, 1.0);
        assert_eq!(ep.consecutive_errors, 1);
        assert_eq!(ep.last_error_time, Some(now));

        assert_eq!(record_failure(&mut ep, FailureClass::Unclassified, &config, now), None);
        assert_eq!(ep.error_count, 2.0);
        assert_eq!(ep.consecutive_errors, 2);

        record_success(&mut ep);
        assert_eq!(ep.consecutive_errors, 0);
        assert_eq!(ep.error_count, 1.5);

        for _ in 0..5 {
            record_success(&mut ep);
        }
        assert_eq!(ep.error_count, 0.0);
    }
}
