//! Fixed-window request throttling keyed by the direct peer address.
//!
//! Forwarded-for headers are never consulted: behind a reverse proxy every
//! client shares the proxy's budget until trusted-proxy support is added.

use crate::config::{MAX_WINDOW_SECS, RateLimitConfig};
use axum::{
    Json,
    extract::{ConnectInfo, Request, State, rejection::ExtensionRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Time source for window bookkeeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used by tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    window_reset_at: Instant,
    count: u32,
}

pub struct RateGate {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    limit: u32,
    window: Duration,
    max_entries: usize,
    exempt_path_fragments: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("max_entries", &self.max_entries)
            .field("tracked", &self.len())
            .finish()
    }
}

impl RateGate {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limit: config.requests_per_window,
            window: Duration::from_secs(config.window_secs.min(MAX_WINDOW_SECS)),
            max_entries: config.max_entries.max(1),
            exempt_path_fragments: config.exempt_path_fragments.clone(),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a request from `key` and report whether it fits in the current window.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        let fresh = RateLimitEntry {
            window_reset_at: now + self.window,
            count: 1,
        };
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(key) {
            if now >= entry.window_reset_at {
                *entry = fresh;
                return true;
            }
            if entry.count >= self.limit {
                return false;
            }
            entry.count += 1;
            return true;
        }

        if entries.len() >= self.max_entries {
            Self::make_room(&mut entries, now);
        }
        entries.insert(key.to_string(), fresh);
        true
    }

    /// Drop expired windows; if none expired, evict the window closest to resetting.
    fn make_room(entries: &mut HashMap<String, RateLimitEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, e| e.window_reset_at > now);
        if entries.len() < before {
            return;
        }
        let victim = entries
            .iter()
            .min_by_key(|(_, e)| e.window_reset_at)
            .map(|(k, _)| k.clone());
        if let Some(victim) = victim {
            entries.remove(&victim);
        }
    }

    /// Time until `key` may send again, if it is currently over its limit.
    pub fn retry_after(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.lock();
        entries
            .get(key)
            .filter(|e| e.count >= self.limit && now < e.window_reset_at)
            .map(|e| e.window_reset_at - now)
    }

    /// Remove every entry whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.window_reset_at > now);
        before - entries.len()
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_path_fragments
            .iter()
            .any(|fragment| !fragment.is_empty() && path.contains(fragment.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Periodically purge elapsed windows so idle sources do not pin memory.
pub fn spawn_sweeper(gate: Arc<RateGate>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = gate.sweep();
            if removed > 0 {
                tracing::debug!(removed, remaining = gate.len(), "swept rate limit table");
            }
        }
    })
}

/// Axum middleware enforcing the [`RateGate`].
pub async fn rate_gate(
    State(gate): State<Arc<RateGate>>,
    peer: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    request: Request,
    next: Next,
) -> Response {
    if gate.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let key = peer.map(|ConnectInfo(addr)| addr.ip().to_string()).unwrap_or_else(|_| {
        tracing::debug!("no peer address on request; using shared rate limit bucket");
        "unknown".to_string()
    });

    if gate.allow(&key) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key, path = %request.uri().path(), "rate limit exceeded");
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "rate_limited" })),
    )
        .into_response();
    if let Some(wait) = gate.retry_after(&key) {
        let secs = wait.as_secs().max(1);
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(limit: u32, window_secs: u64, max_entries: usize) -> (RateGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = RateLimitConfig {
            requests_per_window: limit,
            window_secs,
            max_entries,
            ..RateLimitConfig::default()
        };
        (RateGate::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn allows_exactly_limit_requests_per_window() {
        let (gate, clock) = gate(3, 60, 100);
        assert!(gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.1"));
        assert!(!gate.allow("10.0.0.1"));
        clock.advance(Duration::from_secs(59));
        assert!(!gate.allow("10.0.0.1"));
        clock.advance(Duration::from_secs(1));
        assert!(gate.allow("10.0.0.1"));
        // counter restarted at 1: two more fit
        assert!(gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.1"));
        assert!(!gate.allow("10.0.0.1"));
    }

    #[test]
    fn sources_are_tracked_independently() {
        let (gate, _clock) = gate(1, 60, 100);
        assert!(gate.allow("a"));
        assert!(!gate.allow("a"));
        assert!(gate.allow("b"));
    }

    #[test]
    fn retry_after_reports_remaining_window() {
        let (gate, clock) = gate(1, 60, 100);
        assert!(gate.allow("a"));
        assert_eq!(gate.retry_after("a"), Some(Duration::from_secs(60)));
        clock.advance(Duration::from_secs(45));
        assert_eq!(gate.retry_after("a"), Some(Duration::from_secs(15)));
        assert_eq!(gate.retry_after("b"), None);
    }

    #[test]
    fn sweep_removes_only_elapsed_windows() {
        let (gate, clock) = gate(5, 10, 100);
        gate.allow("old");
        clock.advance(Duration::from_secs(5));
        gate.allow("new");
        clock.advance(Duration::from_secs(5));
        assert_eq!(gate.sweep(), 1);
        assert_eq!(gate.len(), 1);
    }

    #[test]
    fn table_never_exceeds_capacity() {
        let (gate, clock) = gate(5, 10, 2);
        gate.allow("a");
        clock.advance(Duration::from_secs(1));
        gate.allow("b");
        gate.allow("c");
        assert_eq!(gate.len(), 2);
        // "a" had the earliest reset and was evicted, so it starts over
        assert!(gate.allow("a"));
        assert_eq!(gate.len(), 2);
    }

    #[test]
    fn oversized_window_is_clamped() {
        let (gate, _clock) = gate(1, u64::MAX, 10);
        assert!(gate.allow("a"));
        assert!(!gate.allow("a"));
        let wait = gate.retry_after("a").unwrap();
        assert_eq!(wait, Duration::from_secs(MAX_WINDOW_SECS));
    }

    #[test]
    fn streaming_paths_are_exempt() {
        let (gate, _clock) = gate(1, 60, 10);
        assert!(gate.is_exempt("/v1/topics/abc/stream"));
        assert!(!gate.is_exempt("/v1/topics/abc"));
    }
}
