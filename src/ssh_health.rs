//! Connection-health caching for remote backends reached over a
//! long-lived connection, e.g. an SSH control master (spec §4.11).
//! Checking liveness via a subprocess on every operation is
//! prohibitively slow, so the result is cached and only re-verified
//! once an interval elapses.
//!
//! No SFTP `PathImpl` is implemented on top of this — see `DESIGN.md`
//! Open Questions — this module is the caching primitive alone, usable
//! by any future remote backend and exercised here with a fake probe.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct State {
    last_control_master_check: Option<Instant>,
    cached_status: bool,
}

/// `control_master_check_interval` rate-limits the expensive liveness
/// probe itself (spec: "Rate-limit invariant: within one interval, at
/// most one live-check occurs per connection"). `health_check_interval`
/// is the separate, read-only trust window other code can consult
/// without forcing a probe (spec: "the connection manager's health
/// check trusts the connection's cached flag inside the health-check
/// interval").
pub struct ConnectionHealth {
    control_master_check_interval: Duration,
    health_check_interval: Duration,
    state: Mutex<State>,
}

impl ConnectionHealth {
    pub fn new(control_master_check_interval: Duration, health_check_interval: Duration) -> Self {
        Self {
            control_master_check_interval,
            health_check_interval,
            state: Mutex::new(State { last_control_master_check: None, cached_status: false }),
        }
    }

    /// Returns the cached status if the control-master check interval
    /// has not elapsed since the last probe; otherwise re-verifies via
    /// `probe` (spec: "is_connected() returns the cached status if the
    /// interval has not elapsed; otherwise re-verifies").
    pub fn is_connected(&self, probe: impl FnOnce() -> bool) -> bool {
        let mut state = self.state.lock().unwrap();
        let due = match state.last_control_master_check {
            Some(last) => last.elapsed() >= self.control_master_check_interval,
            None => true,
        };
        if due {
            state.cached_status = probe();
            state.last_control_master_check = Some(Instant::now());
        }
        state.cached_status
    }

    /// `true` if a successful check happened within `health_check_interval`,
    /// without forcing a new probe. Intended for callers deciding whether
    /// to even attempt a network operation (spec §5 "Timeouts": "network
    /// operations inherit SSH/S3 health-check behavior").
    pub fn trusted_within_health_window(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.cached_status
            && state.last_control_master_check.is_some_and(|last| last.elapsed() < self.health_check_interval)
    }

    /// Invalidates the cached status so the next [`Self::is_connected`]
    /// call is forced to re-verify regardless of the interval (spec:
    /// "On any operation error, the status is invalidated and a fresh
    /// check is forced before reconnect").
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap();
        state.cached_status = false;
        state.last_control_master_check = None;
    }
}
