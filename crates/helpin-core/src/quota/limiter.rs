//! RateLimiter: fixed rolling window per principal.
//!
//! A principal's window opens on its first admitted request and lasts
//! `window` from then. Up to `max` requests are admitted inside it; the rest
//! are refused without touching the counter. Expired windows are dropped
//! lazily on access and by the periodic sweep.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use helpin_types::principal::PrincipalId;
use helpin_types::quota::{QuotaDecision, QuotaSnapshot, QuotaStatus, RateWindowEntry};

use crate::clock::{Clock, SystemClock};
use crate::quota::store::{DashMapRateStore, RateWindowStore};

/// Per-principal admission control for chat requests.
pub struct RateLimiter<S: RateWindowStore = DashMapRateStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    max: u32,
    window: Duration,
}

impl RateLimiter {
    /// In-memory limiter on the system clock.
    pub fn in_memory(max: u32, window_minutes: u32) -> Self {
        Self::new(
            DashMapRateStore::new(),
            SystemClock,
            max,
            Duration::minutes(i64::from(window_minutes)),
        )
    }
}

impl<S: RateWindowStore, C: Clock> RateLimiter<S, C> {
    pub fn new(store: S, clock: C, max: u32, window: Duration) -> Self {
        Self {
            store,
            clock,
            max,
            window,
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn window_minutes(&self) -> u32 {
        u32::try_from(self.window.num_minutes()).unwrap_or(u32::MAX)
    }

    /// Admit or refuse one request for `principal`.
    ///
    /// The check and the increment happen under the store's per-key lock, so
    /// two concurrent callers can never both take the last slot.
    pub fn check_and_consume(&self, principal: &PrincipalId) -> QuotaDecision {
        let now = self.clock.now();
        let max = self.max;
        let window = self.window;
        let window_minutes = self.window_minutes();

        let decision = self.store.with_entry(principal, |slot| {
            if slot.is_some_and(|entry| entry.is_expired(now)) {
                *slot = None;
            }

            match slot {
                None if max == 0 => QuotaDecision {
                    allowed: false,
                    remaining: 0,
                    reset_in_minutes: Some(window_minutes),
                },
                None => {
                    *slot = Some(RateWindowEntry::open(now, window));
                    QuotaDecision {
                        allowed: true,
                        remaining: max - 1,
                        reset_in_minutes: None,
                    }
                }
                Some(entry) if entry.count < max => {
                    entry.count += 1;
                    QuotaDecision {
                        allowed: true,
                        remaining: max - entry.count,
                        reset_in_minutes: None,
                    }
                }
                Some(entry) => QuotaDecision {
                    allowed: false,
                    remaining: 0,
                    reset_in_minutes: Some(entry.reset_in_minutes(now)),
                },
            }
        });

        if decision.allowed {
            debug!(principal = %principal, remaining = decision.remaining, "chat request admitted");
        } else {
            info!(
                principal = %principal,
                reset_in_minutes = decision.reset_in_minutes,
                "chat request throttled"
            );
        }
        decision
    }

    /// Read-only quota report. Never creates or mutates an entry.
    pub fn status(&self, principal: &PrincipalId) -> QuotaStatus {
        let now = self.clock.now();
        match self.store.get(principal).filter(|e| !e.is_expired(now)) {
            Some(entry) => QuotaStatus {
                used: entry.count,
                remaining: self.max.saturating_sub(entry.count),
                max: self.max,
                reset_in_minutes: entry.reset_in_minutes(now),
            },
            None => QuotaStatus {
                used: 0,
                remaining: self.max,
                max: self.max,
                reset_in_minutes: self.window_minutes(),
            },
        }
    }

    /// Snapshot to attach to a response after an admission.
    pub fn snapshot(&self, decision: &QuotaDecision) -> QuotaSnapshot {
        QuotaSnapshot {
            remaining: decision.remaining,
            max: self.max,
        }
    }

    /// Drop every expired window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.store.len())
    }
}

/// Run [`RateLimiter::sweep`] every `interval` until `shutdown` fires.
pub fn spawn_sweeper<S, C>(
    limiter: Arc<RateLimiter<S, C>>,
    interval: StdDuration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: RateWindowStore + 'static,
    C: Clock + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("rate window sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = limiter.sweep();
                    if removed > 0 {
                        debug!(removed, live = limiter.store().len(), "swept expired rate windows");
                    }
                }
            }
        }
    })
}
