//! Rolling message quota types.
//!
//! Each principal gets a fixed window anchored to its first admitted request.
//! The window does not slide: once `reset_at` passes the entry is logically
//! gone and the next request opens a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of chat requests admitted per window.
pub const DEFAULT_MAX_PER_WINDOW: u32 = 20;

/// Default window length, in minutes.
pub const DEFAULT_WINDOW_MINUTES: u32 = 60;

/// Per-principal counter for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowEntry {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateWindowEntry {
    /// Start a window containing one admission.
    pub fn open(now: DateTime<Utc>, window: chrono::Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    /// An entry stays live up to and including `reset_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }

    /// Whole minutes until the window resets, rounded up.
    pub fn reset_in_minutes(&self, now: DateTime<Utc>) -> u32 {
        let Ok(ms) = u64::try_from((self.reset_at - now).num_milliseconds()) else {
            return 0;
        };
        u32::try_from(ms.div_ceil(60_000)).unwrap_or(u32::MAX)
    }
}

/// Answer to "may this request proceed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Set only when the request was refused.
    pub reset_in_minutes: Option<u32>,
}

/// Read-only quota report for a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub used: u32,
    pub remaining: u32,
    pub max: u32,
    pub reset_in_minutes: u32,
}

/// Quota metadata attached to a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub remaining: u32,
    pub max: u32,
}
