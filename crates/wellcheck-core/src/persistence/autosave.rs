//! Auto-save bookkeeping.
//!
//! There is no timer thread. The owner calls `tick(now)` periodically and
//! forwards lifecycle notifications; [`AutoSave`] decides whether a save is
//! due. Passing `now` explicitly lets tests drive virtual time.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::quiz::StageProgress;

/// Default interval between periodic checks.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: i64 = 10;

/// Host lifecycle notifications that force an immediate save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Page or window hidden.
    PageHide,
    /// Process or page about to exit.
    BeforeUnload,
}

#[derive(Debug, Clone)]
pub struct AutoSave {
    enabled: bool,
    interval: Duration,
    last_attempt: Option<DateTime<Utc>>,
    /// Stage map as of the last successful save.
    saved_progress: Option<BTreeMap<String, StageProgress>>,
}

impl AutoSave {
    pub fn new(interval: Duration) -> Self {
        Self {
            enabled: true,
            interval,
            last_attempt: None,
            saved_progress: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The periodic interval has elapsed since the last attempt.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_attempt {
            Some(last) => now - last >= self.interval,
            None => true,
        }
    }

    /// The stage map differs from the last successfully saved one.
    pub fn has_changes(&self, progress: &BTreeMap<String, StageProgress>) -> bool {
        self.saved_progress.as_ref() != Some(progress)
    }

    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.last_attempt = Some(now);
    }

    pub fn record_success(&mut self, progress: &BTreeMap<String, StageProgress>, now: DateTime<Utc>) {
        self.last_attempt = Some(now);
        self.saved_progress = Some(progress.clone());
    }

    /// Forget the saved baseline so the next tick saves unconditionally.
    pub fn invalidate(&mut self) {
        self.saved_progress = None;
    }
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_AUTOSAVE_INTERVAL_SECS))
    }
}
