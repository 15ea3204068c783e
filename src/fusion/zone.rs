//! Zone Monitor: per-tick targets -> dwell time and alert level.
//!
//! Two states, driven by whether any target of the watched class is inside
//! the danger zone on this tick:
//!
//! | state        | qualifying | next         | entry time         |
//! |--------------|------------|--------------|--------------------|
//! | OutOfZone    | yes        | InZone       | set to now         |
//! | OutOfZone    | no         | OutOfZone    | none               |
//! | InZone       | yes        | InZone       | kept               |
//! | InZone       | no         | OutOfZone    | cleared            |
//!
//! The alert is level-triggered: it stays true on every qualifying tick once
//! the dwell reaches the threshold. Timestamps must be non-decreasing; the
//! monitor does not check this.

use serde::Serialize;

use crate::{Target, PERSON_CLASS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ZoneState {
    #[default]
    OutOfZone,
    InZone,
}

/// State tag plus the entry timestamp of the current episode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ZoneTracking {
    pub state: ZoneState,
    pub entered_at: Option<f64>,
}

impl ZoneTracking {
    /// Pure transition on one tick.
    pub fn transition(self, qualifying: bool, now: f64) -> Self {
        match (self.state, qualifying) {
            (ZoneState::OutOfZone, true) => Self {
                state: ZoneState::InZone,
                entered_at: Some(now),
            },
            (ZoneState::InZone, true) => self,
            (_, false) => Self::default(),
        }
    }

    /// Seconds since entry, 0 when out of zone.
    pub fn dwell(&self, now: f64) -> f64 {
        match (self.state, self.entered_at) {
            (ZoneState::InZone, Some(entered_at)) => now - entered_at,
            _ => 0.0,
        }
    }
}

/// Result of one `update` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ZoneDecision {
    pub alert: bool,
    pub dwell_s: f64,
}

pub struct ZoneMonitor {
    threshold_s: f64,
    watched_class: String,
    tracking: ZoneTracking,
}

impl ZoneMonitor {
    /// Watch for people with the given stay-time threshold.
    pub fn new(threshold_s: f64) -> Self {
        Self::with_class(threshold_s, PERSON_CLASS)
    }

    pub fn with_class(threshold_s: f64, watched_class: impl Into<String>) -> Self {
        Self {
            threshold_s,
            watched_class: watched_class.into(),
            tracking: ZoneTracking::default(),
        }
    }

    pub fn threshold_s(&self) -> f64 {
        self.threshold_s
    }

    pub fn watched_class(&self) -> &str {
        &self.watched_class
    }

    pub fn state(&self) -> ZoneTracking {
        self.tracking
    }

    pub fn reset(&mut self) {
        self.tracking = ZoneTracking::default();
    }

    /// True when some target of the watched class is in the danger zone.
    pub fn is_qualifying(&self, targets: &[Target]) -> bool {
        targets.iter().any(|t| t.qualifies(&self.watched_class))
    }

    pub fn update(&mut self, targets: &[Target], now: f64) -> ZoneDecision {
        let qualifying = self.is_qualifying(targets);
        self.tracking = self.tracking.transition(qualifying, now);
        let dwell_s = self.tracking.dwell(now);
        ZoneDecision {
            alert: self.tracking.state == ZoneState::InZone && dwell_s >= self.threshold_s,
            dwell_s,
        }
    }
}
