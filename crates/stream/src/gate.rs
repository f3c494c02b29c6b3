//! Render and haptic cadence gates.
//!
//! Raw chunk arrival can be far more frequent than is useful to render. The
//! flush gate caps UI re-renders at one per interval: a flush either happens
//! immediately (last one is old enough) or is deferred by exactly the
//! remaining time — never more than one deferred flush at a time. The haptic
//! gate is the same idea without deferral: pulses outside the window are
//! simply dropped.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Flush now and mark the gate.
    Flush,
    /// Too soon; hold one pending flush for this long.
    Defer(Duration),
}

pub struct FlushGate {
    min_interval: Duration,
    last_flush: Option<Instant>,
}

impl FlushGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_flush: None,
        }
    }

    /// Decide whether new content may render at `now`.
    pub fn check(&self, now: Instant) -> FlushDecision {
        match self.last_flush {
            None => FlushDecision::Flush,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed >= self.min_interval {
                    FlushDecision::Flush
                } else {
                    FlushDecision::Defer(self.min_interval - elapsed)
                }
            }
        }
    }

    /// Record that a flush happened at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_flush = Some(now);
    }
}

pub struct HapticGate {
    min_interval: Duration,
    last_pulse: Option<Instant>,
}

impl HapticGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_pulse: None,
        }
    }

    /// Returns true when a pulse may fire at `now`, marking the gate.
    pub fn try_pulse(&mut self, now: Instant) -> bool {
        let allowed = match self.last_pulse {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if allowed {
            self.last_pulse = Some(now);
        }
        allowed
    }
}
