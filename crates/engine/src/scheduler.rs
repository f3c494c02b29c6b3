//! Timer-driven auto triggers.
//!
//! Two timer classes, both cooperative: a one-shot first-visit timer (armed
//! once per sport, only when game data is non-empty) and a recurring
//! re-trigger timer. Handles are stored and always aborted before a new one
//! is spawned, so repeated sport switches can never accumulate duplicate
//! timers. Timers hold a `Weak` controller reference and read live game data
//! at fire time, never a value captured at schedule time.

use std::collections::{HashMap, HashSet};
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use cs_domain::config::SuggestionConfig;
use cs_domain::game::Sport;
use cs_domain::trace::TraceEvent;

use crate::controller::SuggestionController;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-sport bookkeeping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
pub struct TriggerRecord {
    visited: HashSet<Sport>,
    last_triggered_at: HashMap<Sport, DateTime<Utc>>,
}

impl TriggerRecord {
    /// Marks the sport as seen. True only the first time; a sport enters the
    /// visited set at most once per process.
    pub fn mark_visited(&mut self, sport: Sport) -> bool {
        self.visited.insert(sport)
    }

    pub fn is_visited(&self, sport: Sport) -> bool {
        self.visited.contains(&sport)
    }

    /// Updated on successful fetches only, never on attempts.
    pub fn record_success(&mut self, sport: Sport, at: DateTime<Utc>) {
        self.last_triggered_at.insert(sport, at);
    }

    pub fn last_success(&self, sport: Sport) -> Option<DateTime<Utc>> {
        self.last_triggered_at.get(&sport).copied()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AutoTriggerScheduler {
    cfg: SuggestionConfig,
    record: Mutex<TriggerRecord>,
    armed_sport: Mutex<Option<Sport>>,
    first_visit: Mutex<Option<JoinHandle<()>>>,
    retrigger: Mutex<Option<JoinHandle<()>>>,
}

impl AutoTriggerScheduler {
    pub fn new(cfg: SuggestionConfig) -> Self {
        Self {
            cfg,
            record: Mutex::new(TriggerRecord::default()),
            armed_sport: Mutex::new(None),
            first_visit: Mutex::new(None),
            retrigger: Mutex::new(None),
        }
    }

    /// Called whenever the visible sport or its game data changes.
    ///
    /// Arms the recurring re-trigger for a newly visible sport and, on the
    /// first sighting of a sport with games, the one-shot first-visit timer.
    pub fn on_context(&self, sport: Sport, has_games: bool, target: Weak<SuggestionController>) {
        {
            let mut armed = self.armed_sport.lock();
            if *armed != Some(sport) {
                *armed = Some(sport);
                abort_slot(&self.first_visit);
                abort_slot(&self.retrigger);

                let interval = Duration::from_millis(self.cfg.retrigger_interval_ms);
                TraceEvent::TriggerArmed {
                    sport: sport.to_string(),
                    kind: "retrigger".into(),
                    delay_ms: interval.as_millis() as u64,
                }
                .emit();

                let t = target.clone();
                *self.retrigger.lock() = Some(tokio::spawn(async move {
                    let mut tick = time::interval_at(Instant::now() + interval, interval);
                    loop {
                        tick.tick().await;
                        let Some(controller) = t.upgrade() else { break };
                        controller.trigger_from_timer(sport).await;
                    }
                }));
            }
        }

        if has_games && self.record.lock().mark_visited(sport) {
            abort_slot(&self.first_visit);

            let delay = Duration::from_millis(self.cfg.first_visit_delay_ms);
            TraceEvent::TriggerArmed {
                sport: sport.to_string(),
                kind: "first_visit".into(),
                delay_ms: delay.as_millis() as u64,
            }
            .emit();

            *self.first_visit.lock() = Some(tokio::spawn(async move {
                time::sleep(delay).await;
                if let Some(controller) = target.upgrade() {
                    controller.trigger_from_timer(sport).await;
                }
            }));
        }
    }

    /// Cancel both timers. Called on page/sport unmount and teardown.
    pub fn disarm(&self) {
        *self.armed_sport.lock() = None;
        abort_slot(&self.first_visit);
        abort_slot(&self.retrigger);
    }

    pub fn record_success(&self, sport: Sport) {
        self.record.lock().record_success(sport, Utc::now());
    }

    pub fn is_visited(&self, sport: Sport) -> bool {
        self.record.lock().is_visited(sport)
    }

    pub fn last_success(&self, sport: Sport) -> Option<DateTime<Utc>> {
        self.record.lock().last_success(sport)
    }
}

fn abort_slot(slot: &Mutex<Option<JoinHandle<()>>>) {
    if let Some(handle) = slot.lock().take() {
        handle.abort();
    }
}

impl Drop for AutoTriggerScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}
