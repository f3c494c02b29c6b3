//! The suggestion lifecycle controller.
//!
//! Owns the single bubble session: phase transitions, mode switches, dismiss
//! timers, and the guard flag that keeps at most one suggestion fetch in
//! flight. Every fetch failure is converted at this boundary into fallback
//! bubble text with a short auto-dismiss; nothing here is fatal and nothing
//! is retried automatically.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use cs_assistant::{PagePayload, SuggestionBackend, SuggestionResult};
use cs_domain::config::SuggestionConfig;
use cs_domain::game::{Game, Sport};
use cs_domain::trace::TraceEvent;

use crate::context::{PageContextTracker, PageKind};
use crate::scheduler::AutoTriggerScheduler;
use crate::session::{BubbleMode, BubblePhase, BubbleState};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bubble copy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const WELCOME_TEXT: &str = "Hey! Want me to scan this page for an edge?";
pub const FETCH_FALLBACK: &str = "Couldn't pull an insight right now. Try again in a bit.";
pub const NO_GAMES_FALLBACK: &str = "No games on the board yet. Check back soon.";
pub const NO_GAME_FALLBACK: &str = "Open a game and I'll break it down.";
pub const NO_PICKS_FALLBACK: &str = "No picks to look at yet.";
pub const NO_ALERTS_FALLBACK: &str = "No value or fade alerts right now.";
pub const NO_LIVE_FALLBACK: &str = "Nothing live at the moment.";
pub const MODEL_DETAILS_TEXT: &str = "Ask me anything about how the model grades its picks.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Controller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SuggestionController {
    cfg: SuggestionConfig,
    backend: Arc<dyn SuggestionBackend>,
    context: Arc<PageContextTracker>,
    scheduler: AutoTriggerScheduler,

    state: Mutex<BubbleState>,
    state_tx: watch::Sender<BubbleState>,

    /// Only one suggestion fetch may be outstanding; a second attempt while
    /// one is in flight is dropped, never queued.
    fetching: AtomicBool,
    enabled: AtomicBool,

    /// Bumped on every bubble transition. A dismiss timer captures the
    /// generation it was armed for and is ignored once it goes stale, so an
    /// old timer can never dismiss a newer bubble.
    generation: AtomicU64,
    dismiss_timer: Mutex<Option<JoinHandle<()>>>,

    weak_self: Weak<SuggestionController>,
}

impl SuggestionController {
    pub fn new(
        cfg: SuggestionConfig,
        backend: Arc<dyn SuggestionBackend>,
        context: Arc<PageContextTracker>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(BubbleState::hidden());
        Arc::new_cyclic(|weak| Self {
            scheduler: AutoTriggerScheduler::new(cfg.clone()),
            enabled: AtomicBool::new(cfg.enabled),
            cfg,
            backend,
            context,
            state: Mutex::new(BubbleState::hidden()),
            state_tx,
            fetching: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            dismiss_timer: Mutex::new(None),
            weak_self: weak.clone(),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<BubbleState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> BubbleState {
        self.state.lock().clone()
    }

    pub fn context(&self) -> &PageContextTracker {
        &self.context
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.reset("disabled");
        }
    }

    // ── Triggers & scans ──────────────────────────────────────────

    /// Begin a proactive fetch for `sport`. No-op unless suggestions are
    /// enabled, chat is closed, games are present, no bubble is visible, and
    /// no fetch is in flight.
    pub async fn trigger(&self, sport: Sport, games: Vec<Game>) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        if self.context.snapshot().chat_open {
            tracing::debug!(%sport, "trigger suppressed: chat page open");
            return;
        }
        if games.is_empty() {
            tracing::debug!(%sport, "trigger skipped: no game data");
            return;
        }
        if self.state.lock().is_visible() {
            tracing::debug!(%sport, "trigger skipped: bubble already visible");
            return;
        }
        if !self.begin_fetch() {
            tracing::debug!(%sport, "trigger dropped: fetch already in flight");
            return;
        }

        let result = self
            .backend
            .fetch_page_suggestion(&PagePayload::Feed { games, sport })
            .await;
        self.finish_fetch(result, Some(sport), FETCH_FALLBACK);
    }

    /// Timer entry point: reads whatever game data is current right now.
    pub(crate) async fn trigger_from_timer(&self, sport: Sport) {
        let games = self.context.snapshot().games;
        self.trigger(sport, games).await;
    }

    /// On-demand scan of the current page. Dispatches to a page-specific
    /// fetch path; every path lands in `ShowingSuggestion`.
    pub async fn scan_current_page(&self) {
        let snap = self.context.snapshot();
        if snap.chat_open {
            tracing::debug!("scan suppressed: chat page open");
            return;
        }
        if !self.begin_fetch() {
            tracing::debug!("scan dropped: fetch already in flight");
            return;
        }
        self.set_scanning();

        match snap.page {
            PageKind::Feed => match snap.sport {
                Some(sport) if !snap.games.is_empty() => {
                    let payload = PagePayload::Feed {
                        games: snap.games,
                        sport,
                    };
                    let result = self.backend.fetch_page_suggestion(&payload).await;
                    self.finish_fetch(result, Some(sport), FETCH_FALLBACK);
                }
                _ => self.finish_no_data(NO_GAMES_FALLBACK, snap.sport),
            },
            PageKind::GameDetails => match (&snap.open_game, snap.sport) {
                (Some(game), Some(sport)) => {
                    let result = self
                        .backend
                        .fetch_game_insight(game, sport, &snap.previous_insights)
                        .await;
                    self.finish_fetch(result, Some(sport), FETCH_FALLBACK);
                }
                _ => self.finish_no_data(NO_GAME_FALLBACK, snap.sport),
            },
            PageKind::Picks => {
                if snap.picks.is_empty() {
                    self.finish_no_data(NO_PICKS_FALLBACK, snap.sport);
                } else {
                    let payload = PagePayload::Picks { picks: snap.picks };
                    let result = self.backend.fetch_page_suggestion(&payload).await;
                    self.finish_fetch(result, snap.sport, FETCH_FALLBACK);
                }
            }
            PageKind::Outliers => {
                let payload = PagePayload::Outliers {
                    value_alerts: snap.value_alerts,
                    fade_alerts: snap.fade_alerts,
                };
                if payload.is_empty() {
                    self.finish_no_data(NO_ALERTS_FALLBACK, snap.sport);
                } else {
                    let result = self.backend.fetch_page_suggestion(&payload).await;
                    self.finish_fetch(result, snap.sport, FETCH_FALLBACK);
                }
            }
            PageKind::Scoreboard => {
                if snap.live_games.is_empty() {
                    self.finish_no_data(NO_LIVE_FALLBACK, snap.sport);
                } else {
                    let payload = PagePayload::Scoreboard {
                        live_games: snap.live_games,
                    };
                    let result = self.backend.fetch_page_suggestion(&payload).await;
                    self.finish_fetch(result, snap.sport, FETCH_FALLBACK);
                }
            }
            PageKind::ModelDetails => self.finish_no_data(MODEL_DETAILS_TEXT, snap.sport),
        }
    }

    /// Re-fetch the current insight with the shown text added to the
    /// repetition history. Valid only with an open game or on the outliers
    /// page; otherwise a logged no-op.
    pub async fn request_more_details(&self) {
        self.refetch_with_history("more_details").await;
    }

    pub async fn request_another_insight(&self) {
        self.refetch_with_history("another_insight").await;
    }

    async fn refetch_with_history(&self, what: &str) {
        let snap = self.context.snapshot();
        let game_context = snap.open_game.is_some() && snap.sport.is_some();
        let outliers_context = snap.page == PageKind::Outliers;
        if !game_context && !outliers_context {
            tracing::debug!(request = what, "ignored outside a game or outliers context");
            return;
        }
        if !self.begin_fetch() {
            tracing::debug!(request = what, "dropped: fetch already in flight");
            return;
        }

        let shown = self.state.lock().text.clone();
        self.context.push_insight(shown);
        self.set_scanning();

        let snap = self.context.snapshot();
        let result = match (&snap.open_game, snap.sport) {
            (Some(game), Some(sport)) => {
                self.backend
                    .fetch_game_insight(game, sport, &snap.previous_insights)
                    .await
            }
            _ => {
                let payload = PagePayload::Outliers {
                    value_alerts: snap.value_alerts,
                    fade_alerts: snap.fade_alerts,
                };
                self.backend.fetch_page_suggestion(&payload).await
            }
        };
        self.finish_fetch(result, snap.sport, FETCH_FALLBACK);
    }

    // ── Dismiss & menu ────────────────────────────────────────────

    /// Idempotent; cancels any pending dismiss timer and hides the bubble.
    pub fn dismiss(&self) {
        self.hide("manual", false);
    }

    fn auto_dismiss(&self, generation: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        self.hide("auto", false);
    }

    /// Show the action menu. When floating, the menu and the bubble are
    /// mutually exclusive surfaces, so this dismisses the floating bubble
    /// instead.
    pub fn open_menu(&self) {
        if self.state.lock().is_floating() {
            self.dismiss_floating();
            return;
        }
        self.bump_generation();
        self.cancel_dismiss_timer();
        let state = {
            let mut st = self.state.lock();
            st.phase = BubblePhase::ShowingMenu;
            st.expires_at = None;
            st.clone()
        };
        let _ = self.state_tx.send(state);
    }

    // ── Mode switches ─────────────────────────────────────────────

    /// Switch to floating mode. Floating sessions never auto-expire. With no
    /// content yet, the bubble shows the generic welcome text.
    pub fn detach(&self, position: Option<(f64, f64)>) {
        self.bump_generation();
        self.cancel_dismiss_timer();
        let state = {
            let mut st = self.state.lock();
            st.mode = BubbleMode::Floating;
            st.position = position.or(st.position);
            st.expires_at = None;
            if matches!(st.phase, BubblePhase::Hidden | BubblePhase::ShowingMenu) {
                st.phase = BubblePhase::ShowingSuggestion;
                st.text = WELCOME_TEXT.to_owned();
                st.source_game_id = None;
            }
            st.clone()
        };
        let _ = self.state_tx.send(state);
    }

    /// Detach from an anchored surface. With a game and sport supplied this
    /// goes straight to a single-game fetch; the welcome text never shows.
    pub async fn detach_from_anchor(
        &self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        game: Option<Game>,
        sport: Option<Sport>,
    ) {
        let position = Some((x + w / 2.0, y + h / 2.0));
        let (game, sport) = match (game, sport) {
            (Some(game), Some(sport)) => (game, sport),
            _ => {
                self.detach(position);
                return;
            }
        };

        self.bump_generation();
        self.cancel_dismiss_timer();
        let state = {
            let mut st = self.state.lock();
            st.mode = BubbleMode::Floating;
            st.position = position;
            st.phase = BubblePhase::Scanning;
            st.sport = Some(sport);
            st.expires_at = None;
            st.clone()
        };
        let _ = self.state_tx.send(state);
        self.context.set_open_game(Some(game.clone()));

        if !self.begin_fetch() {
            // The in-flight fetch will land and replace Scanning.
            return;
        }
        let snap = self.context.snapshot();
        let result = self
            .backend
            .fetch_game_insight(&game, sport, &snap.previous_insights)
            .await;
        self.finish_fetch(result, Some(sport), FETCH_FALLBACK);
    }

    /// Leave floating mode and drop floating-only context.
    pub fn dismiss_floating(&self) {
        self.context.clear_floating_context();
        self.hide("floating_dismissed", true);
    }

    // ── Context events ────────────────────────────────────────────

    pub fn on_page_change(&self, page: PageKind) {
        self.context.set_page(page);
        self.respawn_floating_scan();
    }

    pub fn on_sport_change(&self, sport: Sport) {
        self.context.set_sport(sport);
        let has_games = !self.context.snapshot().games.is_empty();
        self.scheduler
            .on_context(sport, has_games, self.weak_self.clone());
        self.respawn_floating_scan();
    }

    pub fn on_game_sheet_open(&self, game: Game) {
        self.context.set_open_game(Some(game));
        self.context.set_page(PageKind::GameDetails);
        self.respawn_floating_scan();
    }

    pub fn on_chat_focus(&self, open: bool) {
        self.context.set_chat_open(open);
        if open {
            self.reset("chat_focus");
        }
    }

    /// Game data pushed by the feed screen. Re-arms the scheduler so a sport
    /// whose data arrived late still gets its first-visit trigger.
    pub fn set_games(&self, games: Vec<Game>) {
        let has_games = !games.is_empty();
        self.context.set_games(games);
        if let Some(sport) = self.context.snapshot().sport {
            self.scheduler
                .on_context(sport, has_games, self.weak_self.clone());
        }
    }

    pub fn teardown(&self) {
        self.scheduler.disarm();
        self.reset("teardown");
    }

    // ── Internals ─────────────────────────────────────────────────

    fn begin_fetch(&self) -> bool {
        self.fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// A fetch can outlive its welcome: the user may open the chat page or
    /// disable suggestions while it is in flight. A late result is dropped,
    /// never shown.
    fn result_unwanted(&self) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            tracing::debug!("suggestion result dropped: suggestions disabled mid-fetch");
            return true;
        }
        if self.context.snapshot().chat_open {
            tracing::debug!("suggestion result dropped: chat page opened mid-fetch");
            return true;
        }
        false
    }

    fn finish_fetch(&self, result: SuggestionResult, sport: Option<Sport>, fallback: &str) {
        if self.result_unwanted() {
            self.fetching.store(false, Ordering::Release);
            return;
        }
        if result.success && !result.suggestion.is_empty() {
            if let Some(sport) = sport {
                self.scheduler.record_success(sport);
            }
            self.show_suggestion(result.suggestion, result.game_id, sport, false);
        } else {
            self.show_suggestion(fallback.to_owned(), None, sport, true);
        }
        self.fetching.store(false, Ordering::Release);
    }

    fn finish_no_data(&self, text: &str, sport: Option<Sport>) {
        if self.result_unwanted() {
            self.fetching.store(false, Ordering::Release);
            return;
        }
        self.show_suggestion(text.to_owned(), None, sport, true);
        self.fetching.store(false, Ordering::Release);
    }

    fn show_suggestion(
        &self,
        text: String,
        game_id: Option<String>,
        sport: Option<Sport>,
        fallback: bool,
    ) {
        let generation = self.bump_generation();
        self.cancel_dismiss_timer();
        let show_ms = if fallback {
            self.cfg.fallback_show_ms
        } else {
            self.cfg.show_ms
        };

        let state = {
            let mut st = self.state.lock();
            st.phase = BubblePhase::ShowingSuggestion;
            st.text = text;
            st.source_game_id = game_id;
            if sport.is_some() {
                st.sport = sport;
            }
            st.created_at = Utc::now();
            st.expires_at = match st.mode {
                BubbleMode::Floating => None,
                BubbleMode::Anchored => {
                    Some(st.created_at + chrono::Duration::milliseconds(show_ms as i64))
                }
            };
            st.clone()
        };

        TraceEvent::SuggestionShown {
            sport: state.sport.map(|s| s.to_string()),
            source_game_id: state.source_game_id.clone(),
            fallback,
        }
        .emit();
        let mode = state.mode;
        let _ = self.state_tx.send(state);

        if mode == BubbleMode::Anchored {
            let weak = self.weak_self.clone();
            *self.dismiss_timer.lock() = Some(tokio::spawn(async move {
                time::sleep(Duration::from_millis(show_ms)).await;
                if let Some(controller) = weak.upgrade() {
                    controller.auto_dismiss(generation);
                }
            }));
        }
    }

    fn set_scanning(&self) {
        self.bump_generation();
        self.cancel_dismiss_timer();
        let state = {
            let mut st = self.state.lock();
            st.phase = BubblePhase::Scanning;
            st.expires_at = None;
            st.clone()
        };
        let _ = self.state_tx.send(state);
    }

    fn hide(&self, reason: &str, reset_mode: bool) {
        self.bump_generation();
        self.cancel_dismiss_timer();
        let was_visible = {
            let mut st = self.state.lock();
            let was = st.is_visible();
            st.phase = BubblePhase::Hidden;
            st.text.clear();
            st.source_game_id = None;
            st.expires_at = None;
            if reset_mode {
                st.mode = BubbleMode::Anchored;
                st.position = None;
            }
            if was {
                let _ = self.state_tx.send(st.clone());
            }
            was
        };
        if was_visible {
            TraceEvent::BubbleDismissed {
                reason: reason.to_owned(),
            }
            .emit();
        }
    }

    /// Full reset to Anchored/Hidden, used on chat focus, disable, teardown.
    fn reset(&self, reason: &str) {
        let floating = self.state.lock().is_floating();
        if floating {
            self.context.clear_floating_context();
        }
        self.hide(reason, true);
    }

    /// Floating mode re-fetches on every page/sport/game change.
    fn respawn_floating_scan(&self) {
        if !self.state.lock().is_floating() {
            return;
        }
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            if let Some(controller) = weak.upgrade() {
                controller.scan_current_page().await;
            }
        });
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn cancel_dismiss_timer(&self) {
        if let Some(handle) = self.dismiss_timer.lock().take() {
            handle.abort();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct MockBackend {
        page_calls: AtomicUsize,
        insight_calls: AtomicUsize,
        delay: Duration,
        fail: AtomicBool,
        last_feed_len: Mutex<usize>,
        last_history: Mutex<Vec<String>>,
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self {
                page_calls: AtomicUsize::new(0),
                insight_calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: AtomicBool::new(false),
                last_feed_len: Mutex::new(0),
                last_history: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait::async_trait]
    impl SuggestionBackend for MockBackend {
        async fn fetch_page_suggestion(&self, payload: &PagePayload) -> SuggestionResult {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if let PagePayload::Feed { games, .. } = payload {
                *self.last_feed_len.lock() = games.len();
            }
            time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return SuggestionResult::failed();
            }
            SuggestionResult {
                suggestion: "Lakers -4.5 looks strong tonight.".into(),
                game_id: Some("g1".into()),
                success: true,
            }
        }

        async fn fetch_game_insight(
            &self,
            game: &Game,
            _sport: Sport,
            previous_insights: &[String],
        ) -> SuggestionResult {
            self.insight_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_history.lock() = previous_insights.to_vec();
            time::sleep(self.delay).await;
            SuggestionResult {
                suggestion: format!("{} should cover at home.", game.home_team),
                game_id: Some(game.id.clone()),
                success: true,
            }
        }
    }

    fn game(id: &str) -> Game {
        Game {
            id: id.into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            start_time: Utc::now(),
            home_odds: Some(-180),
            away_odds: Some(155),
            spread: Some(-4.5),
            total: Some(224.5),
        }
    }

    fn controller_with(backend: Arc<MockBackend>) -> Arc<SuggestionController> {
        SuggestionController::new(
            SuggestionConfig::default(),
            backend,
            Arc::new(PageContextTracker::new()),
        )
    }

    /// Let spawned tasks run without advancing the paused clock.
    async fn settle() {
        for _ in 0..25 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_visit_trigger_fires_at_two_seconds_not_before() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_sport_change(Sport::Nba);
        controller.set_games(vec![game("g1")]);
        settle().await;

        time::advance(Duration::from_millis(1_999)).await;
        settle().await;
        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_visit_arms_only_once_per_sport() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_sport_change(Sport::Nba);
        controller.set_games(vec![game("g1")]);
        settle().await;
        time::advance(Duration::from_millis(2_100)).await;
        settle().await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);
        controller.dismiss();

        // Coming back to the same sport does not re-arm the 2s timer.
        controller.on_sport_change(Sport::Nfl);
        controller.on_sport_change(Sport::Nba);
        settle().await;
        time::advance(Duration::from_millis(5_000)).await;
        settle().await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_chat_suppresses_triggers() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_chat_focus(true);
        controller.trigger(Sport::Nba, vec![game("g1")]).await;

        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_triggers_make_one_request() {
        let backend = Arc::new(MockBackend {
            delay: Duration::from_millis(500),
            ..Default::default()
        });
        let controller = controller_with(backend.clone());

        tokio::join!(
            controller.trigger(Sport::Nba, vec![game("g1")]),
            controller.trigger(Sport::Nba, vec![game("g1")]),
        );
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_bubble_dismisses_at_twenty_seconds() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend);

        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        settle().await;
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );

        time::advance(Duration::from_millis(19_999)).await;
        settle().await;
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );

        time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_dismiss_timer_cannot_hide_a_newer_bubble() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend);

        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        settle().await;
        time::advance(Duration::from_millis(10_000)).await;
        settle().await;

        controller.dismiss();
        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        settle().await;

        // The first bubble's 20s mark passes; the new bubble must survive.
        time::advance(Duration::from_millis(10_001)).await;
        settle().await;
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );

        time::advance(Duration::from_millis(10_000)).await;
        settle().await;
        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn outliers_scan_with_no_alerts_falls_back_and_dismisses_at_five_seconds() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_page_change(PageKind::Outliers);
        controller.scan_current_page().await;
        settle().await;

        let state = controller.current_state();
        assert_eq!(state.phase, BubblePhase::ShowingSuggestion);
        assert_eq!(state.text, NO_ALERTS_FALLBACK);
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_millis(4_999)).await;
        settle().await;
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );

        time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_shows_fallback_with_short_dismiss() {
        let backend = Arc::new(MockBackend::default());
        backend.fail.store(true, Ordering::SeqCst);
        let controller = controller_with(backend);

        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        settle().await;
        let state = controller.current_state();
        assert_eq!(state.phase, BubblePhase::ShowingSuggestion);
        assert_eq!(state.text, FETCH_FALLBACK);

        time::advance(Duration::from_millis(5_001)).await;
        settle().await;
        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn detach_with_game_never_shows_welcome_text() {
        let backend = Arc::new(MockBackend {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let controller = controller_with(backend);

        let c = controller.clone();
        let task = tokio::spawn(async move {
            c.detach_from_anchor(100.0, 400.0, 60.0, 60.0, Some(game("g1")), Some(Sport::Nba))
                .await;
        });
        settle().await;

        let scanning = controller.current_state();
        assert_eq!(scanning.phase, BubblePhase::Scanning);
        assert!(scanning.is_floating());
        assert_ne!(scanning.text, WELCOME_TEXT);

        time::advance(Duration::from_millis(11)).await;
        task.await.unwrap();

        let shown = controller.current_state();
        assert_eq!(shown.phase, BubblePhase::ShowingSuggestion);
        assert_eq!(shown.source_game_id.as_deref(), Some("g1"));
        assert_ne!(shown.text, WELCOME_TEXT);
        // Floating bubbles never auto-expire.
        assert!(shown.expires_at.is_none());
        time::advance(Duration::from_millis(60_000)).await;
        settle().await;
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );
    }

    #[tokio::test(start_paused = true)]
    async fn plain_detach_shows_welcome_and_menu_dismisses_floating() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend);

        controller.detach(Some((50.0, 300.0)));
        let state = controller.current_state();
        assert!(state.is_floating());
        assert_eq!(state.text, WELCOME_TEXT);

        // While detached, the menu surface is unavailable; open_menu folds
        // the floating bubble instead.
        controller.open_menu();
        let state = controller.current_state();
        assert_eq!(state.phase, BubblePhase::Hidden);
        assert_eq!(state.mode, BubbleMode::Anchored);
    }

    #[tokio::test(start_paused = true)]
    async fn menu_has_no_auto_dismiss() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend);

        controller.open_menu();
        assert_eq!(controller.current_state().phase, BubblePhase::ShowingMenu);

        time::advance(Duration::from_millis(120_000)).await;
        settle().await;
        assert_eq!(controller.current_state().phase, BubblePhase::ShowingMenu);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_reads_live_game_data() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_sport_change(Sport::Nba);
        controller.set_games(vec![game("g1")]);
        settle().await;
        time::advance(Duration::from_millis(2_100)).await;
        settle().await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);

        // Data disappears before the first re-trigger tick: nothing fires.
        time::advance(Duration::from_millis(25_000)).await;
        settle().await;
        controller.set_games(vec![]);
        time::advance(Duration::from_millis(95_000)).await;
        settle().await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);

        // Fresh data lands before the next tick: the timer sees it live.
        controller.set_games(vec![game("g2"), game("g3")]);
        time::advance(Duration::from_millis(120_000)).await;
        settle().await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 2);
        assert_eq!(*backend.last_feed_len.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_focus_resets_the_bubble() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend);

        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        assert!(controller.current_state().is_visible());

        controller.on_chat_focus(true);
        let state = controller.current_state();
        assert_eq!(state.phase, BubblePhase::Hidden);
        assert_eq!(state.mode, BubbleMode::Anchored);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_controller_never_fetches() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.set_enabled(false);
        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_opened_mid_fetch_never_shows_the_result() {
        let backend = Arc::new(MockBackend {
            delay: Duration::from_millis(500),
            ..Default::default()
        });
        let controller = controller_with(backend.clone());

        let c = controller.clone();
        let inflight = tokio::spawn(async move {
            c.trigger(Sport::Nba, vec![game("g1")]).await;
        });
        settle().await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);

        // The chat page takes focus while the fetch is still in the air.
        controller.on_chat_focus(true);
        time::advance(Duration::from_millis(501)).await;
        inflight.await.unwrap();

        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
        // The guard is released so a later, legitimate trigger still works.
        controller.on_chat_focus(false);
        controller.trigger(Sport::Nba, vec![game("g1")]).await;
        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disable_mid_fetch_drops_the_result() {
        let backend = Arc::new(MockBackend {
            delay: Duration::from_millis(500),
            ..Default::default()
        });
        let controller = controller_with(backend.clone());

        let c = controller.clone();
        let inflight = tokio::spawn(async move {
            c.trigger(Sport::Nba, vec![game("g1")]).await;
        });
        settle().await;

        controller.set_enabled(false);
        time::advance(Duration::from_millis(501)).await;
        inflight.await.unwrap();

        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn more_details_outside_context_is_a_noop() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_page_change(PageKind::Feed);
        controller.request_more_details().await;

        assert_eq!(backend.insight_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.current_state().phase, BubblePhase::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn another_insight_passes_shown_text_as_history() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_sport_change(Sport::Nba);
        controller
            .detach_from_anchor(0.0, 0.0, 60.0, 60.0, Some(game("g1")), Some(Sport::Nba))
            .await;
        let first = controller.current_state().text;
        assert!(!first.is_empty());

        controller.request_another_insight().await;
        assert_eq!(backend.insight_calls.load(Ordering::SeqCst), 2);
        assert_eq!(*backend.last_history.lock(), vec![first]);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_floating_clears_floating_context() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend);

        controller.on_sport_change(Sport::Nba);
        controller
            .detach_from_anchor(0.0, 0.0, 60.0, 60.0, Some(game("g1")), Some(Sport::Nba))
            .await;
        assert!(controller.context().snapshot().open_game.is_some());

        controller.dismiss_floating();
        let snap = controller.context().snapshot();
        assert!(snap.open_game.is_none());
        assert!(snap.previous_insights.is_empty());
        assert_eq!(controller.current_state().mode, BubbleMode::Anchored);
    }

    #[tokio::test(start_paused = true)]
    async fn floating_bubble_rescans_on_page_change() {
        let backend = Arc::new(MockBackend::default());
        let controller = controller_with(backend.clone());

        controller.on_sport_change(Sport::Nba);
        controller.detach(None);
        assert_eq!(controller.current_state().text, WELCOME_TEXT);

        controller.context().set_picks(vec![cs_domain::game::Pick {
            id: "p1".into(),
            game_id: "g1".into(),
            selection: "Lakers -4.5".into(),
            odds: -110,
            model_confidence: Some(0.71),
        }]);
        controller.on_page_change(PageKind::Picks);
        settle().await;

        assert_eq!(backend.page_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            controller.current_state().phase,
            BubblePhase::ShowingSuggestion
        );
    }
}
