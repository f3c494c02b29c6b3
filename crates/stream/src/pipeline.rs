//! The ingestion pipeline proper.
//!
//! One send is one [`StreamSession`] driven by a single task that:
//! - races the transport against the 30s deadline and the cancel token,
//! - observes log growth through both the event path (append notifications)
//!   and the poll path (150ms interval), deduplicated by the log cursor,
//! - debounces renders through the flush gate and emits haptic pulses,
//! - on completion drains tail bytes, applies the atomic-delivery fallback,
//!   flushes unconditionally, persists the exchange, and reports the result.
//!
//! Entry point: [`StreamPipeline::send_message`] spawns the task and returns
//! a [`StreamHandle`] of [`ChatEvent`]s, or `None` when a send is already in
//! flight (the second attempt is dropped, not queued).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cs_domain::chat::{ChatMessage, Role};
use cs_domain::config::StreamConfig;
use cs_domain::error::Error;
use cs_domain::stream::BoxStream;
use cs_domain::trace::TraceEvent;
use cs_threads::ThreadStore;

use crate::buffer::ResponseLog;
use crate::gate::{FlushDecision, FlushGate, HapticGate};
use crate::transport::{ChatBody, ChatTransport};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events & handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted to the UI while a chat response streams in.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Render the accumulated text so far. Emitted at most once per flush
    /// window, plus one final unconditional flush on completion.
    Render { content: String },

    /// A tactile pulse, rate-limited independently of renders.
    Haptic,

    /// The response completed and the exchange was handed to the thread
    /// store. `thread_id` is None only if creating the thread failed.
    Done {
        content: String,
        thread_id: Option<String>,
    },

    /// Terminal failure. Any partial text already rendered stays on screen.
    Error { message: String },
}

/// Handle to one in-flight chat request.
pub struct StreamHandle {
    pub request_id: Uuid,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Cancel the request. Wire this to screen teardown so an abandoned chat
    /// doesn't finish in the background.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancel token, for tying the request to a wider UI
    /// lifecycle scope.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Consume the handle as an event stream.
    pub fn into_stream(self) -> BoxStream<'static, ChatEvent> {
        let mut rx = self.events;
        Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StreamPipeline {
    cfg: StreamConfig,
    transport: Arc<dyn ChatTransport>,
    threads: Arc<dyn ThreadStore>,
    /// Guard flag: only one stream session may exist at a time.
    sending: Arc<AtomicBool>,
}

impl StreamPipeline {
    pub fn new(
        cfg: StreamConfig,
        transport: Arc<dyn ChatTransport>,
        threads: Arc<dyn ThreadStore>,
    ) -> Self {
        Self {
            cfg,
            transport,
            threads,
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Start one chat turn. Returns `None` when a send is already in flight.
    pub fn send_message(
        &self,
        user_id: &str,
        thread_id: Option<String>,
        user_text: &str,
        history: Vec<ChatMessage>,
    ) -> Option<StreamHandle> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("chat send dropped: a stream session is already active");
            return None;
        }

        let request_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let body = ChatBody {
            message: user_text.to_owned(),
            system_prompt: None,
            conversation_history: history,
        };

        tokio::spawn(ingest(
            self.cfg.clone(),
            self.transport.clone(),
            self.threads.clone(),
            self.sending.clone(),
            cancel.clone(),
            request_id,
            user_id.to_owned(),
            thread_id,
            user_text.to_owned(),
            body,
            tx,
        ));

        Some(StreamHandle {
            request_id,
            events: rx,
            cancel,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct StreamSession {
    accumulated: String,
    /// In-flight observations only; the completion tail drain doesn't count.
    chunk_events: usize,
    flush_gate: FlushGate,
    haptic_gate: HapticGate,
    pending_flush_at: Option<Instant>,
}

impl StreamSession {
    fn new(cfg: &StreamConfig) -> Self {
        Self {
            accumulated: String::new(),
            chunk_events: 0,
            flush_gate: FlushGate::new(Duration::from_millis(cfg.flush_interval_ms)),
            haptic_gate: HapticGate::new(Duration::from_millis(cfg.haptic_interval_ms)),
            pending_flush_at: None,
        }
    }

    /// Apply any new log growth, whichever observation path noticed it.
    fn observe(&mut self, log: &ResponseLog, tx: &mpsc::UnboundedSender<ChatEvent>) {
        let Some(delta) = log.drain_new() else {
            return;
        };
        self.accumulated.push_str(&delta);
        self.chunk_events += 1;

        let now = Instant::now();
        if self.haptic_gate.try_pulse(now) {
            let _ = tx.send(ChatEvent::Haptic);
        }
        match self.flush_gate.check(now) {
            FlushDecision::Flush => self.flush_now(tx),
            FlushDecision::Defer(remaining) => {
                // At most one pending flush; later chunks fold into it.
                if self.pending_flush_at.is_none() {
                    self.pending_flush_at = Some(now + remaining);
                }
            }
        }
    }

    fn flush_now(&mut self, tx: &mpsc::UnboundedSender<ChatEvent>) {
        self.flush_gate.mark(Instant::now());
        self.pending_flush_at = None;
        let _ = tx.send(ChatEvent::Render {
            content: self.accumulated.clone(),
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The ingestion task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[allow(clippy::too_many_arguments)]
async fn ingest(
    cfg: StreamConfig,
    transport: Arc<dyn ChatTransport>,
    threads: Arc<dyn ThreadStore>,
    sending: Arc<AtomicBool>,
    cancel: CancellationToken,
    request_id: Uuid,
    user_id: String,
    thread_id: Option<String>,
    user_text: String,
    body: ChatBody,
    tx: mpsc::UnboundedSender<ChatEvent>,
) {
    let log = Arc::new(ResponseLog::new());
    let mut session = StreamSession::new(&cfg);
    let started = Instant::now();

    TraceEvent::StreamStarted {
        request_id: request_id.to_string(),
    }
    .emit();

    let deadline = time::sleep(Duration::from_millis(cfg.request_timeout_ms));
    tokio::pin!(deadline);
    let mut transport_fut = Box::pin(transport.run(body, log.clone()));
    let mut poll = time::interval(Duration::from_millis(cfg.poll_interval_ms));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let outcome = loop {
        tokio::select! {
            biased;

            res = &mut transport_fut => break res,

            _ = cancel.cancelled() => break Err(Error::Cancelled),

            _ = &mut deadline => {
                break Err(Error::Timeout(format!(
                    "chat response exceeded {}ms",
                    cfg.request_timeout_ms
                )));
            }

            // Event-driven delivery: the transport pinged the log.
            _ = log.notified() => session.observe(&log, &tx),

            // Polling delivery: re-read the same log on a fixed cadence.
            _ = poll.tick() => session.observe(&log, &tx),

            // The deferred render from the flush gate.
            _ = time::sleep_until(session.pending_flush_at.unwrap_or_else(Instant::now)),
                if session.pending_flush_at.is_some() => session.flush_now(&tx),
        }
    };

    match outcome {
        Ok(status) => {
            // Tail bytes that landed between the last observation and
            // completion.
            if let Some(tail) = log.drain_new() {
                session.accumulated.push_str(&tail);
            }

            // The whole body arrived with no in-flight observations (some
            // hosts deliver everything in the final load event): the final
            // buffer *is* the message.
            let atomic_delivery = session.chunk_events == 0;
            if atomic_delivery {
                session.accumulated = log.snapshot_text();
            }

            session.flush_now(&tx);

            TraceEvent::StreamCompleted {
                request_id: request_id.to_string(),
                chunk_events: session.chunk_events,
                bytes: log.total_len(),
                duration_ms: started.elapsed().as_millis() as u64,
                atomic_delivery,
            }
            .emit();

            if !(200..300).contains(&status) {
                // Rendered partial text stays on screen; it is never
                // retracted.
                TraceEvent::StreamFailed {
                    request_id: request_id.to_string(),
                    reason: format!("status {status}"),
                }
                .emit();
                let _ = tx.send(ChatEvent::Error {
                    message: format!("assistant returned status {status}"),
                });
            } else {
                let thread_id = persist_exchange(
                    &*threads,
                    &user_id,
                    thread_id,
                    &user_text,
                    &session.accumulated,
                )
                .await;
                let _ = tx.send(ChatEvent::Done {
                    content: session.accumulated.clone(),
                    thread_id,
                });
            }
        }
        Err(e) => {
            TraceEvent::StreamFailed {
                request_id: request_id.to_string(),
                reason: e.to_string(),
            }
            .emit();
            let _ = tx.send(ChatEvent::Error {
                message: user_facing_message(&e),
            });
        }
    }

    sending.store(false, Ordering::Release);
}

/// What the terminal error bubble says. Network faults, timeouts, and empty
/// bodies speak for themselves; a user-initiated cancel echoes back; any
/// other failure class is internal detail and gets a generic line.
fn user_facing_message(e: &Error) -> String {
    match e {
        Error::Cancelled => e.to_string(),
        _ if e.is_user_visible() => e.to_string(),
        _ => "Something went wrong sending that. Try again.".to_owned(),
    }
}

/// Hand the completed exchange to the thread store. Failures degrade chat
/// history but never surface to the live conversation.
async fn persist_exchange(
    store: &dyn ThreadStore,
    user_id: &str,
    thread_id: Option<String>,
    user_text: &str,
    assistant_text: &str,
) -> Option<String> {
    let thread_id = match thread_id {
        Some(id) => id,
        None => match store.create_thread(user_id, user_text).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "thread create failed; exchange not persisted");
                return None;
            }
        },
    };

    if let Err(e) = store.save_message(&thread_id, Role::User, user_text).await {
        tracing::warn!(thread_id = %thread_id, error = %e, "user message save failed");
    }
    if let Err(e) = store
        .save_message(&thread_id, Role::Assistant, assistant_text)
        .await
    {
        tracing::warn!(thread_id = %thread_id, error = %e, "assistant message save failed");
    }
    Some(thread_id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
