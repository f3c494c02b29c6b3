//! File-backed thread store.
//!
//! Thread metadata lives in `threads.json` under the configured state path.
//! Each thread's messages are an append-only `<threadId>.jsonl` file with an
//! in-memory write-through cache so the load path never re-reads disk after
//! the first hit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use cs_domain::chat::{ChatMessage, Role};
use cs_domain::error::{Error, Result};
use cs_domain::trace::TraceEvent;

/// Thread titles are the first user message, clipped for list rendering.
const TITLE_MAX_CHARS: usize = 60;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Narrow save/load interface consumed by the stream pipeline and the chat
/// history screen.
#[async_trait::async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create_thread(&self, user_id: &str, first_message: &str) -> Result<String>;
    async fn save_message(&self, thread_id: &str, role: Role, content: &str) -> Result<()>;
    async fn get_threads(&self, user_id: &str) -> Result<Vec<ThreadSummary>>;
    async fn get_thread(&self, thread_id: &str) -> Result<Vec<ChatMessage>>;
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}

/// Metadata row for the thread list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
}

/// One persisted message line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageLine {
    timestamp: String,
    role: Role,
    content: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FileThreadStore {
    index_path: PathBuf,
    base_dir: PathBuf,
    index: RwLock<HashMap<String, ThreadSummary>>,
    cache: RwLock<HashMap<String, Vec<MessageLine>>>,
}

impl FileThreadStore {
    /// Load or create the store at `state_path/threads.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;

        let index_path = state_path.join("threads.json");
        let index: HashMap<String, ThreadSummary> = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            threads = index.len(),
            path = %index_path.display(),
            "thread store loaded"
        );

        Ok(Self {
            index_path,
            base_dir: state_path.to_path_buf(),
            index: RwLock::new(index),
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn flush_index(&self) -> Result<()> {
        let index = self.index.read();
        let json = serde_json::to_string_pretty(&*index)
            .map_err(|e| Error::Persistence(format!("serializing thread index: {e}")))?;
        std::fs::write(&self.index_path, json).map_err(Error::Io)?;
        Ok(())
    }

    fn message_path(&self, thread_id: &str) -> PathBuf {
        self.base_dir.join(format!("{thread_id}.jsonl"))
    }

    async fn append_line(&self, thread_id: &str, line: MessageLine) -> Result<()> {
        let path = self.message_path(thread_id);
        let buf = serde_json::to_string(&line)
            .map_err(|e| Error::Persistence(format!("serializing message: {e}")))?;

        // Disk first; only update the cache if I/O succeeds.
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(Error::Io)?;
            file.write_all(buf.as_bytes()).map_err(Error::Io)?;
            file.write_all(b"\n").map_err(Error::Io)?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        let mut cache = self.cache.write();
        cache.entry(thread_id.to_owned()).or_default().push(line);
        Ok(())
    }

    fn load_lines(&self, thread_id: &str) -> Result<Vec<MessageLine>> {
        let path = self.message_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut lines = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MessageLine>(line) {
                Ok(ml) => lines.push(ml),
                Err(e) => {
                    tracing::warn!(
                        thread_id = thread_id,
                        error = %e,
                        "skipping malformed message line"
                    );
                }
            }
        }
        Ok(lines)
    }
}

#[async_trait::async_trait]
impl ThreadStore for FileThreadStore {
    async fn create_thread(&self, user_id: &str, first_message: &str) -> Result<String> {
        let thread_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let summary = ThreadSummary {
            thread_id: thread_id.clone(),
            user_id: user_id.to_owned(),
            title: clip_title(first_message),
            created_at: now,
            updated_at: now,
            message_count: 0,
        };

        self.index.write().insert(thread_id.clone(), summary);
        self.flush_index()?;

        TraceEvent::ThreadCreated {
            thread_id: thread_id.clone(),
            user_id: user_id.to_owned(),
        }
        .emit();

        Ok(thread_id)
    }

    async fn save_message(&self, thread_id: &str, role: Role, content: &str) -> Result<()> {
        if !self.index.read().contains_key(thread_id) {
            return Err(Error::Persistence(format!("unknown thread: {thread_id}")));
        }

        self.append_line(
            thread_id,
            MessageLine {
                timestamp: Utc::now().to_rfc3339(),
                role,
                content: content.to_owned(),
            },
        )
        .await?;

        {
            let mut index = self.index.write();
            if let Some(entry) = index.get_mut(thread_id) {
                entry.updated_at = Utc::now();
                entry.message_count += 1;
            }
        }
        self.flush_index()?;

        TraceEvent::ThreadMessageSaved {
            thread_id: thread_id.to_owned(),
            role: role.as_str().to_owned(),
        }
        .emit();

        Ok(())
    }

    async fn get_threads(&self, user_id: &str) -> Result<Vec<ThreadSummary>> {
        let mut threads: Vec<ThreadSummary> = self
            .index
            .read()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Vec<ChatMessage>> {
        // Fast path: cache hit.
        {
            let cache = self.cache.read();
            if let Some(lines) = cache.get(thread_id) {
                return Ok(lines
                    .iter()
                    .map(|l| ChatMessage {
                        role: l.role,
                        content: l.content.clone(),
                    })
                    .collect());
            }
        }

        let lines = self.load_lines(thread_id)?;
        let messages = lines
            .iter()
            .map(|l| ChatMessage {
                role: l.role,
                content: l.content.clone(),
            })
            .collect();
        self.cache.write().insert(thread_id.to_owned(), lines);
        Ok(messages)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.index.write().remove(thread_id);
        self.cache.write().remove(thread_id);
        self.flush_index()?;

        let path = self.message_path(thread_id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(Error::Io)?;
        }
        Ok(())
    }
}

/// Clip the first message into a list title on a char boundary.
fn clip_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", clipped.trim_end())
}
