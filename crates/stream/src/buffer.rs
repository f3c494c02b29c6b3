//! Append-only response log with a monotonic consumed cursor.
//!
//! The transport and the poll timer both observe the same log; the cursor is
//! the single source of truth for what has been consumed, so the two
//! mechanisms can interleave freely without double-counting. The cursor only
//! ever advances, and only to a UTF-8 boundary, so a chunk split mid-codepoint
//! stays buffered until its tail arrives.

use parking_lot::Mutex;
use tokio::sync::Notify;

struct LogInner {
    buf: Vec<u8>,
    cursor: usize,
}

pub struct ResponseLog {
    inner: Mutex<LogInner>,
    /// Pinged on every append — the event-driven observation path.
    appended: Notify,
}

impl Default for ResponseLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                buf: Vec::new(),
                cursor: 0,
            }),
            appended: Notify::new(),
        }
    }

    /// Append raw bytes and wake the event-driven observer.
    pub fn append(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.inner.lock().buf.extend_from_slice(chunk);
        self.appended.notify_one();
    }

    /// Wait for the next append. A permit is stored if the append happened
    /// before the wait, so wakeups are never lost.
    pub async fn notified(&self) {
        self.appended.notified().await;
    }

    /// Take everything between the cursor and the last complete UTF-8
    /// boundary, advancing the cursor. Returns `None` when nothing new and
    /// complete has arrived.
    pub fn drain_new(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let end = utf8_boundary_floor(&inner.buf, inner.buf.len());
        if end <= inner.cursor {
            return None;
        }
        let text = String::from_utf8_lossy(&inner.buf[inner.cursor..end]).into_owned();
        inner.cursor = end;
        Some(text)
    }

    /// The entire buffer as text, regardless of the cursor. Used by the
    /// atomic-delivery fallback when no chunk was ever observed in flight.
    pub fn snapshot_text(&self) -> String {
        let inner = self.inner.lock();
        String::from_utf8_lossy(&inner.buf).into_owned()
    }

    pub fn total_len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    pub fn consumed(&self) -> usize {
        self.inner.lock().cursor
    }
}

/// Largest `n <= end` such that `buf[..n]` does not cut a UTF-8 sequence.
///
/// Only the trailing sequence needs inspection: step back to its lead byte
/// and check whether the sequence is complete. Invalid lead bytes are passed
/// through as-is (length 1) and left to lossy decoding.
fn utf8_boundary_floor(buf: &[u8], end: usize) -> usize {
    if end == 0 {
        return 0;
    }
    let mut lead = end - 1;
    while lead > 0 && buf[lead] & 0xC0 == 0x80 {
        lead -= 1;
    }
    let needed = utf8_seq_len(buf[lead]);
    if lead + needed <= end {
        end
    } else {
        lead
    }
}

fn utf8_seq_len(lead: u8) -> usize {
    if lead < 0x80 {
        1
    } else if lead & 0xE0 == 0xC0 {
        2
    } else if lead & 0xF0 == 0xE0 {
        3
    } else if lead & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_only_new_bytes() {
        let log = ResponseLog::new();
        log.append(b"hello ");
        assert_eq!(log.drain_new().as_deref(), Some("hello "));
        assert_eq!(log.drain_new(), None);

        log.append(b"world");
        assert_eq!(log.drain_new().as_deref(), Some("world"));
        assert_eq!(log.consumed(), 11);
    }

    #[test]
    fn interleaved_observers_never_double_count() {
        // Simulates the event path and the poll path racing over one log.
        let log = ResponseLog::new();
        let mut collected = String::new();

        log.append(b"abc");
        if let Some(t) = log.drain_new() {
            collected.push_str(&t); // event path
        }
        if let Some(t) = log.drain_new() {
            collected.push_str(&t); // poll path fires right after
        }
        log.append(b"def");
        if let Some(t) = log.drain_new() {
            collected.push_str(&t);
        }
        assert_eq!(collected, "abcdef");
    }

    #[test]
    fn multibyte_char_split_across_chunks_stays_buffered() {
        let log = ResponseLog::new();
        let euro = "€".as_bytes(); // 3 bytes
        log.append(b"cost: ");
        log.append(&euro[..1]);
        // Partial lead byte: not drainable yet.
        assert_eq!(log.drain_new().as_deref(), Some("cost: "));
        log.append(&euro[1..]);
        assert_eq!(log.drain_new().as_deref(), Some("€"));
    }

    #[test]
    fn four_byte_sequence_boundary() {
        let log = ResponseLog::new();
        let emoji = "🏀".as_bytes(); // 4 bytes
        log.append(&emoji[..3]);
        assert_eq!(log.drain_new(), None);
        log.append(&emoji[3..]);
        assert_eq!(log.drain_new().as_deref(), Some("🏀"));
    }

    #[test]
    fn snapshot_ignores_cursor() {
        let log = ResponseLog::new();
        log.append(b"full text");
        let _ = log.drain_new();
        assert_eq!(log.snapshot_text(), "full text");
    }

    #[test]
    fn boundary_floor_on_pure_ascii() {
        assert_eq!(utf8_boundary_floor(b"abc", 3), 3);
        assert_eq!(utf8_boundary_floor(b"", 0), 0);
    }
}
