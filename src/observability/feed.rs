//! Append-only request log feed for the control plane.
//!
//! Each line gets a sequence number starting at 1. Pollers keep the last
//! sequence they saw and ask for everything after it. The feed holds at most
//! `capacity` lines; older lines are dropped from the front.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub seq: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub message: String,
}

/// Lines newer than a cursor, plus the cursor to use next time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub lines: Vec<LogLine>,
    pub next: u64,
}

#[derive(Debug)]
struct FeedInner {
    next_seq: u64,
    lines: VecDeque<LogLine>,
}

#[derive(Debug)]
pub struct LogFeed {
    capacity: usize,
    inner: Mutex<FeedInner>,
}

impl LogFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(FeedInner {
                next_seq: 1,
                lines: VecDeque::with_capacity(capacity.min(4096)),
            }),
        }
    }

    /// Append a line, returning its sequence number.
    pub fn push(&self, message: impl Into<String>) -> u64 {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.lines.len() == self.capacity {
            inner.lines.pop_front();
        }
        inner.lines.push_back(LogLine {
            seq,
            timestamp_ms,
            message: message.into(),
        });
        seq
    }

    /// Lines with `seq > cursor`, at most the `limit` most recent of them.
    pub fn since(&self, cursor: u64, limit: usize) -> FeedPage {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let newer: Vec<&LogLine> = inner.lines.iter().filter(|l| l.seq > cursor).collect();
        let skip = newer.len().saturating_sub(limit);
        let lines: Vec<LogLine> = newer.into_iter().skip(skip).cloned().collect();
        let next = lines.last().map(|l| l.seq).unwrap_or(cursor);
        FeedPage { lines, next }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_returns_only_new_lines() {
        let feed = LogFeed::new(10);
        feed.push("one");
        feed.push("two");
        let page = feed.since(0, 100);
        assert_eq!(page.lines.len(), 2);
        assert_eq!(page.next, 2);

        feed.push("three");
        let page = feed.since(page.next, 100);
        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].message, "three");
        assert_eq!(page.next, 3);

        let empty = feed.since(page.next, 100);
        assert!(empty.lines.is_empty());
        assert_eq!(empty.next, 3);
    }

    #[test]
    fn capacity_drops_oldest() {
        let feed = LogFeed::new(2);
        feed.push("a");
        feed.push("b");
        feed.push("c");
        let page = feed.since(0, 100);
        let messages: Vec<_> = page.lines.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn limit_keeps_most_recent() {
        let feed = LogFeed::new(10);
        for i in 0..5 {
            feed.push(format!("line {i}"));
        }
        let page = feed.since(0, 2);
        let messages: Vec<_> = page.lines.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["line 3", "line 4"]);
        assert_eq!(page.next, 5);
    }
}
