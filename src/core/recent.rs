use serde::Serialize;
use std::collections::VecDeque;
use time::OffsetDateTime;

/// One executed statement as the host reported it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub statement: String,
    pub elapsed_secs: f64,
    pub parameters: Option<String>,
}

impl QueryRecord {
    pub fn new(statement: impl Into<String>, parameters: Option<String>, elapsed_secs: f64) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            statement: statement.into(),
            elapsed_secs,
            parameters,
        }
    }
}

/// Fixed-capacity history of the most recent queries; the oldest record is
/// evicted once the buffer is full.
#[derive(Debug)]
pub struct RecentQueries {
    buf: VecDeque<QueryRecord>,
    capacity: usize,
}

impl RecentQueries {
    /// `capacity` is clamped to at least one slot.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, record: QueryRecord) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(record);
    }

    /// Copy of the newest `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<QueryRecord> {
        self.buf.iter().rev().take(limit).cloned().collect()
    }

    /// Records slower than `threshold_secs`, slowest first, at most `limit`.
    pub fn slow(&self, threshold_secs: f64, limit: usize) -> Vec<QueryRecord> {
        let mut slow: Vec<&QueryRecord> = self
            .buf
            .iter()
            .filter(|r| r.elapsed_secs > threshold_secs)
            .collect();
        slow.sort_by(|a, b| b.elapsed_secs.total_cmp(&a.elapsed_secs));
        slow.into_iter().take(limit).cloned().collect()
    }

    pub fn slow_count(&self, threshold_secs: f64) -> usize {
        self.buf.iter().filter(|r| r.elapsed_secs > threshold_secs).count()
    }

    pub fn capacity(&self) -> usize { self.capacity }
    pub fn len(&self) -> usize { self.buf.len() }
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    pub fn clear(&mut self) { self.buf.clear(); }
}
