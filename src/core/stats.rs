use ahash::AHashMap;
use serde::Serialize;

/// Coarse statement class, used as a low-cardinality metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind { Select, Insert, Update, Delete, Other }

impl StatementKind {
    /// Classify a statement by its leading keyword. For `WITH` the verb after
    /// the last top-level CTE body decides.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start();
        match leading_keyword(trimmed) {
            Some(kw) if kw.eq_ignore_ascii_case("with") => Self::after_ctes(trimmed),
            Some(kw) => Self::from_keyword(kw).unwrap_or(StatementKind::Other),
            None => StatementKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Other => "other",
        }
    }

    fn from_keyword(kw: &str) -> Option<Self> {
        [
            ("select", StatementKind::Select),
            ("insert", StatementKind::Insert),
            ("update", StatementKind::Update),
            ("delete", StatementKind::Delete),
        ]
        .into_iter()
        .find(|(name, _)| kw.eq_ignore_ascii_case(name))
        .map(|(_, kind)| kind)
    }

    fn after_ctes(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut depth = 0i32;
        let mut last_top_level = 0;
        let mut in_string = false;
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'\'' => in_string = !in_string,
                b'(' if !in_string => depth += 1,
                b')' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        last_top_level = i + 1;
                    }
                }
                _ => {}
            }
        }
        leading_keyword(sql[last_top_level..].trim_start())
            .and_then(Self::from_keyword)
            .unwrap_or(StatementKind::Select)
    }
}

fn leading_keyword(sql: &str) -> Option<&str> {
    let end = sql
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(sql.len());
    (end > 0).then(|| &sql[..end])
}

/// Running statistics for one statement shape.
///
/// The average is never stored; it is derived from the total on read.
#[derive(Debug, Clone, PartialEq)]
pub struct StatEntry {
    pub shape: String,
    pub count: u64,
    pub total_time_secs: f64,
    pub max_time_secs: f64,
    /// `+inf` until the first sample lands.
    pub min_time_secs: f64,
}

impl StatEntry {
    fn new(shape: String) -> Self {
        Self {
            shape,
            count: 0,
            total_time_secs: 0.0,
            max_time_secs: 0.0,
            min_time_secs: f64::INFINITY,
        }
    }

    fn observe(&mut self, elapsed_secs: f64) {
        self.count += 1;
        self.total_time_secs += elapsed_secs;
        self.max_time_secs = self.max_time_secs.max(elapsed_secs);
        self.min_time_secs = self.min_time_secs.min(elapsed_secs);
    }

    pub fn avg_time_secs(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_time_secs / self.count as f64
        }
    }

    /// Rounded, caller-facing copy of this entry.
    pub fn view(&self) -> StatView {
        StatView {
            shape: self.shape.clone(),
            count: self.count,
            total_time_secs: round3(self.total_time_secs),
            avg_time_secs: round3(self.avg_time_secs()),
            max_time_secs: round3(self.max_time_secs),
            min_time_secs: if self.min_time_secs.is_finite() {
                round3(self.min_time_secs)
            } else {
                0.0
            },
        }
    }
}

/// Reported form of a [`StatEntry`], seconds rounded to 3 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatView {
    pub shape: String,
    pub count: u64,
    pub total_time_secs: f64,
    pub avg_time_secs: f64,
    pub max_time_secs: f64,
    pub min_time_secs: f64,
}

/// Per-shape statistics table. Not synchronized on its own; the monitor
/// guards it together with the recent-query buffer.
#[derive(Debug, Default)]
pub struct StatsTable {
    entries: AHashMap<String, StatEntry>,
}

impl StatsTable {
    pub fn new() -> Self { Self::default() }

    pub fn update(&mut self, shape: &str, elapsed_secs: f64) {
        match self.entries.get_mut(shape) {
            Some(entry) => entry.observe(elapsed_secs),
            None => {
                let mut entry = StatEntry::new(shape.to_string());
                entry.observe(elapsed_secs);
                self.entries.insert(shape.to_string(), entry);
            }
        }
    }

    /// Up to `limit` entries, slowest average first. Equal averages are
    /// ordered by shape key so the result is deterministic.
    pub fn top(&self, limit: usize) -> Vec<StatEntry> {
        if limit == 0 {
            return Vec::new();
        }
        let mut all: Vec<&StatEntry> = self.entries.values().collect();
        all.sort_by(|a, b| {
            b.avg_time_secs()
                .total_cmp(&a.avg_time_secs())
                .then_with(|| a.shape.cmp(&b.shape))
        });
        all.into_iter().take(limit).cloned().collect()
    }

    pub fn get(&self, shape: &str) -> Option<&StatEntry> {
        self.entries.get(shape)
    }

    /// `(query count, total seconds)` across every shape.
    pub fn totals(&self) -> (u64, f64) {
        self.entries
            .values()
            .fold((0, 0.0), |(n, t), e| (n + e.count, t + e.total_time_secs))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn clear(&mut self) { self.entries.clear(); }
}

pub(crate) fn round3(v: f64) -> f64 { (v * 1000.0).round() / 1000.0 }
pub(crate) fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }
