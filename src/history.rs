//! Bounded history of accepted lines and `!N` recall.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 100;

static RECALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!(\d+)$").expect("recall pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("{reference}: event not found ({len} entries stored)")]
    OutOfRange { reference: String, len: usize },
    #[error("{0}: expected '!' followed by a positive number")]
    Malformed(String),
}

/// Ring of the most recent accepted lines, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a line, evicting the oldest entry when full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
    }

    /// 1-based lookup.
    pub fn get(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
    }

    /// Entries with their 1-based numbers.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, line.as_str()))
    }

    /// Resolves a `!N` reference.
    ///
    /// Returns `Ok(None)` when `line` is not a history reference at all.
    pub fn recall(&self, line: &str) -> Result<Option<String>, HistoryError> {
        let line = line.trim();
        if !line.starts_with('!') {
            return Ok(None);
        }
        let number = RECALL
            .captures(line)
            .and_then(|caps| caps[1].parse::<usize>().ok())
            .ok_or_else(|| HistoryError::Malformed(line.to_string()))?;
        self.get(number)
            .map(|entry| Some(entry.to_string()))
            .ok_or_else(|| HistoryError::OutOfRange {
                reference: line.to_string(),
                len: self.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_is_one_based() {
        let mut h = History::default();
        h.push("ls");
        h.push("pwd");
        assert_eq!(h.recall("!1"), Ok(Some("ls".to_string())));
        assert_eq!(h.recall("!2"), Ok(Some("pwd".to_string())));
    }

    #[test]
    fn plain_lines_are_not_references() {
        let h = History::default();
        assert_eq!(h.recall("ls -l"), Ok(None));
    }

    #[test]
    fn out_of_range_reference_is_rejected() {
        let mut h = History::default();
        h.push("ls");
        assert!(matches!(h.recall("!0"), Err(HistoryError::OutOfRange { .. })));
        assert!(matches!(h.recall("!2"), Err(HistoryError::OutOfRange { len: 1, .. })));
    }

    #[test]
    fn malformed_reference_is_rejected() {
        let h = History::default();
        assert!(matches!(h.recall("!ls"), Err(HistoryError::Malformed(_))));
        assert!(matches!(h.recall("!-1"), Err(HistoryError::Malformed(_))));
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let mut h = History::with_capacity(2);
        h.push("a");
        h.push("b");
        h.push("c");
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(1), Some("b"));
        let numbered: Vec<(usize, &str)> = h.iter().collect();
        assert_eq!(numbered, vec![(1, "b"), (2, "c")]);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut h = History::with_capacity(0);
        h.push("ls");
        assert!(h.is_empty());
    }
}
