//! Pending debounce table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use crate::source::RawEventKind;

/// Identity of a debounced path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebounceKey {
    pub root: PathBuf,
    pub relative_name: PathBuf,
}

impl DebounceKey {
    pub fn new(root: impl Into<PathBuf>, relative_name: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            relative_name: relative_name.into(),
        }
    }

    /// Absolute path of the debounced entry.
    pub fn full_path(&self) -> PathBuf {
        self.root.join(&self.relative_name)
    }
}

/// A timer that has not fired yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub deadline: Instant,
    /// Kind of the most recent notification for the key.
    pub kind: RawEventKind,
    /// Raw notifications folded into this timer.
    pub hits: u32,
}

/// Per-key debounce timers.
///
/// Arming an already pending key moves its deadline forward, so a burst of
/// notifications closer together than the delay settles exactly once, one
/// delay after the last notification. Timers are plain deadlines; the owner
/// sleeps until [`next_deadline`](Self::next_deadline) and then drains.
#[derive(Debug)]
pub struct PendingDebounce {
    delay: Duration,
    pending: HashMap<DebounceKey, PendingTimer>,
}

impl PendingDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Arm (or re-arm) the timer for `key`. Returns `true` if a pending timer
    /// was cancelled and restarted.
    pub fn arm(&mut self, key: DebounceKey, kind: RawEventKind, now: Instant) -> bool {
        let deadline = now + self.delay;
        match self.pending.get_mut(&key) {
            Some(timer) => {
                timer.deadline = deadline;
                timer.kind = kind;
                timer.hits += 1;
                true
            }
            None => {
                self.pending.insert(
                    key,
                    PendingTimer {
                        deadline,
                        kind,
                        hits: 1,
                    },
                );
                false
            }
        }
    }

    /// Earliest deadline among pending timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|t| t.deadline).min()
    }

    /// Remove and return every timer whose deadline is at or before `now`.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(DebounceKey, PendingTimer)> {
        let expired: Vec<DebounceKey> = self
            .pending
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut fired: Vec<_> = expired
            .into_iter()
            .filter_map(|key| self.pending.remove_entry(&key))
            .collect();
        fired.sort_by_key(|(_, timer)| timer.deadline);
        fired
    }

    /// Cancel every timer below `root`. Returns how many were cancelled.
    pub fn cancel_root(&mut self, root: &Path) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key, _| key.root != root);
        before - self.pending.len()
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn get(&self, key: &DebounceKey) -> Option<&PendingTimer> {
        self.pending.get(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
