// Copyright (c) 2025 the replypilot authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{MENTION_TTL_HOURS, REPLY_HISTORY_CAP, REPLY_HISTORY_TRIM};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyHistoryEntry {
    pub post_id: String,
    pub replied_at: DateTime<Utc>,
}

/// Persistent per-profile state: which posts were already replied to, which
/// handles were recently mentioned, and the legacy per-credential rate-limit
/// resets. One JSON file, written whole on every change.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryStore {
    #[serde(default)]
    pub replies: Vec<ReplyHistoryEntry>,
    /// Lowercase handle -> moment it was last mentioned in an outgoing reply.
    #[serde(default)]
    pub mentions: HashMap<String, DateTime<Utc>>,
    /// Credential identifier -> rate-limit reset time. Only populated by
    /// remote multi-key backends; expired entries are purged on load.
    #[serde(default)]
    pub rate_limits: HashMap<String, DateTime<Utc>>,
    #[serde(skip)]
    path: PathBuf,
}

impl HistoryStore {
    /// Load from a file, or start empty if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse history file: {}", path.display()))?
        } else {
            Self::default()
        };
        store.path = path.to_path_buf();
        store.rate_limits.retain(|_, reset| *reset > Utc::now());
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))?;
        Ok(())
    }

    pub fn has_replied(&self, post_id: &str) -> bool {
        self.replies.iter().any(|entry| entry.post_id == post_id)
    }

    /// Record a successful reply. Over the cap, the list is trimmed to the
    /// most recent entries before the new one is pushed, oldest evicted
    /// first.
    pub fn record_reply(&mut self, post_id: &str, now: DateTime<Utc>) {
        if self.replies.len() > REPLY_HISTORY_CAP {
            let excess = self.replies.len() - REPLY_HISTORY_TRIM;
            self.replies.drain(..excess);
        }
        if !self.has_replied(post_id) {
            self.replies.push(ReplyHistoryEntry {
                post_id: post_id.to_string(),
                replied_at: now,
            });
        }
    }

    /// True when `handle` was already mentioned strictly before `now` and
    /// within the rolling window; otherwise records it as mentioned now.
    /// Expired entries are purged lazily on each call. The strict comparison
    /// keeps a scrub pass from tripping over mentions it recorded itself.
    pub fn note_mention(&mut self, handle: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::hours(MENTION_TTL_HOURS);
        self.mentions.retain(|_, at| *at > cutoff);

        let key = handle.to_lowercase();
        if self.mentions.get(&key).is_some_and(|at| *at < now) {
            true
        } else {
            self.mentions.insert(key, now);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_trims_to_the_most_recent_nine_hundred_plus_the_new_entry() {
        let now = Utc::now();
        let mut store = HistoryStore::default();
        for i in 0..1001 {
            store.replies.push(ReplyHistoryEntry {
                post_id: format!("{}", i),
                replied_at: now,
            });
        }

        store.record_reply("fresh", now);

        assert_eq!(store.replies.len(), 901);
        // Oldest evicted first: ids 0..=100 are gone, 101 survives.
        assert!(!store.has_replied("0"));
        assert!(!store.has_replied("100"));
        assert!(store.has_replied("101"));
        assert!(store.has_replied("1000"));
        assert!(store.has_replied("fresh"));
    }

    #[test]
    fn duplicate_reply_ids_are_not_recorded_twice() {
        let now = Utc::now();
        let mut store = HistoryStore::default();
        store.record_reply("42", now);
        store.record_reply("42", now);
        assert_eq!(store.replies.len(), 1);
    }

    #[test]
    fn mentions_expire_after_the_rolling_window() {
        let now = Utc::now();
        let mut store = HistoryStore::default();

        assert!(!store.note_mention("Alice", now));
        // Second mention inside the window reports as already used.
        assert!(store.note_mention("alice", now + Duration::hours(1)));
        // After 24 hours the entry has lapsed and the handle is fresh again.
        assert!(!store.note_mention("alice", now + Duration::hours(26)));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let now = Utc::now();

        let mut store = HistoryStore::load(&path).unwrap();
        store.record_reply("7", now);
        store.note_mention("bob", now);
        store.save().unwrap();

        let reloaded = HistoryStore::load(&path).unwrap();
        assert!(reloaded.has_replied("7"));
        assert!(reloaded.mentions.contains_key("bob"));
    }

    #[test]
    fn expired_rate_limits_are_purged_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut store = HistoryStore::load(&path).unwrap();
        store
            .rate_limits
            .insert("key-1".to_string(), Utc::now() - Duration::hours(1));
        store
            .rate_limits
            .insert("key-2".to_string(), Utc::now() + Duration::hours(1));
        store.save().unwrap();

        let reloaded = HistoryStore::load(&path).unwrap();
        assert!(!reloaded.rate_limits.contains_key("key-1"));
        assert!(reloaded.rate_limits.contains_key("key-2"));
    }
}
