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
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_FEED_URL, DEFAULT_HISTORY_FILE};
use crate::error::AgentError;
use crate::reputation::SignalKind;

/// Configuration file structure. The autopilot loop reloads this at the top
/// of every iteration so mid-run edits take effect on the next post; within
/// one iteration the snapshot never changes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier on the generation backend (e.g. "llama3").
    pub model: String,

    /// Base URL of the Ollama-compatible backend.
    pub base_url: String,

    /// Optional API key for remote backends. Local backends need none.
    pub api_key: Option<String>,

    /// Output language for generated replies: "en", "uk" or "ru".
    pub language: String,

    /// Custom style instruction appended to the generation prompt.
    pub prompt_style: Option<String>,

    /// Own handle, without the leading '@'. Used for self-reply protection.
    pub my_username: Option<String>,

    /// Handles (without '@') that are never replied to.
    pub blacklist: Vec<String>,

    pub auto_send: bool,
    pub auto_like: bool,
    /// Probability in percent that an accepted post is liked first.
    pub like_probability: u8,
    pub verified_only: bool,
    pub skip_replies: bool,

    /// Humanization delay bounds in seconds; the wait before acting on an
    /// accepted post is drawn uniformly from this range.
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,

    /// Stop after this many sent comments. 0 means unlimited.
    pub max_comments: u32,

    /// Answer trivial greetings from the local template pools instead of
    /// calling the backend.
    pub greeting_shortcut: bool,

    pub feed_url: String,

    /// DevTools websocket of an already-running Chrome. When unset a fresh
    /// instance is launched.
    pub ws_url: Option<String>,
    pub user_data_dir: Option<PathBuf>,

    pub log_file: Option<String>,
    pub history_file: PathBuf,

    pub reputation: ReputationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            language: "en".to_string(),
            prompt_style: None,
            my_username: None,
            blacklist: Vec::new(),
            auto_send: false,
            auto_like: false,
            like_probability: 50,
            verified_only: false,
            skip_replies: true,
            min_delay_secs: 5,
            max_delay_secs: 15,
            max_comments: 0,
            greeting_shortcut: true,
            feed_url: DEFAULT_FEED_URL.to_string(),
            ws_url: None,
            user_data_dir: None,
            log_file: None,
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            reputation: ReputationConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a file, or return default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// The checks that must hold before the loop is allowed to start.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.model.trim().is_empty() {
            return Err(AgentError::ConfigurationMissing(
                "no model configured; set `model` in replypilot.toml".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(AgentError::ConfigurationMissing(
                "empty `base_url` in replypilot.toml".to_string(),
            ));
        }
        if self.min_delay_secs > self.max_delay_secs {
            return Err(AgentError::ConfigurationMissing(
                "`min_delay_secs` must not exceed `max_delay_secs`".to_string(),
            ));
        }
        if self.like_probability > 100 {
            return Err(AgentError::ConfigurationMissing(
                "`like_probability` must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineLogic {
    All,
    Any,
}

/// How an enabled signal with no extractable value participates in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Reject the post outright.
    Skip,
    /// Treat the value as 0 and re-evaluate the range check.
    Zero,
    /// The signal counts as passing.
    Allow,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalGate {
    pub enabled: bool,
    pub min: f64,
    /// Upper bound; 0 means unbounded above.
    pub max: f64,
}

impl Default for SignalGate {
    fn default() -> Self {
        Self {
            enabled: false,
            min: 0.0,
            max: 0.0,
        }
    }
}

impl SignalGate {
    pub fn passes(&self, value: f64) -> bool {
        value >= self.min && (self.max <= 0.0 || value <= self.max)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub logic: CombineLogic,
    pub missing: MissingPolicy,
    pub ethos: SignalGate,
    pub wallchain: SignalGate,
    pub kaito: SignalGate,
    pub tweetscout: SignalGate,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            logic: CombineLogic::Any,
            missing: MissingPolicy::Skip,
            ethos: SignalGate::default(),
            wallchain: SignalGate::default(),
            kaito: SignalGate::default(),
            tweetscout: SignalGate::default(),
        }
    }
}

impl ReputationConfig {
    pub fn gate(&self, kind: SignalKind) -> &SignalGate {
        match kind {
            SignalKind::Ethos => &self.ethos,
            SignalKind::Wallchain => &self.wallchain,
            SignalKind::Kaito => &self.kaito,
            SignalKind::Tweetscout => &self.tweetscout,
        }
    }
}
