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

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::AgentError;

/// Everything the filter and extractor need from one rendered post, gathered
/// in a single page round-trip. Materialized fresh on every scan pass; never
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct PostSnapshot {
    /// Session-scoped tag the scanner stamps on the article element. Unique
    /// per page load, survives re-renders that keep the node.
    pub key: String,
    /// Extracted status id, when the post exposes a /status/ link.
    pub id: Option<String>,
    /// Author handle without the '@'.
    pub author: Option<String>,
    pub text: String,
    pub verified: bool,
    pub is_reply: bool,
    /// The do-not-reconsider mark written into the DOM on accept or reject.
    pub processed: bool,
    /// Still attached and visible in the live document.
    pub attached: bool,
    /// Structured reputation attributes found on the post element or its
    /// first matching descendant, keyed by attribute name.
    pub signal_attrs: HashMap<String, String>,
    /// Short text nodes from the post subtree, for keyword-based signal
    /// extraction. The extractor enforces the 80-node / 120-char limits.
    pub badge_texts: Vec<String>,
}

#[async_trait]
pub trait PostHandle: Send + Sync {
    fn key(&self) -> &str;
    async fn snapshot(&self) -> Result<PostSnapshot, AgentError>;
    /// Writes the session do-not-reconsider mark into the DOM.
    async fn mark_processed(&self) -> Result<(), AgentError>;
    async fn scroll_into_view(&self) -> Result<(), AgentError>;
    /// Returns false when the like button is missing or already active.
    async fn click_like(&self) -> Result<bool, AgentError>;
    /// Returns false when the reply trigger is missing.
    async fn click_reply(&self) -> Result<bool, AgentError>;
}

/// The reply composer's rich-text surface. Each operation maps to one
/// injection primitive; success is observable only through `rendered_text`.
#[async_trait]
pub trait EditorHandle: Send + Sync {
    /// Focus, click, select-all, delete.
    async fn focus_and_clear(&self) -> Result<(), AgentError>;
    /// Dispatch a synthetic paste event carrying the plain-text payload.
    async fn dispatch_paste(&self, text: &str) -> Result<(), AgentError>;
    /// Issue a text-insertion editing command.
    async fn exec_insert_text(&self, text: &str) -> Result<(), AgentError>;
    /// Write directly into the content property and fire the full
    /// input/change/keyup/keydown event family, including an input event
    /// tagged with the inserted text.
    async fn assign_content(&self, text: &str) -> Result<(), AgentError>;
    async fn rendered_text(&self) -> Result<String, AgentError>;
    /// Trailing input/change/blur dispatch plus blur-and-refocus, forcing the
    /// host framework to reconcile its state with the DOM.
    async fn final_sync(&self) -> Result<(), AgentError>;
}

#[async_trait]
pub trait HostPage: Send + Sync {
    /// All currently-rendered posts, top-to-bottom as rendered.
    async fn scan_posts(&self) -> Result<Vec<Box<dyn PostHandle>>, AgentError>;
    /// The visible reply editor, dialog-hosted editors first. None while the
    /// composer is still rendering.
    async fn reply_editor(&self) -> Result<Option<Box<dyn EditorHandle>>, AgentError>;
    /// Returns false when the submit button is missing or disabled.
    async fn click_submit(&self) -> Result<bool, AgentError>;
    async fn close_composer(&self) -> Result<(), AgentError>;
    async fn scroll_by(&self, pixels: i64) -> Result<(), AgentError>;
    /// Cheap probe that the page and transport are still usable; failure maps
    /// to `EnvironmentInvalidated`.
    async fn check_alive(&self) -> Result<(), AgentError>;
    async fn reload(&self) -> Result<(), AgentError>;
}

/// Poll `probe` up to `attempts` times, `interval` apart, until it reports
/// true. Returns false when the attempt budget runs out. Every composer/DOM
/// settling wait in the agent goes through this instead of ad hoc
/// interval/timeout pairs.
pub async fn wait_until<F, Fut>(
    attempts: u32,
    interval: Duration,
    mut probe: F,
) -> Result<bool, AgentError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool, AgentError>> + Send,
{
    for _ in 0..attempts {
        if probe().await? {
            return Ok(true);
        }
        tokio::time::sleep(interval).await;
    }
    Ok(false)
}
