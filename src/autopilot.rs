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

//! The autopilot loop: scan, filter, pace, like, compose, send, repeat.
//! Configuration is reloaded at the top of every iteration, so edits to the
//! file take effect on the next post without a restart.

use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cleanup::clean_reply;
use crate::config::Config;
use crate::constants::{
    EDITOR_READY_SETTLE_MS, EDITOR_WAIT_ATTEMPTS, EDITOR_WAIT_INTERVAL_MS, ERROR_COOLDOWN_SECS,
    ONCE_MAX_ROUNDS, POST_SEND_WAIT_MS, SCAN_IDLE_WAIT_MS, SCROLL_STEP_PX, SEND_SETTLE_MS,
};
use crate::error::AgentError;
use crate::filter::{Decision, RejectReason, SessionView, should_process};
use crate::greeting;
use crate::history::HistoryStore;
use crate::injector::insert_text;
use crate::llm::ReplyBackend;
use crate::logger::{Logger, log_message, log_warning};
use crate::page::{HostPage, PostHandle, PostSnapshot, wait_until};
use crate::reputation::extract_signals;

/// What handling one accepted post ended with.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Reply submitted; the sent counter moved.
    Sent,
    /// Reply inserted but auto-send is off; the run pauses for manual review.
    InsertedForReview,
    /// The stop flag went up mid-candidate.
    Interrupted,
}

pub struct AutopilotSession {
    running: Arc<AtomicBool>,
    page: Box<dyn HostPage>,
    backend: Box<dyn ReplyBackend>,
    history: HistoryStore,
    logger: Option<Logger>,
    config_path: PathBuf,
    /// Post keys handled (or rejected) this session; cheap first-line dedup
    /// before the persistent history is consulted.
    processed: HashSet<String>,
    /// Keys currently mid-flight. Marked before the first await so a
    /// concurrent rescan can never pick the same post twice.
    processing: HashSet<String>,
    comments_sent: u32,
    max_comments_override: Option<u32>,
}

impl AutopilotSession {
    pub fn new(
        running: Arc<AtomicBool>,
        page: Box<dyn HostPage>,
        backend: Box<dyn ReplyBackend>,
        history: HistoryStore,
        logger: Option<Logger>,
        config_path: PathBuf,
        max_comments_override: Option<u32>,
    ) -> Self {
        Self {
            running,
            page,
            backend,
            history,
            logger,
            config_path,
            processed: HashSet::new(),
            processing: HashSet::new(),
            comments_sent: 0,
            max_comments_override,
        }
    }

    pub fn comments_sent(&self) -> u32 {
        self.comments_sent
    }

    fn stopped(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    fn status(&mut self, text: &str) {
        log_message(&mut self.logger, text);
    }

    fn comment_limit(&self, config: &Config) -> u32 {
        self.max_comments_override.unwrap_or(config.max_comments)
    }

    /// Stable identity a reply is recorded under: the status id when the post
    /// exposes one, the session key otherwise.
    fn reply_identity(snapshot: &PostSnapshot) -> &str {
        snapshot.id.as_deref().unwrap_or(&snapshot.key)
    }

    /// Unattended mode. Returns when the stop flag goes up, the comment limit
    /// is reached, auto-send is off and a reply awaits review, or the
    /// environment is torn down.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.status("READY");

        loop {
            if self.stopped() {
                self.status("STOPPED");
                return Ok(());
            }

            let config = Config::load(&self.config_path)?;
            if let Err(err) = config.validate() {
                log_warning(&mut self.logger, &err.friendly_message());
                self.status("STOPPED");
                return Ok(());
            }

            let limit = self.comment_limit(&config);
            if limit > 0 && self.comments_sent >= limit {
                self.status("LIMIT REACHED");
                return Ok(());
            }

            match self.run_iteration(&config, limit).await {
                Ok(Some(Outcome::InsertedForReview)) => {
                    self.status(
                        "Reply inserted. Auto-send is off; review and send it yourself. STOPPED",
                    );
                    return Ok(());
                }
                Ok(Some(Outcome::Interrupted)) => {
                    self.status("STOPPED");
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) if err.is_fatal() => {
                    log_warning(&mut self.logger, &err.friendly_message());
                    let _ = self.page.reload().await;
                    self.status("STOPPED");
                    return Ok(());
                }
                Err(err) => {
                    log_warning(&mut self.logger, &err.friendly_message());
                    let _ = self.page.close_composer().await;
                    tokio::time::sleep(Duration::from_secs(ERROR_COOLDOWN_SECS)).await;
                }
            }
        }
    }

    /// Single-post mode for the `once` subcommand: handle exactly one
    /// accepted post, scrolling a bounded number of rounds to find it.
    pub async fn run_once(&mut self) -> anyhow::Result<()> {
        let config = Config::load(&self.config_path)?;
        if let Err(err) = config.validate() {
            log_warning(&mut self.logger, &err.friendly_message());
            return Ok(());
        }

        for _ in 0..ONCE_MAX_ROUNDS {
            if self.stopped() {
                self.status("STOPPED");
                return Ok(());
            }

            let candidate = self.find_candidate(&config).await?;
            let Some((post, snapshot)) = candidate else {
                self.status("SCROLLING...");
                self.page.scroll_by(SCROLL_STEP_PX).await?;
                tokio::time::sleep(Duration::from_millis(SCAN_IDLE_WAIT_MS)).await;
                continue;
            };

            let key = snapshot.key.clone();
            let result = self.handle_candidate(post, snapshot, &config, 0).await;
            self.processing.remove(&key);
            match result {
                Ok(Outcome::Sent) => self.status("Reply sent."),
                Ok(Outcome::InsertedForReview) => {
                    self.status("Reply inserted. Review and send it yourself.")
                }
                Ok(Outcome::Interrupted) => self.status("STOPPED"),
                Err(err) => log_warning(&mut self.logger, &err.friendly_message()),
            }
            return Ok(());
        }

        self.status("No suitable post found. Scroll the feed and try again.");
        Ok(())
    }

    async fn run_iteration(
        &mut self,
        config: &Config,
        limit: u32,
    ) -> Result<Option<Outcome>, AgentError> {
        self.page.check_alive().await?;

        self.status("SCANNING...");
        let candidate = self.find_candidate(config).await?;

        let Some((post, snapshot)) = candidate else {
            self.status("SCROLLING...");
            self.page.scroll_by(SCROLL_STEP_PX).await?;
            tokio::time::sleep(Duration::from_millis(SCAN_IDLE_WAIT_MS)).await;
            return Ok(None);
        };

        let key = snapshot.key.clone();
        let result = self.handle_candidate(post, snapshot, config, limit).await;
        self.processing.remove(&key);
        match result {
            Ok(outcome) => {
                self.processed.insert(key);
                Ok(Some(outcome))
            }
            Err(err) => Err(err),
        }
    }

    /// Scan the rendered feed top to bottom and return the first post that
    /// passes every filter. Rejected posts get the do-not-reconsider mark so
    /// later scans skip them without re-evaluating.
    async fn find_candidate(
        &mut self,
        config: &Config,
    ) -> Result<Option<(Box<dyn PostHandle>, PostSnapshot)>, AgentError> {
        let posts = self.page.scan_posts().await?;

        for post in posts {
            let snapshot = post.snapshot().await?;
            if !snapshot.attached {
                continue;
            }

            let session = SessionView {
                already_processed: self.processed.contains(&snapshot.key),
                mid_processing: self.processing.contains(&snapshot.key),
                in_reply_history: self.history.has_replied(Self::reply_identity(&snapshot)),
            };
            let signals = extract_signals(&snapshot);

            match should_process(&snapshot, &signals, session, config) {
                Decision::Accept => {
                    // Claim the post before the first await on the action
                    // path; a rescan during the humanization delay must not
                    // pick it again.
                    self.processing.insert(post.key().to_string());
                    post.mark_processed().await?;
                    return Ok(Some((post, snapshot)));
                }
                Decision::Reject(RejectReason::MidProcessing) => {}
                Decision::Reject(_) => {
                    post.mark_processed().await?;
                    self.processed.insert(snapshot.key.clone());
                }
            }
        }

        Ok(None)
    }

    async fn handle_candidate(
        &mut self,
        post: Box<dyn PostHandle>,
        snapshot: PostSnapshot,
        config: &Config,
        limit: u32,
    ) -> Result<Outcome, AgentError> {
        let limit_label = if limit == 0 {
            "∞".to_string()
        } else {
            limit.to_string()
        };
        self.status(&format!(
            "RUNNING {}/{}",
            self.comments_sent + 1,
            limit_label
        ));

        post.scroll_into_view().await?;

        // Humanization pause before touching the post. Drawn up front so the
        // RNG never lives across an await.
        let (delay_secs, like_roll, like_pause_ms) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(config.min_delay_secs..=config.max_delay_secs),
                rng.gen_bool(f64::from(config.like_probability.min(100)) / 100.0),
                rng.gen_range(1000..=2000u64),
            )
        };
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        if self.stopped() {
            return Ok(Outcome::Interrupted);
        }

        if config.auto_like && like_roll {
            self.status("LIKING...");
            if post.click_like().await? {
                tokio::time::sleep(Duration::from_millis(like_pause_ms)).await;
            }
            if self.stopped() {
                return Ok(Outcome::Interrupted);
            }
        }

        if !post.click_reply().await? {
            return Err(AgentError::HostUiChanged(
                "reply button not found on the post".to_string(),
            ));
        }

        let page = self.page.as_ref();
        let editor_ready = wait_until(
            EDITOR_WAIT_ATTEMPTS,
            Duration::from_millis(EDITOR_WAIT_INTERVAL_MS),
            move || async move { Ok(page.reply_editor().await?.is_some()) },
        )
        .await?;
        if !editor_ready {
            return Err(AgentError::HostUiChanged(
                "reply composer never appeared".to_string(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(EDITOR_READY_SETTLE_MS)).await;
        if self.stopped() {
            let _ = self.page.close_composer().await;
            return Ok(Outcome::Interrupted);
        }

        let editor = self.page.reply_editor().await?.ok_or_else(|| {
            AgentError::HostUiChanged("reply composer closed while settling".to_string())
        })?;

        let greeting = greeting::classify(&snapshot.text);
        let reply = match greeting {
            // Trivial greetings are answered from the local pools; template
            // output is already clean, the pipeline would only mangle it.
            Some(kind) if config.greeting_shortcut => {
                let mut rng = rand::thread_rng();
                greeting::canned_reply(kind, &config.language, &mut rng)
            }
            _ => {
                self.status("GENERATING...");
                let raw = self.backend.generate(&snapshot.text, config, greeting).await?;
                let cleaned = clean_reply(&raw, &mut self.history, Utc::now());
                self.history
                    .save()
                    .map_err(|e| AgentError::Other(e.to_string()))?;
                if cleaned.is_empty() {
                    return Err(AgentError::Other(
                        "reply was empty after cleanup".to_string(),
                    ));
                }
                cleaned
            }
        };
        if self.stopped() {
            let _ = self.page.close_composer().await;
            return Ok(Outcome::Interrupted);
        }

        let strategy = insert_text(editor.as_ref(), &reply).await?;
        self.status(&format!("Inserted reply via {}", strategy.name()));
        if self.stopped() {
            let _ = self.page.close_composer().await;
            return Ok(Outcome::Interrupted);
        }

        if !config.auto_send {
            return Ok(Outcome::InsertedForReview);
        }

        tokio::time::sleep(Duration::from_millis(SEND_SETTLE_MS)).await;
        if self.stopped() {
            let _ = self.page.close_composer().await;
            return Ok(Outcome::Interrupted);
        }

        if !self.page.click_submit().await? {
            return Err(AgentError::HostUiChanged(
                "submit button missing or disabled".to_string(),
            ));
        }

        self.comments_sent += 1;
        self.history
            .record_reply(Self::reply_identity(&snapshot), Utc::now());
        self.history
            .save()
            .map_err(|e| AgentError::Other(e.to_string()))?;
        self.status("SENT");

        tokio::time::sleep(Duration::from_millis(POST_SEND_WAIT_MS)).await;
        self.page.close_composer().await?;

        Ok(Outcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::GreetingKind;
    use crate::page::EditorHandle;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct PageState {
        posts: Vec<PostSnapshot>,
        editor_open: bool,
        editor_text: String,
        submitted: Vec<String>,
        likes: u32,
        scrolls: u32,
        reloads: u32,
        composer_closes: u32,
    }

    struct MockPage {
        state: Arc<Mutex<PageState>>,
    }

    struct MockPost {
        state: Arc<Mutex<PageState>>,
        index: usize,
        key: String,
    }

    struct MockEditor {
        state: Arc<Mutex<PageState>>,
    }

    #[async_trait]
    impl HostPage for MockPage {
        async fn scan_posts(&self) -> Result<Vec<Box<dyn PostHandle>>, AgentError> {
            let keys: Vec<String> = {
                let state = self.state.lock().unwrap();
                state.posts.iter().map(|p| p.key.clone()).collect()
            };
            Ok(keys
                .into_iter()
                .enumerate()
                .map(|(index, key)| {
                    Box::new(MockPost {
                        state: Arc::clone(&self.state),
                        index,
                        key,
                    }) as Box<dyn PostHandle>
                })
                .collect())
        }

        async fn reply_editor(&self) -> Result<Option<Box<dyn EditorHandle>>, AgentError> {
            if self.state.lock().unwrap().editor_open {
                Ok(Some(Box::new(MockEditor {
                    state: Arc::clone(&self.state),
                })))
            } else {
                Ok(None)
            }
        }

        async fn click_submit(&self) -> Result<bool, AgentError> {
            let mut state = self.state.lock().unwrap();
            let text = state.editor_text.clone();
            state.submitted.push(text);
            state.editor_open = false;
            Ok(true)
        }

        async fn close_composer(&self) -> Result<(), AgentError> {
            let mut state = self.state.lock().unwrap();
            state.editor_open = false;
            state.composer_closes += 1;
            Ok(())
        }

        async fn scroll_by(&self, _pixels: i64) -> Result<(), AgentError> {
            self.state.lock().unwrap().scrolls += 1;
            Ok(())
        }

        async fn check_alive(&self) -> Result<(), AgentError> {
            Ok(())
        }

        async fn reload(&self) -> Result<(), AgentError> {
            self.state.lock().unwrap().reloads += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl PostHandle for MockPost {
        fn key(&self) -> &str {
            &self.key
        }

        async fn snapshot(&self) -> Result<PostSnapshot, AgentError> {
            Ok(self.state.lock().unwrap().posts[self.index].clone())
        }

        async fn mark_processed(&self) -> Result<(), AgentError> {
            self.state.lock().unwrap().posts[self.index].processed = true;
            Ok(())
        }

        async fn scroll_into_view(&self) -> Result<(), AgentError> {
            Ok(())
        }

        async fn click_like(&self) -> Result<bool, AgentError> {
            self.state.lock().unwrap().likes += 1;
            Ok(true)
        }

        async fn click_reply(&self) -> Result<bool, AgentError> {
            self.state.lock().unwrap().editor_open = true;
            Ok(true)
        }
    }

    #[async_trait]
    impl EditorHandle for MockEditor {
        async fn focus_and_clear(&self) -> Result<(), AgentError> {
            self.state.lock().unwrap().editor_text.clear();
            Ok(())
        }

        async fn dispatch_paste(&self, text: &str) -> Result<(), AgentError> {
            self.state.lock().unwrap().editor_text = text.to_string();
            Ok(())
        }

        async fn exec_insert_text(&self, text: &str) -> Result<(), AgentError> {
            self.state.lock().unwrap().editor_text = text.to_string();
            Ok(())
        }

        async fn assign_content(&self, text: &str) -> Result<(), AgentError> {
            self.state.lock().unwrap().editor_text = text.to_string();
            Ok(())
        }

        async fn rendered_text(&self) -> Result<String, AgentError> {
            Ok(self.state.lock().unwrap().editor_text.clone())
        }

        async fn final_sync(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    struct MockBackend {
        reply: String,
        calls: AtomicU32,
    }

    impl MockBackend {
        fn returning(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ReplyBackend for MockBackend {
        async fn generate(
            &self,
            _post_text: &str,
            _config: &Config,
            _greeting: Option<GreetingKind>,
        ) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }

        async fn list_models(&self, _config: &Config) -> Result<Vec<String>, AgentError> {
            Ok(vec!["mock".to_string()])
        }
    }

    fn post(key: &str, id: &str, text: &str) -> PostSnapshot {
        PostSnapshot {
            key: key.to_string(),
            id: Some(id.to_string()),
            author: Some("alice".to_string()),
            text: text.to_string(),
            verified: true,
            attached: true,
            ..PostSnapshot::default()
        }
    }

    struct Fixture {
        state: Arc<Mutex<PageState>>,
        running: Arc<AtomicBool>,
        config_path: PathBuf,
        history_path: PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture(posts: Vec<PostSnapshot>, config_toml: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("replypilot.toml");
        std::fs::write(&config_path, config_toml).unwrap();
        let history_path = dir.path().join("history.json");
        Fixture {
            state: Arc::new(Mutex::new(PageState {
                posts,
                ..PageState::default()
            })),
            running: Arc::new(AtomicBool::new(true)),
            config_path,
            history_path,
            _dir: dir,
        }
    }

    fn session(fx: &Fixture, backend: MockBackend, limit: Option<u32>) -> AutopilotSession {
        AutopilotSession::new(
            Arc::clone(&fx.running),
            Box::new(MockPage {
                state: Arc::clone(&fx.state),
            }),
            Box::new(backend),
            HistoryStore::load(&fx.history_path).unwrap(),
            None,
            fx.config_path.clone(),
            limit,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn auto_send_off_inserts_and_stops_without_counting() {
        let fx = fixture(
            vec![post("rp-1", "100", "thoughts on modular rollups")],
            "model = \"test\"\nauto_send = false\n",
        );
        let mut session = session(&fx, MockBackend::returning("Strong point."), None);

        session.run().await.unwrap();

        assert_eq!(session.comments_sent(), 0);
        let state = fx.state.lock().unwrap();
        assert_eq!(state.editor_text, "Strong point.");
        assert!(state.submitted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_path_counts_and_records_history() {
        let fx = fixture(
            vec![post("rp-1", "100", "thoughts on modular rollups")],
            "model = \"test\"\nauto_send = true\nmax_comments = 1\n",
        );
        let mut session = session(&fx, MockBackend::returning("Strong point."), None);

        session.run().await.unwrap();

        assert_eq!(session.comments_sent(), 1);
        {
            let state = fx.state.lock().unwrap();
            assert_eq!(state.submitted, vec!["Strong point.".to_string()]);
        }
        let history = HistoryStore::load(&fx.history_path).unwrap();
        assert!(history.has_replied("100"));
    }

    #[tokio::test(start_paused = true)]
    async fn already_replied_posts_are_skipped_and_the_feed_scrolls() {
        let fx = fixture(
            vec![post("rp-1", "100", "gm")],
            "model = \"test\"\nauto_send = true\nmax_comments = 1\n",
        );
        {
            let mut history = HistoryStore::load(&fx.history_path).unwrap();
            history.record_reply("100", Utc::now());
            history.save().unwrap();
        }
        let mut session = session(&fx, MockBackend::returning("unused"), None);

        // No fresh candidate exists; stop the run after the first scroll so
        // the loop terminates.
        let running = Arc::clone(&fx.running);
        let state = Arc::clone(&fx.state);
        let watcher = tokio::spawn(async move {
            loop {
                if state.lock().unwrap().scrolls > 0 {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        session.run().await.unwrap();
        watcher.await.unwrap();

        assert_eq!(session.comments_sent(), 0);
        let state = fx.state.lock().unwrap();
        assert!(state.scrolls > 0);
        assert!(state.posts[0].processed);
    }

    #[tokio::test(start_paused = true)]
    async fn greeting_shortcut_answers_without_calling_the_backend() {
        let fx = fixture(
            vec![post("rp-1", "100", "gm frens")],
            "model = \"test\"\nauto_send = true\nmax_comments = 1\ngreeting_shortcut = true\n",
        );
        let backend = MockBackend::returning("unused");
        let mut session = session(&fx, backend, None);

        session.run().await.unwrap();

        assert_eq!(session.comments_sent(), 1);
        let state = fx.state.lock().unwrap();
        assert!(!state.submitted[0].is_empty());
        // The canned pool was used; the backend reply never appears.
        assert_ne!(state.submitted[0], "unused");
    }

    #[tokio::test(start_paused = true)]
    async fn override_limit_wins_over_the_config_limit() {
        let fx = fixture(
            vec![
                post("rp-1", "100", "take one on restaking"),
                post("rp-2", "101", "take two on restaking"),
            ],
            "model = \"test\"\nauto_send = true\nmax_comments = 10\n",
        );
        let mut session = session(&fx, MockBackend::returning("Interesting angle."), Some(1));

        session.run().await.unwrap();

        assert_eq!(session.comments_sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_reload_the_page_and_stop() {
        struct DyingPage {
            inner: MockPage,
        }

        #[async_trait]
        impl HostPage for DyingPage {
            async fn scan_posts(&self) -> Result<Vec<Box<dyn PostHandle>>, AgentError> {
                Err(AgentError::EnvironmentInvalidated("ws closed".to_string()))
            }
            async fn reply_editor(&self) -> Result<Option<Box<dyn EditorHandle>>, AgentError> {
                self.inner.reply_editor().await
            }
            async fn click_submit(&self) -> Result<bool, AgentError> {
                self.inner.click_submit().await
            }
            async fn close_composer(&self) -> Result<(), AgentError> {
                self.inner.close_composer().await
            }
            async fn scroll_by(&self, pixels: i64) -> Result<(), AgentError> {
                self.inner.scroll_by(pixels).await
            }
            async fn check_alive(&self) -> Result<(), AgentError> {
                self.inner.check_alive().await
            }
            async fn reload(&self) -> Result<(), AgentError> {
                self.inner.reload().await
            }
        }

        let fx = fixture(vec![], "model = \"test\"\n");
        let mut session = AutopilotSession::new(
            Arc::clone(&fx.running),
            Box::new(DyingPage {
                inner: MockPage {
                    state: Arc::clone(&fx.state),
                },
            }),
            Box::new(MockBackend::returning("unused")),
            HistoryStore::load(&fx.history_path).unwrap(),
            None,
            fx.config_path.clone(),
            None,
        );

        session.run().await.unwrap();

        assert_eq!(fx.state.lock().unwrap().reloads, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_connection_is_detected_before_any_post_is_touched() {
        struct DeadProbePage {
            inner: MockPage,
        }

        #[async_trait]
        impl HostPage for DeadProbePage {
            async fn scan_posts(&self) -> Result<Vec<Box<dyn PostHandle>>, AgentError> {
                self.inner.scan_posts().await
            }
            async fn reply_editor(&self) -> Result<Option<Box<dyn EditorHandle>>, AgentError> {
                self.inner.reply_editor().await
            }
            async fn click_submit(&self) -> Result<bool, AgentError> {
                self.inner.click_submit().await
            }
            async fn close_composer(&self) -> Result<(), AgentError> {
                self.inner.close_composer().await
            }
            async fn scroll_by(&self, pixels: i64) -> Result<(), AgentError> {
                self.inner.scroll_by(pixels).await
            }
            async fn check_alive(&self) -> Result<(), AgentError> {
                Err(AgentError::EnvironmentInvalidated(
                    "browser closed".to_string(),
                ))
            }
            async fn reload(&self) -> Result<(), AgentError> {
                self.inner.reload().await
            }
        }

        // The feed holds a perfectly good candidate; the liveness probe must
        // still win and end the run without replying to it.
        let fx = fixture(
            vec![post("rp-1", "100", "thoughts on modular rollups")],
            "model = \"test\"\nauto_send = true\n",
        );
        let mut session = AutopilotSession::new(
            Arc::clone(&fx.running),
            Box::new(DeadProbePage {
                inner: MockPage {
                    state: Arc::clone(&fx.state),
                },
            }),
            Box::new(MockBackend::returning("unused")),
            HistoryStore::load(&fx.history_path).unwrap(),
            None,
            fx.config_path.clone(),
            None,
        );

        session.run().await.unwrap();

        assert_eq!(session.comments_sent(), 0);
        let state = fx.state.lock().unwrap();
        assert_eq!(state.reloads, 1);
        assert!(state.submitted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_request_while_composing_closes_the_composer_without_sending() {
        let fx = fixture(
            vec![post("rp-1", "100", "thoughts on modular rollups")],
            "model = \"test\"\nauto_send = true\nmax_comments = 1\n",
        );
        let mut session = session(&fx, MockBackend::returning("Strong point."), None);

        // Raise the stop flag as soon as the composer opens.
        let running = Arc::clone(&fx.running);
        let state = Arc::clone(&fx.state);
        let watcher = tokio::spawn(async move {
            loop {
                if state.lock().unwrap().editor_open {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        session.run().await.unwrap();
        watcher.await.unwrap();

        assert_eq!(session.comments_sent(), 0);
        let state = fx.state.lock().unwrap();
        assert!(state.submitted.is_empty());
        assert!(state.composer_closes > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_once_handles_exactly_one_post() {
        let fx = fixture(
            vec![
                post("rp-1", "100", "take one on restaking"),
                post("rp-2", "101", "take two on restaking"),
            ],
            "model = \"test\"\nauto_send = true\n",
        );
        let mut session = session(&fx, MockBackend::returning("Interesting angle."), None);

        session.run_once().await.unwrap();

        assert_eq!(session.comments_sent(), 1);
        assert_eq!(fx.state.lock().unwrap().submitted.len(), 1);
    }
}
