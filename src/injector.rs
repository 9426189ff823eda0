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

use std::time::Duration;

use crate::constants::{COMMAND_SETTLE_MS, DIRECT_SETTLE_MS, PASTE_SETTLE_MS};
use crate::error::AgentError;
use crate::page::EditorHandle;

/// The three ways to get text into the rich-text editor, in escalation
/// order. Paste is closest to what the host framework expects; direct
/// assignment is the bluntest and only used when the event-based routes
/// leave the editor empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStrategy {
    Paste,
    InsertCommand,
    DirectAssign,
}

impl InsertStrategy {
    pub const ALL: [InsertStrategy; 3] = [
        InsertStrategy::Paste,
        InsertStrategy::InsertCommand,
        InsertStrategy::DirectAssign,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InsertStrategy::Paste => "paste",
            InsertStrategy::InsertCommand => "insert-command",
            InsertStrategy::DirectAssign => "direct",
        }
    }

    fn settle(self) -> Duration {
        let ms = match self {
            InsertStrategy::Paste => PASTE_SETTLE_MS,
            InsertStrategy::InsertCommand => COMMAND_SETTLE_MS,
            InsertStrategy::DirectAssign => DIRECT_SETTLE_MS,
        };
        Duration::from_millis(ms)
    }

    async fn attempt(self, editor: &dyn EditorHandle, text: &str) -> Result<(), AgentError> {
        match self {
            InsertStrategy::Paste => editor.dispatch_paste(text).await,
            InsertStrategy::InsertCommand => editor.exec_insert_text(text).await,
            InsertStrategy::DirectAssign => editor.assign_content(text).await,
        }
    }
}

/// Put `text` into the editor, escalating through the strategies until one
/// verifiably lands. Success is judged only by the editor's rendered text
/// being non-empty after the strategy's settle delay. The final framework
/// sync runs exactly once on the path out, success or not, so the host state
/// never diverges from the DOM.
pub async fn insert_text(
    editor: &dyn EditorHandle,
    text: &str,
) -> Result<InsertStrategy, AgentError> {
    editor.focus_and_clear().await?;

    let mut landed = None;
    for strategy in InsertStrategy::ALL {
        strategy.attempt(editor, text).await?;
        tokio::time::sleep(strategy.settle()).await;
        if !editor.rendered_text().await?.trim().is_empty() {
            landed = Some(strategy);
            break;
        }
    }

    editor.final_sync().await?;

    landed.ok_or_else(|| {
        AgentError::HostUiChanged(
            "reply editor stayed empty after every insertion strategy".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted editor: accepts text starting with the Nth strategy, records
    /// every call.
    struct MockEditor {
        accept_from: usize,
        content: Mutex<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockEditor {
        fn accepting_from(strategy_index: usize) -> Self {
            Self {
                accept_from: strategy_index,
                content: Mutex::new(String::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn maybe_accept(&self, index: usize, text: &str) {
            if index >= self.accept_from {
                *self.content.lock().unwrap() = text.to_string();
            }
        }
    }

    #[async_trait]
    impl EditorHandle for MockEditor {
        async fn focus_and_clear(&self) -> Result<(), AgentError> {
            self.record("focus_and_clear");
            self.content.lock().unwrap().clear();
            Ok(())
        }

        async fn dispatch_paste(&self, text: &str) -> Result<(), AgentError> {
            self.record("dispatch_paste");
            self.maybe_accept(0, text);
            Ok(())
        }

        async fn exec_insert_text(&self, text: &str) -> Result<(), AgentError> {
            self.record("exec_insert_text");
            self.maybe_accept(1, text);
            Ok(())
        }

        async fn assign_content(&self, text: &str) -> Result<(), AgentError> {
            self.record("assign_content");
            self.maybe_accept(2, text);
            Ok(())
        }

        async fn rendered_text(&self) -> Result<String, AgentError> {
            Ok(self.content.lock().unwrap().clone())
        }

        async fn final_sync(&self) -> Result<(), AgentError> {
            self.record("final_sync");
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn paste_success_skips_the_fallbacks() {
        let editor = MockEditor::accepting_from(0);
        let strategy = insert_text(&editor, "hello").await.unwrap();

        assert_eq!(strategy, InsertStrategy::Paste);
        let calls = editor.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c == "exec_insert_text"));
        assert!(!calls.iter().any(|c| c == "assign_content"));
        assert_eq!(calls.last().map(String::as_str), Some("final_sync"));
    }

    #[tokio::test(start_paused = true)]
    async fn escalates_to_direct_assignment_when_events_are_swallowed() {
        let editor = MockEditor::accepting_from(2);
        let strategy = insert_text(&editor, "hello").await.unwrap();

        assert_eq!(strategy, InsertStrategy::DirectAssign);
        let calls = editor.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c == "dispatch_paste"));
        assert!(calls.iter().any(|c| c == "exec_insert_text"));
        assert!(calls.iter().any(|c| c == "assign_content"));
        assert_eq!(editor.content.lock().unwrap().as_str(), "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn all_strategies_failing_still_runs_the_final_sync() {
        let editor = MockEditor::accepting_from(99);
        let err = insert_text(&editor, "hello").await.unwrap_err();

        assert!(matches!(err, AgentError::HostUiChanged(_)));
        let calls = editor.calls.lock().unwrap();
        assert_eq!(calls.last().map(String::as_str), Some("final_sync"));
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_only_render_counts_as_a_miss() {
        struct WhitespaceEditor(MockEditor);

        #[async_trait]
        impl EditorHandle for WhitespaceEditor {
            async fn focus_and_clear(&self) -> Result<(), AgentError> {
                self.0.focus_and_clear().await
            }
            async fn dispatch_paste(&self, _text: &str) -> Result<(), AgentError> {
                // The editor renders a bare zero-width placeholder line.
                *self.0.content.lock().unwrap() = "\n".to_string();
                Ok(())
            }
            async fn exec_insert_text(&self, text: &str) -> Result<(), AgentError> {
                *self.0.content.lock().unwrap() = text.to_string();
                self.0.record("exec_insert_text");
                Ok(())
            }
            async fn assign_content(&self, text: &str) -> Result<(), AgentError> {
                self.0.assign_content(text).await
            }
            async fn rendered_text(&self) -> Result<String, AgentError> {
                self.0.rendered_text().await
            }
            async fn final_sync(&self) -> Result<(), AgentError> {
                self.0.final_sync().await
            }
        }

        let editor = WhitespaceEditor(MockEditor::accepting_from(99));
        let strategy = insert_text(&editor, "hello").await.unwrap();
        assert_eq!(strategy, InsertStrategy::InsertCommand);
    }
}
