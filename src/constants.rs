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

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_FEED_URL: &str = "https://x.com/home";
pub const DEFAULT_CONFIG_FILE: &str = "replypilot.toml";
pub const DEFAULT_HISTORY_FILE: &str = "replypilot-history.json";

/// Hard ceiling on any outgoing reply, enforced again as the last cleanup
/// stage no matter what the backend returned.
pub const MAX_REPLY_CHARS: usize = 280;

/// Post text is truncated to this many characters before it is embedded in
/// the generation prompt.
pub const MAX_POST_PROMPT_CHARS: usize = 1000;

pub const GENERATE_TIMEOUT_SECS: u64 = 45;

/// Reply history is capped at this many entries; on overflow it is trimmed to
/// the most recent `REPLY_HISTORY_TRIM` before the new entry is pushed.
pub const REPLY_HISTORY_CAP: usize = 1000;
pub const REPLY_HISTORY_TRIM: usize = 900;

/// A handle mentioned within this window is replaced with a neutral
/// placeholder instead of being mentioned again.
pub const MENTION_TTL_HOURS: i64 = 24;

/// Greeting template pools are cut off here after the lead x tail expansion.
pub const GREETING_POOL_CAP: usize = 140;

// Injection settle times. Each strategy gets its own delay before the editor
// is re-checked, mirroring how long the host framework takes to reconcile.
pub const PASTE_SETTLE_MS: u64 = 300;
pub const COMMAND_SETTLE_MS: u64 = 200;
pub const DIRECT_SETTLE_MS: u64 = 200;
pub const REFOCUS_DELAY_MS: u64 = 100;

// Composer choreography.
pub const EDITOR_WAIT_ATTEMPTS: u32 = 50;
pub const EDITOR_WAIT_INTERVAL_MS: u64 = 100;
pub const EDITOR_READY_SETTLE_MS: u64 = 500;
pub const SEND_SETTLE_MS: u64 = 3000;
pub const POST_SEND_WAIT_MS: u64 = 3000;

// Scanning pacing.
pub const SCROLL_STEP_PX: i64 = 500;
pub const SCAN_IDLE_WAIT_MS: u64 = 2000;
pub const ERROR_COOLDOWN_SECS: u64 = 5;

/// Scan/scroll rounds a single-post (`once`) run is allowed before giving up.
pub const ONCE_MAX_ROUNDS: u32 = 20;

pub const DEFAULT_TASK_INSTRUCTION: &str =
    "You are a regular user of this platform. Read the post and write a natural, engaged reply.";

pub const PROMPT_TEMPLATE: &str = r#"{language_block}

CONTEXT: You are a real person replying to a post on X (Twitter).
POST: "{post_text}"

YOUR TASK: {task}

STRICT RULES:
1. Follow the OUTPUT LANGUAGE strictly.
2. Do NOT translate the post.
3. Do NOT repeat the post content.
4. Do NOT summarize the post.
5. Write a reaction, opinion, or question based on the post.
6. Keep it short (under 280 characters).
7. Output ONLY the text of the reply. No quotes, no preambles.
"#;

/// Used instead of `PROMPT_TEMPLATE` when the post was classified as a
/// trivial greeting but the local shortcut is disabled. Keeps the model from
/// rambling over a two-word post.
pub const GREETING_PROMPT_TEMPLATE: &str = r#"{language_block}

The post is a short "{category}" greeting. Reply with ONE short, friendly
greeting of the same kind. No questions, no commentary, no quotes.
Output ONLY the reply text.
"#;

pub const LANGUAGE_BLOCK_EN: &str = "OUTPUT LANGUAGE: ENGLISH. Write ONLY in English. Even if the post is in another language, your reply MUST be in English.";
pub const LANGUAGE_BLOCK_UK: &str = "OUTPUT LANGUAGE: UKRAINIAN (Українська). Write ONLY in Ukrainian.";
pub const LANGUAGE_BLOCK_RU: &str = "OUTPUT LANGUAGE: RUSSIAN (Русский). Write ONLY in Russian.";

/// The neutral substitute for a handle that was already mentioned within the
/// 24h window.
pub const MENTION_PLACEHOLDER: &str = "them";
