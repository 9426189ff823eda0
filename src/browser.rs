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

//! Chrome DevTools Protocol implementation of the page traits. All DOM work
//! happens inside evaluated JavaScript; Rust only ever sees scalar results
//! and JSON snapshots, so one page round-trip per operation.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::constants::REFOCUS_DELAY_MS;
use crate::error::AgentError;
use crate::page::{EditorHandle, HostPage, PostHandle, PostSnapshot};
use crate::reputation::SignalKind;

/// Transport-level failures mean the tab or the websocket is gone; nothing
/// in this session can be retried against it.
fn map_cdp_message(message: &str) -> AgentError {
    let lower = message.to_lowercase();
    let torn_down = [
        "websocket",
        "connection",
        "channel",
        "browser closed",
        "not attached",
        "target closed",
        "session closed",
    ];
    if torn_down.iter().any(|p| lower.contains(p)) {
        AgentError::EnvironmentInvalidated(message.to_string())
    } else {
        AgentError::Other(message.to_string())
    }
}

fn map_cdp(err: CdpError) -> AgentError {
    map_cdp_message(&err.to_string())
}

/// Render `text` as a JavaScript string literal. JSON string syntax is a
/// subset of JS, so serde_json does the escaping.
fn js_literal(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

/// Finds the visible reply editor, dialog-hosted editors first. Inlined into
/// every editor snippet so each evaluation resolves against the live DOM.
const FIND_EDITOR_JS: &str = r#"
const findEditor = () => {
    const dialog = document.querySelector('[role="dialog"]');
    const scopes = dialog ? [dialog, document] : [document];
    const selectors = [
        '[data-testid="tweetTextarea_0"]',
        '[role="textbox"][contenteditable="true"]',
        '.public-DraftEditor-content',
        '[contenteditable="true"]',
    ];
    for (const scope of scopes) {
        for (const sel of selectors) {
            for (const el of scope.querySelectorAll(sel)) {
                if (el.offsetParent !== null) return el;
            }
        }
    }
    return null;
};
"#;

/// Tags every rendered post with a session-unique key and returns the full
/// snapshot batch as JSON. Built once; the probe attribute list comes from
/// the signal definitions so the two never drift apart.
static SCAN_JS: Lazy<String> = Lazy::new(|| {
    let probes: Vec<&str> = SignalKind::ALL
        .iter()
        .flat_map(|kind| kind.probe_attributes().iter().copied())
        .collect();
    let probes_json = serde_json::to_string(&probes).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"(() => {{
    const probes = {probes_json};
    const replyPrefixes = ["Replying to @", "У відповідь @", "В ответ @"];
    if (!window.__rpSeq) window.__rpSeq = 0;
    const out = [];
    for (const article of document.querySelectorAll('article[data-testid="tweet"]')) {{
        if (!article.dataset.rpKey) {{
            window.__rpSeq += 1;
            article.dataset.rpKey = "rp-" + window.__rpSeq;
        }}

        const textNode = article.querySelector('[data-testid="tweetText"]');
        let id = null;
        const link = article.querySelector('a[href*="/status/"]');
        if (link) {{
            const m = (link.getAttribute("href") || "").match(/\/status\/(\d+)/);
            if (m) id = m[1];
        }}
        let author = null;
        const nameNode = article.querySelector('[data-testid="User-Name"]');
        if (nameNode) {{
            const m = (nameNode.innerText || "").match(/@([A-Za-z0-9_]{{1,15}})/);
            if (m) author = m[1];
        }}

        const verified = !!article.querySelector(
            'svg[data-testid="icon-verified"], svg[aria-label="Verified account"]'
        );
        const head = (article.innerText || "").slice(0, 200);
        const isReply = replyPrefixes.some((p) => head.includes(p));

        const attrs = {{}};
        for (const name of probes) {{
            if (article.hasAttribute(name)) {{
                attrs[name] = article.getAttribute(name);
                continue;
            }}
            const holder = article.querySelector("[" + name + "]");
            if (holder) attrs[name] = holder.getAttribute(name);
        }}

        const badges = [];
        for (const span of article.querySelectorAll("span")) {{
            if (badges.length >= 80) break;
            const t = (span.innerText || "").trim();
            if (t && t.length <= 120) badges.push(t);
        }}

        out.push({{
            key: article.dataset.rpKey,
            id: id,
            author: author,
            text: textNode ? textNode.innerText : "",
            verified: verified,
            is_reply: isReply,
            processed: article.dataset.rpProcessed === "1",
            signal_attrs: attrs,
            badge_texts: badges,
        }});
    }}
    return JSON.stringify(out);
}})()"#
    )
});

/// Snapshot shape produced by the scan script.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    key: String,
    id: Option<String>,
    author: Option<String>,
    text: String,
    verified: bool,
    is_reply: bool,
    processed: bool,
    #[serde(default)]
    signal_attrs: HashMap<String, String>,
    #[serde(default)]
    badge_texts: Vec<String>,
}

impl From<RawSnapshot> for PostSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        PostSnapshot {
            key: raw.key,
            id: raw.id,
            author: raw.author,
            text: raw.text,
            verified: raw.verified,
            is_reply: raw.is_reply,
            processed: raw.processed,
            attached: true,
            signal_attrs: raw.signal_attrs,
            badge_texts: raw.badge_texts,
        }
    }
}

/// Owns the browser process (or connection) and the CDP event pump for the
/// lifetime of a run.
pub struct CdpSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Arc<Page>,
}

impl CdpSession {
    /// Launch a visible Chrome, or attach to a running one when `ws_url` is
    /// configured, then open the feed.
    pub async fn start(config: &Config) -> Result<Self, AgentError> {
        let (browser, mut handler) = match config.ws_url.as_deref() {
            Some(ws_url) => Browser::connect(ws_url).await.map_err(map_cdp)?,
            None => {
                let mut builder = BrowserConfig::builder().with_head();
                if let Some(dir) = config.user_data_dir.as_ref() {
                    builder = builder.user_data_dir(dir);
                }
                let browser_config = builder
                    .build()
                    .map_err(AgentError::ConfigurationMissing)?;
                Browser::launch(browser_config).await.map_err(map_cdp)?
            }
        };

        // The handler future must be polled for the whole session or every
        // CDP call deadlocks.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page(config.feed_url.as_str())
            .await
            .map_err(map_cdp)?;

        Ok(Self {
            browser,
            handler_task,
            page: Arc::new(page),
        })
    }

    pub fn host_page(&self) -> Box<dyn HostPage> {
        Box::new(CdpPage {
            page: Arc::clone(&self.page),
        })
    }

    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

struct CdpPage {
    page: Arc<Page>,
}

impl CdpPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, js: &str) -> Result<T, AgentError> {
        eval_on(&self.page, js).await
    }
}

async fn eval_on<T: serde::de::DeserializeOwned>(page: &Page, js: &str) -> Result<T, AgentError> {
    page.evaluate(js)
        .await
        .map_err(map_cdp)?
        .into_value::<T>()
        .map_err(|e| AgentError::Other(format!("unexpected script result: {}", e)))
}

#[async_trait]
impl HostPage for CdpPage {
    async fn scan_posts(&self) -> Result<Vec<Box<dyn PostHandle>>, AgentError> {
        let json: String = self.eval(SCAN_JS.as_str()).await?;
        let raw: Vec<RawSnapshot> = serde_json::from_str(&json)
            .map_err(|e| AgentError::Other(format!("malformed scan result: {}", e)))?;

        Ok(raw
            .into_iter()
            .map(|r| {
                Box::new(CdpPost {
                    page: Arc::clone(&self.page),
                    snapshot: r.into(),
                }) as Box<dyn PostHandle>
            })
            .collect())
    }

    async fn reply_editor(&self) -> Result<Option<Box<dyn EditorHandle>>, AgentError> {
        let js = format!("(() => {{ {FIND_EDITOR_JS} return findEditor() !== null; }})()");
        let present: bool = self.eval(&js).await?;
        if present {
            Ok(Some(Box::new(CdpEditor {
                page: Arc::clone(&self.page),
            })))
        } else {
            Ok(None)
        }
    }

    async fn click_submit(&self) -> Result<bool, AgentError> {
        let js = r#"(() => {
            const button = document.querySelector(
                '[data-testid="tweetButton"], [data-testid="tweetButtonInline"]'
            );
            if (!button) return false;
            if (button.disabled || button.getAttribute("aria-disabled") === "true") return false;
            button.click();
            return true;
        })()"#;
        self.eval(js).await
    }

    async fn close_composer(&self) -> Result<(), AgentError> {
        let js = r#"(() => {
            const close = document.querySelector('[data-testid="app-bar-close"]');
            if (close) { close.click(); return true; }
            document.body.dispatchEvent(new KeyboardEvent("keydown", {
                key: "Escape", code: "Escape", bubbles: true,
            }));
            return false;
        })()"#;
        let _: bool = self.eval(js).await?;
        Ok(())
    }

    async fn scroll_by(&self, pixels: i64) -> Result<(), AgentError> {
        let js = format!(
            r#"(() => {{ window.scrollBy({{ top: {pixels}, behavior: "smooth" }}); return true; }})()"#
        );
        let _: bool = self.eval(&js).await?;
        Ok(())
    }

    async fn check_alive(&self) -> Result<(), AgentError> {
        let probe: i64 = self.eval("1 + 1").await.map_err(|e| {
            AgentError::EnvironmentInvalidated(format!("liveness probe failed: {}", e))
        })?;
        if probe != 2 {
            return Err(AgentError::EnvironmentInvalidated(
                "liveness probe returned garbage".to_string(),
            ));
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), AgentError> {
        self.page.reload().await.map_err(map_cdp)?;
        Ok(())
    }
}

/// One scanned post. The snapshot is frozen at scan time; actions resolve the
/// article by its session key so a virtual-list re-render doesn't leave them
/// holding a stale node.
struct CdpPost {
    page: Arc<Page>,
    snapshot: PostSnapshot,
}

impl CdpPost {
    fn article_js(&self, body: &str) -> String {
        format!(
            r#"(() => {{
    const article = document.querySelector('article[data-rp-key={key}]');
    if (!article) return false;
    {body}
}})()"#,
            key = js_literal(&self.snapshot.key),
        )
    }
}

#[async_trait]
impl PostHandle for CdpPost {
    fn key(&self) -> &str {
        &self.snapshot.key
    }

    async fn snapshot(&self) -> Result<PostSnapshot, AgentError> {
        Ok(self.snapshot.clone())
    }

    async fn mark_processed(&self) -> Result<(), AgentError> {
        let js = self.article_js(r#"article.dataset.rpProcessed = "1"; return true;"#);
        let _: bool = eval_on(&self.page, &js).await?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<(), AgentError> {
        let js = self.article_js(
            r#"article.scrollIntoView({ block: "center", behavior: "smooth" }); return true;"#,
        );
        let marked: bool = eval_on(&self.page, &js).await?;
        if !marked {
            return Err(AgentError::HostUiChanged(
                "post left the document before it could be scrolled to".to_string(),
            ));
        }
        Ok(())
    }

    async fn click_like(&self) -> Result<bool, AgentError> {
        let js = self.article_js(
            r#"
    const like = article.querySelector('[data-testid="like"]');
    if (!like) return false;
    like.click();
    return true;"#,
        );
        eval_on(&self.page, &js).await
    }

    async fn click_reply(&self) -> Result<bool, AgentError> {
        let js = self.article_js(
            r#"
    const reply = article.querySelector('[data-testid="reply"]');
    if (!reply) return false;
    reply.click();
    return true;"#,
        );
        eval_on(&self.page, &js).await
    }
}

/// The reply composer surface. Every call re-resolves the editor element, so
/// the handle stays valid across the host framework's re-renders.
struct CdpEditor {
    page: Arc<Page>,
}

impl CdpEditor {
    fn editor_js(&self, body: &str) -> String {
        format!(
            r#"(() => {{
    {FIND_EDITOR_JS}
    const editor = findEditor();
    if (!editor) return false;
    {body}
}})()"#
        )
    }

    async fn run(&self, body: &str) -> Result<(), AgentError> {
        let found: bool = eval_on(&self.page, &self.editor_js(body)).await?;
        if !found {
            return Err(AgentError::HostUiChanged(
                "reply editor disappeared mid-injection".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EditorHandle for CdpEditor {
    async fn focus_and_clear(&self) -> Result<(), AgentError> {
        self.run(
            r#"
    editor.focus();
    editor.click();
    document.execCommand("selectAll", false, null);
    document.execCommand("delete", false, null);
    return true;"#,
        )
        .await
    }

    async fn dispatch_paste(&self, text: &str) -> Result<(), AgentError> {
        let body = format!(
            r#"
    const payload = {text};
    const data = new DataTransfer();
    data.setData("text/plain", payload);
    editor.focus();
    editor.dispatchEvent(new ClipboardEvent("paste", {{
        clipboardData: data, bubbles: true, cancelable: true,
    }}));
    return true;"#,
            text = js_literal(text),
        );
        self.run(&body).await
    }

    async fn exec_insert_text(&self, text: &str) -> Result<(), AgentError> {
        let body = format!(
            r#"
    editor.focus();
    document.execCommand("insertText", false, {text});
    return true;"#,
            text = js_literal(text),
        );
        self.run(&body).await
    }

    async fn assign_content(&self, text: &str) -> Result<(), AgentError> {
        let body = format!(
            r#"
    const payload = {text};
    editor.focus();
    editor.textContent = payload;
    editor.dispatchEvent(new InputEvent("input", {{
        bubbles: true, data: payload, inputType: "insertText",
    }}));
    editor.dispatchEvent(new Event("change", {{ bubbles: true }}));
    editor.dispatchEvent(new KeyboardEvent("keydown", {{ bubbles: true }}));
    editor.dispatchEvent(new KeyboardEvent("keyup", {{ bubbles: true }}));
    return true;"#,
            text = js_literal(text),
        );
        self.run(&body).await
    }

    async fn rendered_text(&self) -> Result<String, AgentError> {
        let js = format!(
            r#"(() => {{
    {FIND_EDITOR_JS}
    const editor = findEditor();
    return editor ? (editor.innerText || "") : "";
}})()"#
        );
        eval_on(&self.page, &js).await
    }

    async fn final_sync(&self) -> Result<(), AgentError> {
        self.run(
            r#"
    editor.dispatchEvent(new InputEvent("input", { bubbles: true }));
    editor.dispatchEvent(new Event("change", { bubbles: true }));
    editor.blur();
    return true;"#,
        )
        .await?;

        tokio::time::sleep(Duration::from_millis(REFOCUS_DELAY_MS)).await;

        self.run(
            r#"
    editor.focus();
    return true;"#,
        )
        .await
    }
}
