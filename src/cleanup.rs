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

//! Post-processing for raw backend output. Stage order matters: each stage
//! operates on the previous stage's result, and the final passes re-strip
//! quotes and re-cap length no matter what the earlier stages produced.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::constants::{MAX_REPLY_CHARS, MENTION_PLACEHOLDER};
use crate::history::HistoryStore;

const QUOTE_CHARS: &[char] = &[
    '"', '\'', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}',
    '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
];

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '…'];

/// Shortest immediately-repeated substring worth collapsing; anything shorter
/// is normal prose repetition, not a model echo loop.
const MIN_ECHO_LEN: usize = 15;

const PHRASE_WINDOW: usize = 5;

/// Run the full pipeline over a raw backend reply. The mention scrub is the
/// only stage with state: it consults and updates the 24h mention history.
pub fn clean_reply(raw: &str, history: &mut HistoryStore, now: DateTime<Utc>) -> String {
    let text = scrub_mentions(raw, history, now);
    let text = strip_hashtags(&text);
    let text = strip_wrapping_quotes(&text);
    let text = dedup_sentences(&text);
    let text = collapse_echoes(&text);
    let text = drop_meta_lines(&text);
    let text = dedup_phrases(&text);
    let text = first_sentence(&text);
    let text = strip_wrapping_quotes(&text);
    cap_length(&text, MAX_REPLY_CHARS)
}

/// Replace every @handle already mentioned within the rolling window with a
/// neutral placeholder; record the first use of fresh handles. A repeat
/// within the same text is a placeholder too. Idempotent: kept handles were
/// recorded at `now` itself, which does not count as an earlier mention, and
/// the placeholder carries no '@'.
pub fn scrub_mentions(text: &str, history: &mut HistoryStore, now: DateTime<Utc>) -> String {
    static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]{1,15})").unwrap());

    let mut seen_here: HashSet<String> = HashSet::new();
    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in MENTION.captures_iter(text) {
        let whole = captures.get(0).unwrap();
        let handle = captures[1].to_lowercase();
        result.push_str(&text[last_end..whole.start()]);
        if seen_here.contains(&handle) || history.note_mention(&handle, now) {
            result.push_str(MENTION_PLACEHOLDER);
        } else {
            seen_here.insert(handle);
            result.push_str(whole.as_str());
        }
        last_end = whole.end();
    }
    result.push_str(&text[last_end..]);
    result
}

pub fn strip_hashtags(text: &str) -> String {
    static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*#\w+").unwrap());
    HASHTAG.replace_all(text, "").trim().to_string()
}

/// Trim quote characters from both ends until none remain, so doubled-up
/// wrapping pairs come off too.
pub fn strip_wrapping_quotes(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| QUOTE_CHARS.contains(&c))
        .trim()
        .to_string()
}

/// Drop any sentence that normalizes (trimmed, case-folded) to one already
/// seen, preserving first occurrences and their terminators. Line structure
/// is preserved so the meta-commentary stage still sees individual lines.
pub fn dedup_sentences(text: &str) -> String {
    let mut seen = HashSet::new();
    let mut lines_out: Vec<String> = Vec::new();

    for line in text.lines() {
        let mut kept: Vec<String> = Vec::new();
        for sentence in split_sentences(line) {
            let normalized = sentence
                .trim()
                .trim_end_matches(|c: char| SENTENCE_TERMINATORS.contains(&c))
                .to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            if seen.insert(normalized) {
                kept.push(sentence.trim().to_string());
            }
        }
        if !kept.is_empty() {
            lines_out.push(kept.join(" "));
        }
    }

    lines_out.join("\n")
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            // Swallow a run of terminators ("?!", "...").
            while let Some(&next) = chars.peek() {
                if SENTENCE_TERMINATORS.contains(&next) {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Collapse immediately-repeated substrings of `MIN_ECHO_LEN` or more
/// characters. Defends against model echo loops. The second copy of a
/// trailing echo lacks the separator of the first ("X X" rather than
/// "X X "), so a single whitespace character between the copies is
/// swallowed along with the repeat.
pub fn collapse_echoes(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        loop {
            let remaining = chars.len() - i;
            let mut collapsed = false;
            let mut n = MIN_ECHO_LEN;
            while n * 2 <= remaining {
                if chars[i..i + n] == chars[i + n..i + 2 * n] {
                    chars.drain(i + n..i + 2 * n);
                    collapsed = true;
                    break;
                }
                if n * 2 + 1 <= remaining
                    && chars[i + n].is_whitespace()
                    && chars[i..i + n] == chars[i + n + 1..i + 2 * n + 1]
                {
                    chars.drain(i + n..i + 2 * n + 1);
                    collapsed = true;
                    break;
                }
                n += 1;
            }
            if !collapsed {
                break;
            }
        }
        i += 1;
    }
    chars.into_iter().collect()
}

/// Drop lines where the model explains its own instructions instead of
/// replying.
pub fn drop_meta_lines(text: &str) -> String {
    static META: Lazy<Vec<Regex>> = Lazy::new(|| {
        [
            r"(?i)^here(?:'|’)?s? (?:is )?(?:a |the |my )?(?:reply|response|comment)",
            r"(?i)^as an ai\b",
            r"(?i)^sure[,.!]",
            r"(?i)^note:",
            r"(?i)^i (?:cannot|can(?:'|’)?t) (?:assist|help|comply)",
            r"(?i)^my (?:reply|response|comment)\b",
            r"(?i)^(?:reply|response|comment):",
            r"(?i)^this reply\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    });

    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !META.iter().any(|re| re.is_match(trimmed))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Excise any later occurrence of a 5-word window that already appeared. The
/// ranges are collected against a stable word list first and removed in one
/// rebuild, so words adjacent to a removed duplicate are never skipped.
pub fn dedup_phrases(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < PHRASE_WINDOW * 2 {
        return words.join(" ");
    }

    let mut keep = vec![true; words.len()];
    let mut seen: HashSet<String> = HashSet::new();
    let mut i = 0;
    while i + PHRASE_WINDOW <= words.len() {
        if !keep[i..i + PHRASE_WINDOW].iter().all(|&k| k) {
            i += 1;
            continue;
        }
        let window = words[i..i + PHRASE_WINDOW].join(" ").to_lowercase();
        if seen.contains(&window) {
            for flag in keep.iter_mut().skip(i).take(PHRASE_WINDOW) {
                *flag = false;
            }
            i += PHRASE_WINDOW;
        } else {
            seen.insert(window);
            i += 1;
        }
    }

    words
        .iter()
        .zip(&keep)
        .filter(|&(_, &kept)| kept)
        .map(|(word, _)| *word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The agent deliberately produces single-sentence replies.
pub fn first_sentence(text: &str) -> String {
    split_sentences(text)
        .into_iter()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Hard cap, trimmed at a word boundary with an ellipsis when exceeded.
pub fn cap_length(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_chars - 1).collect();
    let cut = match truncated.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &truncated[..pos],
        _ => &truncated,
    };
    format!("{}…", cut.trim_end())
}
