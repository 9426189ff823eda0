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

use once_cell::sync::Lazy;
use regex::Regex;

use crate::page::PostSnapshot;

/// At most this many badge texts are scanned per post.
const MAX_BADGE_NODES: usize = 80;
/// Badge texts longer than this are score-card prose, not badges.
const MAX_BADGE_LEN: usize = 120;

/// The four third-party trust scores that may be rendered near a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Ethos,
    Wallchain,
    Kaito,
    Tweetscout,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Ethos,
        SignalKind::Wallchain,
        SignalKind::Kaito,
        SignalKind::Tweetscout,
    ];

    /// Structured attribute names probed before any text scanning.
    pub fn probe_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Ethos => &["data-ethos-score", "data-ethos"],
            Self::Wallchain => &["data-wallchain-score", "data-wallchain"],
            Self::Kaito => &["data-kaito-yaps", "data-kaito"],
            Self::Tweetscout => &["data-tweetscout-score", "data-tweetscout"],
        }
    }

    /// Keyword followed within 6 characters by a numeric token.
    fn keyword_regex(&self) -> &'static Regex {
        static ETHOS: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)ethos.{0,6}?([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
        });
        static WALLCHAIN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)wallchain.{0,6}?([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
        });
        static KAITO: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)(?:kaito|yaps).{0,6}?([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
        });
        static TWEETSCOUT: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)tweet\s*scout.{0,6}?([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
        });
        match self {
            Self::Ethos => &ETHOS,
            Self::Wallchain => &WALLCHAIN,
            Self::Kaito => &KAITO,
            Self::Tweetscout => &TWEETSCOUT,
        }
    }

    /// Sanity ceiling against mis-parses. A parsed value above this is
    /// discarded, not clamped.
    pub fn sanity_max(&self) -> f64 {
        match self {
            Self::Ethos => 2800.0,
            Self::Wallchain => 100_000.0,
            Self::Kaito => 100_000.0,
            Self::Tweetscout => 10_000.0,
        }
    }
}

/// One optional value per signal. Absence and zero stay distinguishable; the
/// missing-signal policy decides downstream what absence means.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReputationSignals {
    pub ethos: Option<f64>,
    pub wallchain: Option<f64>,
    pub kaito: Option<f64>,
    pub tweetscout: Option<f64>,
}

impl ReputationSignals {
    pub fn get(&self, kind: SignalKind) -> Option<f64> {
        match kind {
            SignalKind::Ethos => self.ethos,
            SignalKind::Wallchain => self.wallchain,
            SignalKind::Kaito => self.kaito,
            SignalKind::Tweetscout => self.tweetscout,
        }
    }

    fn set(&mut self, kind: SignalKind, value: Option<f64>) {
        match kind {
            SignalKind::Ethos => self.ethos = value,
            SignalKind::Wallchain => self.wallchain = value,
            SignalKind::Kaito => self.kaito = value,
            SignalKind::Tweetscout => self.tweetscout = value,
        }
    }
}

/// Extract all four signals from one post snapshot. Structured attributes win
/// over the badge-text scan; within the scan the first keyword match decides.
pub fn extract_signals(snapshot: &PostSnapshot) -> ReputationSignals {
    let mut signals = ReputationSignals::default();
    for kind in SignalKind::ALL {
        signals.set(kind, extract_one(snapshot, kind));
    }
    signals
}

fn extract_one(snapshot: &PostSnapshot, kind: SignalKind) -> Option<f64> {
    // Structured probe first. An attribute that parses but fails the sanity
    // bound marks the signal as suspicious; it is discarded without falling
    // back to the text scan.
    for attr in kind.probe_attributes() {
        if let Some(raw) = snapshot.signal_attrs.get(*attr) {
            if let Some(value) = parse_numeric(raw) {
                return sane(value, kind);
            }
        }
    }

    let regex = kind.keyword_regex();
    for text in snapshot
        .badge_texts
        .iter()
        .filter(|t| t.chars().count() <= MAX_BADGE_LEN)
        .take(MAX_BADGE_NODES)
    {
        if let Some(captures) = regex.captures(text) {
            let value = parse_numeric(&captures[1])?;
            return sane(value, kind);
        }
    }

    None
}

fn sane(value: f64, kind: SignalKind) -> Option<f64> {
    if value.is_finite() && value >= 0.0 && value <= kind.sanity_max() {
        Some(value)
    } else {
        None
    }
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().replace(',', "").parse::<f64>().ok()
}
