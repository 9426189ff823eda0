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

use crate::config::{CombineLogic, Config, MissingPolicy, ReputationConfig};
use crate::page::PostSnapshot;
use crate::reputation::{ReputationSignals, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyProcessed,
    MidProcessing,
    InReplyHistory,
    OwnPost,
    Blacklisted,
    NotVerified,
    IsReply,
    ReputationGate,
}

/// What the session already knows about this post. Computed by the caller so
/// the filter itself stays pure and side-effect free.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionView {
    pub already_processed: bool,
    pub mid_processing: bool,
    pub in_reply_history: bool,
}

/// Ordered rejection checks, short-circuiting on the first match, cheapest
/// and most certain first. Marking rejected posts is the caller's job.
pub fn should_process(
    snapshot: &PostSnapshot,
    signals: &ReputationSignals,
    session: SessionView,
    config: &Config,
) -> Decision {
    if snapshot.processed || session.already_processed {
        return Decision::Reject(RejectReason::AlreadyProcessed);
    }
    if session.mid_processing {
        return Decision::Reject(RejectReason::MidProcessing);
    }
    if session.in_reply_history {
        return Decision::Reject(RejectReason::InReplyHistory);
    }

    if let (Some(me), Some(author)) = (config.my_username.as_deref(), snapshot.author.as_deref()) {
        if !me.is_empty() && author.eq_ignore_ascii_case(me) {
            return Decision::Reject(RejectReason::OwnPost);
        }
    }

    if let Some(author) = snapshot.author.as_deref() {
        let author = author.to_lowercase();
        if config.blacklist.iter().any(|b| b.to_lowercase() == author) {
            return Decision::Reject(RejectReason::Blacklisted);
        }
    }

    if config.verified_only && !snapshot.verified {
        return Decision::Reject(RejectReason::NotVerified);
    }

    if config.skip_replies && snapshot.is_reply {
        return Decision::Reject(RejectReason::IsReply);
    }

    if !reputation_gate(signals, &config.reputation) {
        return Decision::Reject(RejectReason::ReputationGate);
    }

    Decision::Accept
}

/// Evaluate every enabled signal against its [min, max] range, fold the
/// results with the configured logic. A gate with no enabled signals always
/// passes.
fn reputation_gate(signals: &ReputationSignals, config: &ReputationConfig) -> bool {
    let mut results = Vec::new();

    for kind in SignalKind::ALL {
        let gate = config.gate(kind);
        if !gate.enabled {
            continue;
        }
        let pass = match signals.get(kind) {
            Some(value) => gate.passes(value),
            None => match config.missing {
                MissingPolicy::Skip => false,
                MissingPolicy::Zero => gate.passes(0.0),
                MissingPolicy::Allow => true,
            },
        };
        results.push(pass);
    }

    if results.is_empty() {
        return true;
    }

    match config.logic {
        CombineLogic::All => results.iter().all(|&p| p),
        CombineLogic::Any => results.iter().any(|&p| p),
    }
}
