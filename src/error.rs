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

use thiserror::Error;

/// Failure categories the autopilot loop distinguishes. Everything except
/// `EnvironmentInvalidated` is recoverable: the loop reports it, closes the
/// composer, and moves on to the next post.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("backend unavailable: {message}")]
    BackendUnavailable { message: String, hint: String },

    #[error("backend authentication missing or rejected: {0}")]
    AuthMissing(String),

    #[error("backend quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("model crashed: {0}")]
    ModelCrashed(String),

    #[error("host UI changed: {0}")]
    HostUiChanged(String),

    #[error("environment invalidated: {0}")]
    EnvironmentInvalidated(String),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Only environment teardown terminates the run; every other category is
    /// converted to a status line and the loop continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EnvironmentInvalidated(_))
    }

    /// Human-readable status message for the console, derived from the
    /// category rather than the raw error text.
    pub fn friendly_message(&self) -> String {
        match self {
            Self::ConfigurationMissing(what) => {
                format!("Please configure the agent first: {}.", what)
            }
            Self::BackendUnavailable { message, hint } => {
                format!("Cannot reach the generation backend ({}). {}", message, hint)
            }
            Self::AuthMissing(_) => {
                "The backend rejected the request. Check your API key in replypilot.toml."
                    .to_string()
            }
            Self::QuotaExceeded(_) => {
                "The backend quota is exhausted. Please wait a few minutes before trying again."
                    .to_string()
            }
            Self::ModelNotFound(model) => format!(
                "Model '{}' is not available on the backend. Pull it first or pick another model.",
                model
            ),
            Self::ModelCrashed(_) => {
                "The model process crashed while generating. Try a smaller model or restart the backend."
                    .to_string()
            }
            Self::HostUiChanged(what) => format!(
                "The page layout changed and an expected element was not found ({}). Skipping this post.",
                what
            ),
            Self::EnvironmentInvalidated(_) => {
                "The browser session was torn down. Reloading the page.".to_string()
            }
            Self::Other(message) => format!("Error generating comment: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_environment_teardown_is_fatal() {
        assert!(AgentError::EnvironmentInvalidated("ws closed".into()).is_fatal());
        assert!(!AgentError::ModelCrashed("signal: 9".into()).is_fatal());
        assert!(!AgentError::HostUiChanged("submit button".into()).is_fatal());
    }

    #[test]
    fn friendly_messages_name_the_category_not_the_internals() {
        let err = AgentError::ModelNotFound("llama3:70b".into());
        assert!(err.friendly_message().contains("llama3:70b"));

        let err = AgentError::BackendUnavailable {
            message: "connection refused".into(),
            hint: "Is the backend running?".into(),
        };
        assert!(err.friendly_message().contains("Is the backend running?"));
    }
}
