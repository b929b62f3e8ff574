//! Warning evaluation: the worker-side half of the `onWarning` contract.
//!
//! Matching rule: a warning triggers when it contains any configured
//! trigger word, compared case-insensitively as a substring. The first
//! match decides — later warnings cannot change an abort verdict.

use tracing::debug;

use crate::job::{WarningAction, WarningPolicy};

/// Verdict for one observed warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep rendering.
    Continue,
    /// Stop the render now.
    Abort,
}

/// The trigger that ended a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// The configured word that matched.
    pub word: String,
    /// The warning it matched in.
    pub warning: String,
}

/// Evaluates a warning stream against one job's policy.
///
/// Feed each engine warning to [`observe`](WarningGate::observe) as it is
/// emitted; the engine must stop as soon as it sees [`Flow::Abort`]. The
/// gate latches: once aborted it stays aborted.
#[derive(Debug)]
pub struct WarningGate {
    policy: WarningPolicy,
    triggered: Option<Trigger>,
    observed: usize,
}

impl WarningGate {
    pub fn new(policy: &WarningPolicy) -> Self {
        Self {
            policy: policy.clone(),
            triggered: None,
            observed: 0,
        }
    }

    /// Evaluate one warning.
    pub fn observe(&mut self, warning: &str) -> Flow {
        self.observed += 1;
        if self.triggered.is_some() {
            return Flow::Abort;
        }

        let Some(word) = first_trigger(&self.policy, warning) else {
            return Flow::Continue;
        };

        match self.policy.action {
            WarningAction::Abort => {
                self.triggered = Some(Trigger {
                    word: word.to_string(),
                    warning: warning.to_string(),
                });
                Flow::Abort
            }
            WarningAction::Ignore => {
                debug!(word, warning, "trigger word matched, policy is ignore");
                Flow::Continue
            }
        }
    }

    /// The trigger that aborted the render, if any.
    pub fn triggered(&self) -> Option<&Trigger> {
        self.triggered.as_ref()
    }

    /// How many warnings were observed before (and including) the abort.
    pub fn observed(&self) -> usize {
        self.observed
    }
}

/// The first configured word contained in `warning`, case-insensitively.
pub fn first_trigger<'a>(policy: &'a WarningPolicy, warning: &str) -> Option<&'a str> {
    if policy.trigger_words.is_empty() {
        return None;
    }
    let lowered = warning.to_lowercase();
    policy
        .trigger_words
        .iter()
        .map(String::as_str)
        .find(|word| !word.is_empty() && lowered.contains(&word.to_lowercase()))
}
