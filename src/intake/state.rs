//! Intake step sequencer. Tracks which step the patient is on.

use serde::{Deserialize, Serialize};

/// Every screen of the intake flow.
///
/// The questionnaire progresses linearly through [`STEP_SEQUENCE`]:
/// FamilySupport → Mobility → Demographics → Health → Capability → Contact →
/// Consent → Completion. `NotNeeded` is the terminal branch reached when the
/// patient already has family support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    FamilySupport,
    Mobility,
    Demographics,
    Health,
    Capability,
    Contact,
    Consent,
    Completion,
    NotNeeded,
}

/// The fixed linear order of the questionnaire.
pub const STEP_SEQUENCE: [StepId; 8] = [
    StepId::FamilySupport,
    StepId::Mobility,
    StepId::Demographics,
    StepId::Health,
    StepId::Capability,
    StepId::Contact,
    StepId::Consent,
    StepId::Completion,
];

/// Steps counted by the progress indicator (everything but completion).
pub const PROGRESS_TOTAL: usize = STEP_SEQUENCE.len() - 1;

impl StepId {
    /// Position within [`STEP_SEQUENCE`], 0-based. `None` for the branch.
    pub fn position(&self) -> Option<usize> {
        STEP_SEQUENCE.iter().position(|s| s == self)
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: StepId) -> bool {
        use StepId::*;
        if matches!((self, target), (FamilySupport, NotNeeded)) {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.position(), target.position()) {
            (Some(from), Some(to)) => to == from + 1 || to + 1 == from,
            _ => false,
        }
    }

    /// Whether this step ends the flow. Only a reset leaves it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion | Self::NotNeeded)
    }

    /// The next step in the linear progression, if any.
    pub fn next(&self) -> Option<StepId> {
        if self.is_terminal() {
            return None;
        }
        STEP_SEQUENCE.get(self.position()? + 1).copied()
    }

    /// The previous step in the linear progression, if any.
    pub fn previous(&self) -> Option<StepId> {
        if self.is_terminal() {
            return None;
        }
        let pos = self.position()?;
        pos.checked_sub(1).map(|p| STEP_SEQUENCE[p])
    }

    /// Heading shown above the step.
    pub fn question(&self) -> &'static str {
        match self {
            Self::FamilySupport => {
                "Do you have friends or family that can care for you after surgery?"
            }
            Self::Mobility => "Let's understand your mobility",
            Self::Demographics => "Tell us about yourself",
            Self::Health => "A few health questions",
            Self::Capability => "About caring for others",
            Self::Contact => "How can we contact you?",
            Self::Consent => "Consent and Signature",
            Self::Completion => "Thank you!",
            Self::NotNeeded => "You're All Set!",
        }
    }

    pub fn subtext(&self) -> Option<&'static str> {
        match self {
            Self::Consent => Some(
                "Please attest that you have read the consent form and consent to being \
                 introduced to a friend to assist in care after surgery. By signing below, \
                 you agree to participate in the CareTaker Match program and understand that:",
            ),
            Self::Capability => Some(
                "This application matches patients who can help each other. If you receive \
                 care after your surgery, our expectation is that you would reciprocate and \
                 give someone else care after their surgery.",
            ),
            Self::Contact => {
                Some("Please provide contact information so a friend can reach you.")
            }
            Self::NotNeeded => Some(
                "CareTaker Match is not needed since you have friends and family to care for \
                 you after surgery.",
            ),
            Self::Completion => Some(
                "You have completed the process to match you with a friend for care after \
                 surgery.",
            ),
            _ => None,
        }
    }

    /// Points the patient agrees to on the consent step.
    pub fn terms(&self) -> &'static [&'static str] {
        match self {
            Self::Consent => &[
                "Your information will be shared with your matched care partner",
                "You are expected to reciprocate care when able",
                "This is a voluntary program",
            ],
            _ => &[],
        }
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::FamilySupport
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FamilySupport => "family_support",
            Self::Mobility => "mobility",
            Self::Demographics => "demographics",
            Self::Health => "health",
            Self::Capability => "capability",
            Self::Contact => "contact",
            Self::Consent => "consent",
            Self::Completion => "completion",
            Self::NotNeeded => "not_needed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// The active step changed.
    Moved { from: StepId, to: StepId },
    /// No step before this one; the caller leaves the flow.
    Exited,
    /// Nothing happened (end of sequence or a terminal screen).
    Stayed,
}

/// "Step i of N" for the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    /// Completion percentage, rounded.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.current as f64 / self.total as f64) * 100.0).round() as u32
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Step {} of {}", self.current, self.total)
    }
}

/// Holds the active step and applies the transition rules.
///
/// Trusts its caller: whether the active step's answers are complete is
/// checked by the step drafts before `advance` is requested.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepSequencer {
    current: StepId,
}

impl StepSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> StepId {
        self.current
    }

    /// 1-based position of the active step within [`STEP_SEQUENCE`].
    ///
    /// The not-needed branch reports the position of the screening step it
    /// was entered from.
    pub fn current_index(&self) -> usize {
        self.current.position().map(|p| p + 1).unwrap_or(1)
    }

    /// Progress for the question steps. `None` on the completion and
    /// not-needed screens.
    pub fn progress(&self) -> Option<Progress> {
        if self.current.is_terminal() {
            return None;
        }
        Some(Progress {
            current: self.current_index().min(PROGRESS_TOTAL),
            total: PROGRESS_TOTAL,
        })
    }

    /// Move to the next step in the sequence.
    pub fn advance(&mut self) -> Transition {
        match self.current.next() {
            Some(next) => self.move_to(next),
            None => Transition::Stayed,
        }
    }

    /// Move to the previous step, or report that the flow is being left.
    pub fn retreat(&mut self) -> Transition {
        if self.current.is_terminal() {
            return Transition::Stayed;
        }
        match self.current.previous() {
            Some(prev) => self.move_to(prev),
            None => Transition::Exited,
        }
    }

    /// Jump straight to `target`. Used for the family-support branch; any
    /// jump the transition table does not allow is a no-op.
    pub fn jump_to(&mut self, target: StepId) -> Transition {
        if !self.current.can_transition_to(target) {
            tracing::debug!(from = %self.current, to = %target, "Rejected step jump");
            return Transition::Stayed;
        }
        self.move_to(target)
    }

    /// Back to the first step.
    pub fn reset(&mut self) {
        self.current = StepId::default();
    }

    fn move_to(&mut self, to: StepId) -> Transition {
        let from = self.current;
        self.current = to;
        tracing::debug!(%from, %to, "Intake step transition");
        Transition::Moved { from, to }
    }
}
