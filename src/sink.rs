//! Submission and navigation sinks.
//!
//! The intake core hands finished records and screen changes to these
//! collaborators. The demo implementations only log.

use serde::Serialize;

use crate::intake::model::AnswerRecord;
use crate::provider::AssessmentSubmission;

/// The three addressable screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Entry,
    Intake,
    ProviderReview,
}

impl Screen {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Entry => "/",
            Self::Intake => "/intake",
            Self::ProviderReview => "/provider",
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Intake => write!(f, "intake"),
            Self::ProviderReview => write!(f, "provider_review"),
        }
    }
}

/// Receives completed intakes and provider assessments.
pub trait SubmissionSink: Send + Sync {
    fn submit_intake(&self, record: &AnswerRecord);

    fn submit_assessment(&self, submission: &AssessmentSubmission);
}

/// Moves the user between screens.
pub trait Navigator: Send + Sync {
    fn navigate(&self, screen: Screen);
}

/// Logs submissions and discards them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SubmissionSink for LogSink {
    fn submit_intake(&self, record: &AnswerRecord) {
        match serde_json::to_string(record) {
            Ok(json) => tracing::info!(
                name = %record.name,
                interest = ?record.interest_level,
                record = %json,
                "Intake completed"
            ),
            Err(e) => tracing::warn!("Failed to serialize completed intake: {}", e),
        }
    }

    fn submit_assessment(&self, submission: &AssessmentSubmission) {
        tracing::info!(
            patient = %submission.patient_name,
            assessment = %submission.assessment,
            "Provider assessment recorded"
        );
    }
}

/// Logs navigation requests. The HTTP host reports the target screen in
/// its responses, so nothing else happens here.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, screen: Screen) {
        tracing::debug!(%screen, path = screen.path(), "Navigate");
    }
}
