//! Provider review: the single-screen assessment a clinician fills in for
//! one patient. Separate from the intake step sequence.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ValidationErrors;
use crate::sink::{Navigator, Screen, SubmissionSink};

/// How the provider judges the patient as a care partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderAssessment {
    Caregiver,
    CareReceiver,
    Both,
    Neither,
}

impl ProviderAssessment {
    pub const ALL: &'static [ProviderAssessment] =
        &[Self::Caregiver, Self::CareReceiver, Self::Both, Self::Neither];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Caregiver => "Care giver",
            Self::CareReceiver => "Care receiver",
            Self::Both => "Both",
            Self::Neither => "Neither",
        }
    }
}

impl std::fmt::Display for ProviderAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Caregiver => write!(f, "caregiver"),
            Self::CareReceiver => write!(f, "care_receiver"),
            Self::Both => write!(f, "both"),
            Self::Neither => write!(f, "neither"),
        }
    }
}

/// What is handed to the submission sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentSubmission {
    pub patient_name: String,
    pub assessment: ProviderAssessment,
    pub submitted_at: DateTime<Utc>,
}

/// State of the review screen.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderReview {
    pub patient_name: String,
    pub assessment: Option<ProviderAssessment>,
    pub submitted: bool,
}

impl ProviderReview {
    pub fn new(patient_name: impl Into<String>) -> Self {
        Self {
            patient_name: patient_name.into(),
            assessment: None,
            submitted: false,
        }
    }

    pub fn select(&mut self, assessment: ProviderAssessment) {
        self.assessment = Some(assessment);
    }

    pub fn can_submit(&self) -> bool {
        self.assessment.is_some()
    }

    /// Record the assessment. Requires a selection.
    pub fn submit(
        &mut self,
        sink: &dyn SubmissionSink,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSubmission, ValidationErrors> {
        let assessment = self.assessment.ok_or_else(|| {
            ValidationErrors::single("assessment", "Please choose an assessment")
        })?;
        let submission = AssessmentSubmission {
            patient_name: self.patient_name.clone(),
            assessment,
            submitted_at: now,
        };
        sink.submit_assessment(&submission);
        self.submitted = true;
        Ok(submission)
    }

    /// Clear the form and return to the entry screen.
    pub fn start_new_patient(&mut self, navigator: &dyn Navigator) {
        self.assessment = None;
        self.submitted = false;
        navigator.navigate(Screen::Entry);
    }
}

// ── HTTP ────────────────────────────────────────────────────────────────

/// Shared state for provider routes.
#[derive(Clone)]
pub struct ProviderRouteState {
    pub review: Arc<RwLock<ProviderReview>>,
    pub sink: Arc<dyn SubmissionSink>,
    pub navigator: Arc<dyn Navigator>,
}

#[derive(Debug, Deserialize)]
struct AssessmentRequest {
    assessment: Option<ProviderAssessment>,
}

/// GET /api/provider
async fn get_review(State(state): State<ProviderRouteState>) -> impl IntoResponse {
    let review = state.review.read().await;
    let options: Vec<_> = ProviderAssessment::ALL
        .iter()
        .map(|a| serde_json::json!({"value": a, "label": a.label()}))
        .collect();
    Json(serde_json::json!({
        "review": *review,
        "options": options,
    }))
}

/// POST /api/provider/assessment
async fn submit_assessment(
    State(state): State<ProviderRouteState>,
    Json(body): Json<AssessmentRequest>,
) -> impl IntoResponse {
    let mut review = state.review.write().await;
    review.assessment = None;
    review.submitted = false;
    if let Some(assessment) = body.assessment {
        review.select(assessment);
    }
    match review.submit(state.sink.as_ref(), Utc::now()) {
        Ok(submission) => (StatusCode::OK, Json(serde_json::json!(submission))),
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": errors.to_string(), "fields": errors.errors})),
        ),
    }
}

/// POST /api/provider/new-patient
async fn new_patient(State(state): State<ProviderRouteState>) -> impl IntoResponse {
    let mut review = state.review.write().await;
    review.start_new_patient(state.navigator.as_ref());
    Json(serde_json::json!({
        "screen": Screen::Entry,
        "review": *review,
    }))
}

/// Build the provider review routes.
pub fn provider_routes(state: ProviderRouteState) -> Router {
    Router::new()
        .route("/api/provider", get(get_review))
        .route("/api/provider/assessment", post(submit_assessment))
        .route("/api/provider/new-patient", post(new_patient))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{RecordingNavigator, RecordingSink};

    #[test]
    fn submit_requires_selection() {
        let sink = RecordingSink::default();
        let mut review = ProviderReview::new("Sarah Jones");
        assert!(!review.can_submit());
        let err = review.submit(&sink, Utc::now()).unwrap_err();
        assert!(err.has_field("assessment"));
        assert!(!review.submitted);
        assert!(sink.assessments.lock().unwrap().is_empty());
    }

    #[test]
    fn submit_records_through_sink() {
        let sink = RecordingSink::default();
        let mut review = ProviderReview::new("Sarah Jones");
        review.select(ProviderAssessment::CareReceiver);
        let submission = review.submit(&sink, Utc::now()).unwrap();
        assert_eq!(submission.assessment, ProviderAssessment::CareReceiver);
        assert!(review.submitted);

        let recorded = sink.assessments.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].patient_name, "Sarah Jones");

        drop(recorded);
        let navigator = RecordingNavigator::default();
        review.start_new_patient(&navigator);
        assert!(!review.submitted);
        assert!(review.assessment.is_none());
        assert_eq!(*navigator.screens.lock().unwrap(), vec![Screen::Entry]);
    }

    #[test]
    fn display_matches_serde() {
        for a in ProviderAssessment::ALL {
            let json = serde_json::to_string(a).unwrap();
            assert_eq!(format!("\"{a}\""), json);
        }
        assert_eq!(ProviderAssessment::Caregiver.label(), "Care giver");
    }
}
