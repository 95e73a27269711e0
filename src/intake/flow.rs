//! One intake session. [`FlowController`] owns the answer record, the step
//! sequencer and, while consent is active, the signature capture.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::model::{AnswerRecord, IntakePatch};
use super::signature::{PointerEvent, SignatureCapture, SignatureStyle, SurfaceGeometry};
use super::state::{Progress, StepId, StepSequencer, Transition};
use super::steps::StepDraft;
use crate::error::{FlowError, Result, ValidationErrors};
use crate::sink::{Navigator, Screen, SubmissionSink};

/// Signature state shown on the consent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignatureStatus {
    /// A drawing surface is attached.
    pub ready: bool,
    /// At least one segment drawn; gates the submit control.
    pub has_content: bool,
}

/// Everything needed to render the active screen.
#[derive(Debug, Clone, Serialize)]
pub struct FlowView {
    pub step: StepId,
    pub question: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtext: Option<&'static str>,
    /// Points agreed to by signing; consent step only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_label: Option<String>,
    /// Prefilled answers for the active question screen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<StepDraft>,
    pub can_proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureStatus>,
    /// Shown on the completion screen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_summary: Option<&'static str>,
    pub answers: AnswerRecord,
}

/// Coordinates one intake session.
pub struct FlowController {
    record: AnswerRecord,
    sequencer: StepSequencer,
    signature: Option<SignatureCapture>,
    style: SignatureStyle,
    sink: Arc<dyn SubmissionSink>,
    navigator: Arc<dyn Navigator>,
}

impl FlowController {
    pub fn new(sink: Arc<dyn SubmissionSink>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            record: AnswerRecord::default(),
            sequencer: StepSequencer::new(),
            signature: None,
            style: SignatureStyle::default(),
            sink,
            navigator,
        }
    }

    pub fn with_signature_style(mut self, style: SignatureStyle) -> Self {
        self.style = style;
        self
    }

    pub fn record(&self) -> &AnswerRecord {
        &self.record
    }

    pub fn current_step(&self) -> StepId {
        self.sequencer.current()
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    /// The active signature capture, only while consent is on screen.
    pub fn signature(&self) -> Option<&SignatureCapture> {
        self.signature.as_ref()
    }

    /// Build the view for the active step.
    pub fn view(&self) -> FlowView {
        let step = self.sequencer.current();
        let draft = StepDraft::for_step(step, &self.record);
        let signature = self.signature.as_ref().map(|s| SignatureStatus {
            ready: s.is_ready(),
            has_content: s.has_content(),
        });
        let can_proceed = match (&draft, &signature) {
            (Some(d), _) => d.can_proceed(),
            (None, Some(s)) => s.has_content,
            (None, None) => false,
        };
        let progress = self.sequencer.progress();
        let completed = step == StepId::Completion;

        FlowView {
            step,
            question: step.question(),
            subtext: step.subtext(),
            terms: step.terms().to_vec(),
            progress,
            progress_label: progress.map(|p| p.to_string()),
            draft,
            can_proceed,
            signature,
            patient_name: completed.then(|| self.record.name.clone()),
            interest_summary: if completed {
                self.record.interest_summary()
            } else {
                None
            },
            answers: self.record.clone(),
        }
    }

    /// Merge a partial update into the record.
    pub fn merge(&mut self, patch: IntakePatch) {
        self.record.merge(patch);
    }

    /// Commit the answers of the active step and move on.
    ///
    /// A "yes" on the family-support screen ends the flow on the
    /// not-needed screen.
    pub fn submit_step(&mut self, draft: StepDraft) -> Result<Transition> {
        let active = self.sequencer.current();
        let submitted = draft.step();
        if submitted != active {
            return Err(FlowError::WrongStep { active, submitted }.into());
        }

        let patch = draft.commit()?;
        self.merge(patch);

        let transition = match draft {
            StepDraft::FamilySupport(ref d) if d.has_family_support == Some(true) => {
                info!("Family support available, intake not needed");
                self.sequencer.jump_to(StepId::NotNeeded)
            }
            _ => self.sequencer.advance(),
        };
        self.after_transition();
        Ok(transition)
    }

    /// Go back one step. Leaving the first step exits to the entry screen.
    pub fn back(&mut self) -> Transition {
        let transition = self.sequencer.retreat();
        if transition == Transition::Exited {
            self.navigator.navigate(Screen::Entry);
        }
        self.after_transition();
        transition
    }

    /// Attach or re-measure the signature surface.
    pub fn attach_signature_surface(&mut self, surface: SurfaceGeometry) {
        match self.signature.as_mut() {
            Some(capture) => capture.attach(surface),
            None => debug!(step = %self.current_step(), "No signature surface on this step"),
        }
    }

    /// Feed a pointer sample to the signature capture.
    pub fn signature_event(&mut self, event: &PointerEvent) {
        match self.signature.as_mut() {
            Some(capture) => capture.handle(event),
            None => debug!(step = %self.current_step(), "Pointer input outside consent step"),
        }
    }

    pub fn clear_signature(&mut self) {
        if let Some(capture) = self.signature.as_mut() {
            capture.clear();
        }
    }

    /// Sign and submit. Records consent, the signature image and the time,
    /// hands the record to the submission sink, and shows the completion
    /// screen.
    pub fn complete_consent(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        let active = self.sequencer.current();
        if active != StepId::Consent {
            return Err(FlowError::NotOnConsent { active }.into());
        }

        let signature_missing = || ValidationErrors::single("signature", "Please sign below");
        let Some(capture) = self.signature.as_ref().filter(|c| c.has_content()) else {
            return Err(signature_missing().into());
        };
        let Some(image) = capture.export()? else {
            return Err(signature_missing().into());
        };

        self.merge(IntakePatch {
            consent_given: Some(true),
            signature_image: Some(image),
            consent_timestamp: Some(now),
            ..Default::default()
        });
        self.sink.submit_intake(&self.record);
        info!(name = %self.record.name, "Intake submitted");

        let transition = self.sequencer.advance();
        self.after_transition();
        Ok(transition)
    }

    /// Start over with an empty record and return to the entry screen.
    pub fn reset(&mut self) {
        self.record = AnswerRecord::default();
        self.sequencer.reset();
        self.after_transition();
        self.navigator.navigate(Screen::Entry);
        debug!("Intake reset");
    }

    /// The signature strokes live only while consent is the active step.
    fn after_transition(&mut self) {
        let on_consent = self.sequencer.current() == StepId::Consent;
        match (on_consent, self.signature.is_some()) {
            (true, false) => self.signature = Some(SignatureCapture::new(self.style)),
            (false, true) => self.signature = None,
            _ => {}
        }
    }
}
