//! Patient intake for the CareTaker Match questionnaire.
//!
//! The patient walks a fixed sequence of question steps. Each step's answers
//! are validated by a draft and merged into one `AnswerRecord`. The consent
//! step captures a drawn signature; completing it submits the record. A "yes"
//! on the first question ends the flow early on the not-needed screen.

pub mod flow;
pub mod model;
pub mod routes;
pub mod signature;
pub mod state;
pub mod steps;

pub use flow::{FlowController, FlowView, SignatureStatus};
pub use model::{AnswerRecord, IntakePatch, SignatureImage};
pub use routes::{IntakeRouteState, IntakeSessions, SessionLimits, intake_routes};
pub use signature::{SignatureCapture, SignaturePad, SignatureStyle, SurfaceGeometry};
pub use state::{Progress, STEP_SEQUENCE, StepId, StepSequencer, Transition};
pub use steps::{StepDraft, StepForm};
