//! Step drafts: the editable answers of one question screen.
//!
//! A draft is built from the slice of the [`AnswerRecord`] its screen covers,
//! edited by the patient, validated, and committed back as an [`IntakePatch`].
//! Drafts hold no reference to the record, so a screen is a pure function of
//! the answers so far.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::{
    Address, AgeRange, AlcoholPerDay, AnswerRecord, AssistiveDevice, DrivingAbility, Gender,
    IntakePatch, InterestLevel, WalkingDistance,
};
use super::state::StepId;
use crate::error::{FieldError, ValidationErrors};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Minimum digits for a phone number to be accepted.
const MIN_PHONE_DIGITS: usize = 10;

/// Minimum characters in a trimmed name.
const MIN_NAME_CHARS: usize = 2;

/// Behaviour shared by every question screen.
pub trait StepForm: Sized {
    /// The screen this draft belongs to.
    const STEP: StepId;

    /// Prefill from the answers recorded so far.
    fn from_record(record: &AnswerRecord) -> Self;

    /// Every rule the current draft breaks. Empty when it can be committed.
    fn validate(&self) -> Vec<FieldError>;

    /// The patch this draft contributes, assuming it validated.
    fn to_patch(&self) -> IntakePatch;

    /// Whether the "Next" control is enabled.
    fn can_proceed(&self) -> bool {
        self.validate().is_empty()
    }

    /// Validate and produce the patch to merge.
    fn commit(&self) -> Result<IntakePatch, ValidationErrors> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(ValidationErrors { errors });
        }
        Ok(self.to_patch())
    }
}

fn require<T>(value: &Option<T>, field: &str, message: &str, errors: &mut Vec<FieldError>) {
    if value.is_none() {
        errors.push(FieldError::new(field, message));
    }
}

/// Screening: does the patient already have someone to care for them?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySupportDraft {
    pub has_family_support: Option<bool>,
}

impl StepForm for FamilySupportDraft {
    const STEP: StepId = StepId::FamilySupport;

    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            has_family_support: record.has_family_support,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(
            &self.has_family_support,
            "has_family_support",
            "Please choose an answer",
            &mut errors,
        );
        errors
    }

    fn to_patch(&self) -> IntakePatch {
        IntakePatch {
            has_family_support: self.has_family_support,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobilityDraft {
    pub walking_distance: Option<WalkingDistance>,
    pub assistive_device: Option<AssistiveDevice>,
}

impl StepForm for MobilityDraft {
    const STEP: StepId = StepId::Mobility;

    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            walking_distance: record.walking_distance,
            assistive_device: record.assistive_device,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(
            &self.walking_distance,
            "walking_distance",
            "Please choose how far you can walk",
            &mut errors,
        );
        require(
            &self.assistive_device,
            "assistive_device",
            "Please tell us whether you use an assistive device",
            &mut errors,
        );
        errors
    }

    fn to_patch(&self) -> IntakePatch {
        IntakePatch {
            walking_distance: self.walking_distance,
            assistive_device: self.assistive_device,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicsDraft {
    #[serde(default)]
    pub name: String,
    pub age_range: Option<AgeRange>,
    pub gender: Option<Gender>,
}

impl StepForm for DemographicsDraft {
    const STEP: StepId = StepId::Demographics;

    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            name: record.name.clone(),
            age_range: record.age_range,
            gender: record.gender,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().chars().count() < MIN_NAME_CHARS {
            errors.push(FieldError::new("name", "Please enter your full name"));
        }
        require(&self.age_range, "age_range", "Please choose your age range", &mut errors);
        require(&self.gender, "gender", "Please choose your gender", &mut errors);
        errors
    }

    fn to_patch(&self) -> IntakePatch {
        IntakePatch {
            name: Some(self.name.trim().to_string()),
            age_range: self.age_range,
            gender: self.gender,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDraft {
    pub smoker: Option<bool>,
    pub alcohol_per_day: Option<AlcoholPerDay>,
    pub recreational_drugs: Option<bool>,
}

impl StepForm for HealthDraft {
    const STEP: StepId = StepId::Health;

    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            smoker: record.smoker,
            alcohol_per_day: record.alcohol_per_day,
            recreational_drugs: record.recreational_drugs,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&self.smoker, "smoker", "Please tell us whether you smoke", &mut errors);
        require(
            &self.alcohol_per_day,
            "alcohol_per_day",
            "Please choose how many drinks you have per day",
            &mut errors,
        );
        require(
            &self.recreational_drugs,
            "recreational_drugs",
            "Please tell us whether you use recreational drugs",
            &mut errors,
        );
        errors
    }

    fn to_patch(&self) -> IntakePatch {
        IntakePatch {
            smoker: self.smoker,
            alcohol_per_day: self.alcohol_per_day,
            recreational_drugs: self.recreational_drugs,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDraft {
    pub can_drive: Option<DrivingAbility>,
    pub willing_to_give_care: Option<bool>,
    pub interest_level: Option<InterestLevel>,
}

impl StepForm for CapabilityDraft {
    const STEP: StepId = StepId::Capability;

    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            can_drive: record.can_drive,
            willing_to_give_care: record.willing_to_give_care,
            interest_level: record.interest_level,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&self.can_drive, "can_drive", "Please tell us whether you can drive", &mut errors);
        require(
            &self.willing_to_give_care,
            "willing_to_give_care",
            "Please tell us whether you could care for someone else",
            &mut errors,
        );
        require(
            &self.interest_level,
            "interest_level",
            "Please choose your level of interest",
            &mut errors,
        );
        errors
    }

    fn to_patch(&self) -> IntakePatch {
        IntakePatch {
            can_drive: self.can_drive,
            willing_to_give_care: self.willing_to_give_care,
            interest_level: self.interest_level,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDraft {
    pub address_line1: String,
    pub address_line2: String,
    pub phone: String,
    pub email: String,
}

impl ContactDraft {
    pub fn is_valid_email(email: &str) -> bool {
        EMAIL_PATTERN.is_match(email.trim())
    }

    pub fn is_valid_phone(phone: &str) -> bool {
        phone.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_PHONE_DIGITS
    }
}

impl StepForm for ContactDraft {
    const STEP: StepId = StepId::Contact;

    fn from_record(record: &AnswerRecord) -> Self {
        Self {
            address_line1: record.address.line1.clone(),
            address_line2: record.address.line2.clone().unwrap_or_default(),
            phone: record.phone.clone(),
            email: record.email.clone(),
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.address_line1.trim().is_empty() {
            errors.push(FieldError::new("address_line1", "Please enter your street address"));
        }
        if !Self::is_valid_phone(&self.phone) {
            errors.push(FieldError::new(
                "phone",
                "Please enter a phone number with at least 10 digits",
            ));
        }
        if !Self::is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Please enter a valid email address"));
        }
        errors
    }

    fn to_patch(&self) -> IntakePatch {
        let line2 = self.address_line2.trim();
        IntakePatch {
            address: Some(Address {
                line1: self.address_line1.trim().to_string(),
                line2: (!line2.is_empty()).then(|| line2.to_string()),
            }),
            phone: Some(self.phone.trim().to_string()),
            email: Some(self.email.trim().to_lowercase()),
            ..Default::default()
        }
    }
}

/// Answers for any question screen, tagged by step on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepDraft {
    FamilySupport(FamilySupportDraft),
    Mobility(MobilityDraft),
    Demographics(DemographicsDraft),
    Health(HealthDraft),
    Capability(CapabilityDraft),
    Contact(ContactDraft),
}

impl StepDraft {
    /// The prefilled draft for `step`, or `None` for screens without a form
    /// (consent, completion, not-needed).
    pub fn for_step(step: StepId, record: &AnswerRecord) -> Option<Self> {
        let draft = match step {
            StepId::FamilySupport => Self::FamilySupport(FamilySupportDraft::from_record(record)),
            StepId::Mobility => Self::Mobility(MobilityDraft::from_record(record)),
            StepId::Demographics => Self::Demographics(DemographicsDraft::from_record(record)),
            StepId::Health => Self::Health(HealthDraft::from_record(record)),
            StepId::Capability => Self::Capability(CapabilityDraft::from_record(record)),
            StepId::Contact => Self::Contact(ContactDraft::from_record(record)),
            StepId::Consent | StepId::Completion | StepId::NotNeeded => return None,
        };
        Some(draft)
    }

    pub fn step(&self) -> StepId {
        match self {
            Self::FamilySupport(_) => FamilySupportDraft::STEP,
            Self::Mobility(_) => MobilityDraft::STEP,
            Self::Demographics(_) => DemographicsDraft::STEP,
            Self::Health(_) => HealthDraft::STEP,
            Self::Capability(_) => CapabilityDraft::STEP,
            Self::Contact(_) => ContactDraft::STEP,
        }
    }

    pub fn validate(&self) -> Vec<FieldError> {
        match self {
            Self::FamilySupport(d) => d.validate(),
            Self::Mobility(d) => d.validate(),
            Self::Demographics(d) => d.validate(),
            Self::Health(d) => d.validate(),
            Self::Capability(d) => d.validate(),
            Self::Contact(d) => d.validate(),
        }
    }

    pub fn can_proceed(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn commit(&self) -> Result<IntakePatch, ValidationErrors> {
        match self {
            Self::FamilySupport(d) => d.commit(),
            Self::Mobility(d) => d.commit(),
            Self::Demographics(d) => d.commit(),
            Self::Health(d) => d.commit(),
            Self::Capability(d) => d.commit(),
            Self::Contact(d) => d.commit(),
        }
    }
}
