//! Answer record and the answer option enums.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SignatureError;

/// Declares an answer enum with its wire literal and the label shown to the
/// patient. Display and serde share the wire literal.
macro_rules! answer_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $wire:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every option, in display order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Option text shown to the patient.
            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(format!("Unknown {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

answer_enum! {
    /// How far the patient can walk without stopping.
    WalkingDistance {
        MoreThan2Blocks => "more_than_2_blocks", "More than 2 blocks";
        OneBlock => "1_block", "About 1 block";
        LessThan1Block => "less_than_1_block", "Less than 1 block";
    }
}

answer_enum! {
    AssistiveDevice {
        None => "none", "No, I walk without assistance";
        Cane => "cane", "Cane or walking stick";
        Walker => "walker", "Walker";
    }
}

answer_enum! {
    AgeRange {
        Under65 => "under_65", "Under 65";
        From65To75 => "65_to_75", "65 to 75";
        Over75 => "over_75", "Over 75";
    }
}

answer_enum! {
    Gender {
        Male => "male", "Male";
        Female => "female", "Female";
    }
}

answer_enum! {
    /// Drinks of alcohol per day.
    AlcoholPerDay {
        None => "none", "None";
        TwoOrLess => "2_or_less", "2 or less";
        SixOrLess => "6_or_less", "6 or less";
        MoreThan6 => "more_than_6", "More than 6";
    }
}

answer_enum! {
    DrivingAbility {
        Yes => "yes", "Yes";
        No => "no", "No";
        DaytimeOnly => "daytime_only", "Only during the day";
    }
}

answer_enum! {
    /// Whether the patient wants to give care, receive it, or both.
    InterestLevel {
        Both => "both", "I'm interested in both giving and receiving care";
        GiveOnly => "give_only", "I'm interested in giving care only";
        ReceiveOnly => "receive_only", "I'm interested in receiving care only";
        NotInterested => "not_interested", "I'm not interested";
    }
}

/// Postal address. Line 2 is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
}

/// A rendered signature. Travels inline as a `data:image/png;base64,` URI.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureImage {
    png: Vec<u8>,
}

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

impl SignatureImage {
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    /// Raw PNG bytes.
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn to_data_uri(&self) -> String {
        format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(&self.png))
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, SignatureError> {
        let payload = uri
            .strip_prefix(PNG_DATA_URI_PREFIX)
            .ok_or_else(|| SignatureError::InvalidDataUri("expected a PNG data URI".to_string()))?;
        let png = STANDARD
            .decode(payload)
            .map_err(|e| SignatureError::InvalidDataUri(e.to_string()))?;
        Ok(Self { png })
    }
}

impl std::fmt::Debug for SignatureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureImage")
            .field("png_len", &self.png.len())
            .finish()
    }
}

impl Serialize for SignatureImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

impl<'de> Deserialize<'de> for SignatureImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Self::from_data_uri(&uri).map_err(serde::de::Error::custom)
    }
}

/// Everything one patient answers during an intake session.
///
/// Owned by the flow controller and only changed through [`AnswerRecord::merge`].
/// Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    // Screening
    pub has_family_support: Option<bool>,

    // Mobility
    pub walking_distance: Option<WalkingDistance>,
    pub assistive_device: Option<AssistiveDevice>,

    // Demographics
    pub name: String,
    pub age_range: Option<AgeRange>,
    pub gender: Option<Gender>,

    // Health
    pub smoker: Option<bool>,
    pub alcohol_per_day: Option<AlcoholPerDay>,
    pub recreational_drugs: Option<bool>,

    // Capability
    pub can_drive: Option<DrivingAbility>,
    pub willing_to_give_care: Option<bool>,
    pub interest_level: Option<InterestLevel>,

    // Contact
    pub address: Address,
    pub phone: String,
    pub email: String,

    // Consent
    pub consent_given: bool,
    pub signature_image: Option<SignatureImage>,
    pub consent_timestamp: Option<DateTime<Utc>>,
}

impl AnswerRecord {
    /// Apply a partial update. Fields left `None` in the patch are untouched.
    pub fn merge(&mut self, patch: IntakePatch) {
        let IntakePatch {
            has_family_support,
            walking_distance,
            assistive_device,
            name,
            age_range,
            gender,
            smoker,
            alcohol_per_day,
            recreational_drugs,
            can_drive,
            willing_to_give_care,
            interest_level,
            address,
            phone,
            email,
            consent_given,
            signature_image,
            consent_timestamp,
        } = patch;

        if has_family_support.is_some() {
            self.has_family_support = has_family_support;
        }
        if walking_distance.is_some() {
            self.walking_distance = walking_distance;
        }
        if assistive_device.is_some() {
            self.assistive_device = assistive_device;
        }
        if let Some(name) = name {
            self.name = name;
        }
        if age_range.is_some() {
            self.age_range = age_range;
        }
        if gender.is_some() {
            self.gender = gender;
        }
        if smoker.is_some() {
            self.smoker = smoker;
        }
        if alcohol_per_day.is_some() {
            self.alcohol_per_day = alcohol_per_day;
        }
        if recreational_drugs.is_some() {
            self.recreational_drugs = recreational_drugs;
        }
        if can_drive.is_some() {
            self.can_drive = can_drive;
        }
        if willing_to_give_care.is_some() {
            self.willing_to_give_care = willing_to_give_care;
        }
        if interest_level.is_some() {
            self.interest_level = interest_level;
        }
        if let Some(address) = address {
            self.address = address;
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(consent) = consent_given {
            self.consent_given = consent;
        }
        if signature_image.is_some() {
            self.signature_image = signature_image;
        }
        if consent_timestamp.is_some() {
            self.consent_timestamp = consent_timestamp;
        }
    }

    /// One-line summary of what the patient signed up for, shown on the
    /// completion screen.
    pub fn interest_summary(&self) -> Option<&'static str> {
        match self.interest_level? {
            InterestLevel::Both => Some("Giving and receiving care"),
            InterestLevel::GiveOnly => Some("Giving care only"),
            InterestLevel::ReceiveOnly => Some("Receiving care only"),
            InterestLevel::NotInterested => None,
        }
    }
}

/// A partial answer record produced by committing one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntakePatch {
    pub has_family_support: Option<bool>,
    pub walking_distance: Option<WalkingDistance>,
    pub assistive_device: Option<AssistiveDevice>,
    pub name: Option<String>,
    pub age_range: Option<AgeRange>,
    pub gender: Option<Gender>,
    pub smoker: Option<bool>,
    pub alcohol_per_day: Option<AlcoholPerDay>,
    pub recreational_drugs: Option<bool>,
    pub can_drive: Option<DrivingAbility>,
    pub willing_to_give_care: Option<bool>,
    pub interest_level: Option<InterestLevel>,
    pub address: Option<Address>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub consent_given: Option<bool>,
    pub signature_image: Option<SignatureImage>,
    pub consent_timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_unset() {
        let r = AnswerRecord::default();
        assert!(r.has_family_support.is_none());
        assert!(r.walking_distance.is_none());
        assert!(r.name.is_empty());
        assert!(r.address.line1.is_empty());
        assert!(r.address.line2.is_none());
        assert!(!r.consent_given);
        assert!(r.signature_image.is_none());
        assert!(r.consent_timestamp.is_none());
    }

    #[test]
    fn merge_touches_only_patched_fields() {
        let mut record = AnswerRecord {
            name: "Ada".to_string(),
            smoker: Some(false),
            ..Default::default()
        };
        record.merge(IntakePatch {
            walking_distance: Some(WalkingDistance::OneBlock),
            phone: Some("3035551234".to_string()),
            ..Default::default()
        });

        assert_eq!(record.walking_distance, Some(WalkingDistance::OneBlock));
        assert_eq!(record.phone, "3035551234");
        assert_eq!(record.name, "Ada");
        assert_eq!(record.smoker, Some(false));
        assert!(record.email.is_empty());
    }

    #[test]
    fn wire_literals_match_intake_vocabulary() {
        assert_eq!(
            serde_json::to_string(&WalkingDistance::OneBlock).unwrap(),
            "\"1_block\""
        );
        assert_eq!(
            serde_json::to_string(&AgeRange::From65To75).unwrap(),
            "\"65_to_75\""
        );
        assert_eq!(
            serde_json::to_string(&AlcoholPerDay::TwoOrLess).unwrap(),
            "\"2_or_less\""
        );
        let parsed: InterestLevel = serde_json::from_str("\"receive_only\"").unwrap();
        assert_eq!(parsed, InterestLevel::ReceiveOnly);
        assert_eq!("daytime_only".parse::<DrivingAbility>(), Ok(DrivingAbility::DaytimeOnly));
        assert!("sometimes".parse::<DrivingAbility>().is_err());
    }

    #[test]
    fn display_matches_serde() {
        for level in InterestLevel::ALL {
            let json = serde_json::to_string(level).unwrap();
            assert_eq!(format!("\"{level}\""), json);
        }
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = AnswerRecord {
            has_family_support: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["hasFamilySupport"], false);
        assert!(json.get("walkingDistance").is_some());
        assert_eq!(json["consentGiven"], false);
    }

    #[test]
    fn signature_image_travels_as_data_uri() {
        let image = SignatureImage::from_png(vec![0x89, b'P', b'N', b'G']);
        let uri = image.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));

        let json = serde_json::to_string(&image).unwrap();
        let parsed: SignatureImage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.png_bytes(), image.png_bytes());

        assert!(SignatureImage::from_data_uri("data:image/jpeg;base64,AAAA").is_err());
    }

    #[test]
    fn interest_summary_skips_not_interested() {
        let mut record = AnswerRecord::default();
        assert!(record.interest_summary().is_none());
        record.interest_level = Some(InterestLevel::GiveOnly);
        assert_eq!(record.interest_summary(), Some("Giving care only"));
        record.interest_level = Some(InterestLevel::NotInterested);
        assert!(record.interest_summary().is_none());
    }
}
