//! Typed metadata schemas for the two collections, derived identifiers and
//! the aggregation output types.

use consulta_extract::{Gender, Priority, StructuredRecord, TokenSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed metadata schema of one stored conversation record. Every field maps
/// to one column; the list fields serialize as canonical JSON-array strings
/// so all metadata values stay scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub patient_name: Option<String>,
    pub patient_age: Option<u8>,
    pub patient_gender: Option<Gender>,
    pub patient_phone: Option<String>,
    pub diagnosis: String,
    #[serde(rename = "symptoms_list")]
    pub symptoms: TokenSet,
    #[serde(rename = "medications_list")]
    pub medications: TokenSet,
    #[serde(rename = "allergies_list")]
    pub allergies: TokenSet,
    #[serde(rename = "chronic_conditions_list")]
    pub chronic_conditions: TokenSet,
    pub conversation_id: String,
    pub conversation_date: String,
    pub promoter_id: Option<String>,
    pub priority_level: Priority,
    pub follow_up_needed: bool,
    pub conversation_type: String,
    /// Fixed-width UTC instant the record entered the store.
    pub stored_at: String,
}

impl ConversationMeta {
    pub fn from_record(record: &StructuredRecord, stored_at: String) -> Self {
        Self {
            patient_name: record.name.clone(),
            patient_age: record.age,
            patient_gender: record.gender,
            patient_phone: record.phone.clone(),
            diagnosis: record.diagnosis.clone(),
            symptoms: record.symptoms.clone(),
            medications: record.medications.clone(),
            allergies: record.allergies.clone(),
            chronic_conditions: record.chronic_conditions.clone(),
            conversation_id: record.conversation_id.clone(),
            conversation_date: record.conversation_date.clone(),
            promoter_id: record.promoter_id.clone(),
            priority_level: record.priority,
            follow_up_needed: record.follow_up_needed,
            conversation_type: record.conversation_type.clone(),
            stored_at,
        }
    }
}

/// Aggregate metadata of one patient profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub patient_name: String,
    pub patient_age: Option<u8>,
    pub patient_gender: Option<Gender>,
    pub patient_phone: Option<String>,
    pub last_conversation_id: String,
    pub total_conversations: u64,
    pub updated_at: String,
}

/// Stable content-derived id of a conversation record.
pub fn record_id(conversation_id: &str, patient_name: Option<&str>, stored_at: &str) -> String {
    let name = patient_name.unwrap_or("");
    let unique = format!("{conversation_id}_{name}_{stored_at}");
    hex::encode(Sha256::digest(unique.as_bytes()))
}

/// Identity key of a patient profile. Case and surrounding whitespace do not
/// change the key; there is exactly one profile row per key.
pub fn identity_key(patient_name: &str) -> String {
    let normalized = patient_name.trim().to_lowercase();
    format!("patient_{}", hex::encode(Sha256::digest(normalized.as_bytes())))
}

/// Cross-conversation summary of one patient, produced by the aggregation
/// engine on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub patient_name: String,
    pub patient_age: Option<u8>,
    pub patient_gender: Option<Gender>,
    pub patient_phone: Option<String>,
    pub total_conversations: usize,
    pub all_symptoms: TokenSet,
    pub all_medications: TokenSet,
    pub all_diagnoses: TokenSet,
    /// Ascending; fixed-width timestamps so the order is chronological.
    pub conversation_dates: Vec<String>,
    pub first_conversation: Option<String>,
    pub last_conversation: Option<String>,
    pub priority_levels: Vec<Priority>,
    pub follow_up_needed: bool,
}

/// Store-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_patients: u64,
    pub total_conversations: u64,
    pub storage_size_bytes: u64,
}
