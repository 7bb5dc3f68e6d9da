//! Aggregation engine: per-patient merged views and profile upserts.

use std::collections::BTreeSet;

use consulta_extract::{StructuredRecord, TokenSet, DIAGNOSIS_PENDING};

use crate::db::{Database, DbResult, StoredProfile};
use crate::document::profile_document;
use crate::embed::Embedder;
use crate::models::{identity_key, ProfileMeta, ProfileSummary};
use crate::search::{QueryEngine, SearchHit};

/// Upper bound on conversations folded into one summary.
const SUMMARY_FETCH_LIMIT: usize = 50;

/// Aggregates conversations into per-patient views and keeps the profile
/// collection in step with ingestion.
pub struct Aggregator<'a> {
    db: &'a Database,
    embedder: &'a dyn Embedder,
}

impl<'a> Aggregator<'a> {
    pub fn new(db: &'a Database, embedder: &'a dyn Embedder) -> Self {
        Self { db, embedder }
    }

    /// Merge every stored conversation of `patient_name` into one summary.
    /// `None` when the patient has no conversations at all.
    pub fn summarize(&self, patient_name: &str) -> DbResult<Option<ProfileSummary>> {
        let engine = QueryEngine::new(self.db, self.embedder);
        let conversations = engine.by_patient_name(patient_name, SUMMARY_FETCH_LIMIT)?;
        let Some(first) = conversations.first() else {
            return Ok(None);
        };

        let mut all_symptoms = TokenSet::new();
        let mut all_medications = TokenSet::new();
        let mut all_diagnoses = TokenSet::new();
        let mut dates = Vec::new();
        let mut priorities = BTreeSet::new();
        let mut follow_up_needed = false;
        for conv in &conversations {
            all_symptoms.union_with(&conv.meta.symptoms);
            all_medications.union_with(&conv.meta.medications);
            let diagnosis = conv.meta.diagnosis.trim();
            if !diagnosis.is_empty() && diagnosis != DIAGNOSIS_PENDING {
                all_diagnoses.insert(diagnosis);
            }
            if !conv.meta.conversation_date.is_empty() {
                dates.push(conv.meta.conversation_date.clone());
            }
            priorities.insert(conv.meta.priority_level);
            follow_up_needed |= conv.meta.follow_up_needed;
        }
        dates.sort();

        Ok(Some(ProfileSummary {
            patient_name: first
                .meta
                .patient_name
                .clone()
                .unwrap_or_else(|| patient_name.to_owned()),
            patient_age: first.meta.patient_age,
            patient_gender: first.meta.patient_gender,
            patient_phone: first.meta.patient_phone.clone(),
            total_conversations: conversations.len(),
            all_symptoms,
            all_medications,
            all_diagnoses,
            first_conversation: dates.first().cloned(),
            last_conversation: dates.last().cloned(),
            conversation_dates: dates,
            priority_levels: priorities.into_iter().collect(),
            follow_up_needed,
        }))
    }

    /// Create or refresh the profile row for the record's patient. Unnamed
    /// records are skipped. Exactly one insert or one update runs, so the
    /// conversation counter moves by at most one.
    pub fn upsert_profile(&self, record: &StructuredRecord, updated_at: &str) -> DbResult<()> {
        let Some(name) = record.name.as_deref() else {
            return Ok(());
        };
        let key = identity_key(name);
        let document = profile_document(record);
        let embedding = self.embedder.embed(&document);
        let total_conversations = match self.db.get_profile(&key)? {
            Some(existing) => existing.meta.total_conversations + 1,
            None => 1,
        };
        let profile = StoredProfile {
            id: key,
            meta: ProfileMeta {
                patient_name: name.to_owned(),
                patient_age: record.age,
                patient_gender: record.gender,
                patient_phone: record.phone.clone(),
                last_conversation_id: record.conversation_id.clone(),
                total_conversations,
                updated_at: updated_at.to_owned(),
            },
            document,
            embedding,
        };
        if total_conversations == 1 {
            self.db.insert_profile(&profile)
        } else {
            self.db.update_profile(&profile)
        }
    }

    /// A patient's conversations, most recent first.
    pub fn history(&self, patient_name: &str, limit: usize) -> DbResult<Vec<SearchHit>> {
        let engine = QueryEngine::new(self.db, self.embedder);
        let mut conversations = engine.by_patient_name(patient_name, limit)?;
        conversations.sort_by(|a, b| b.meta.conversation_date.cmp(&a.meta.conversation_date));
        Ok(conversations)
    }
}
