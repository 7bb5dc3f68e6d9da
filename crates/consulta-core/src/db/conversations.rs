//! Conversation collection operations.

use consulta_extract::{Gender, Priority, TokenSet};
use rusqlite::{params, params_from_iter, OptionalExtension};

use super::{map_insert_err, Database, DbError, DbResult};
use crate::embed::{vector_from_bytes, vector_to_bytes};
use crate::models::ConversationMeta;
use crate::search::Predicate;

/// One stored conversation record: metadata row plus the embedded document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConversation {
    pub id: String,
    pub meta: ConversationMeta,
    pub document: String,
    pub embedding: Vec<f32>,
}

const COLUMNS: &str = "id, patient_name, patient_age, patient_gender, patient_phone, \
     diagnosis, symptoms_list, medications_list, allergies_list, chronic_conditions_list, \
     conversation_id, conversation_date, promoter_id, priority_level, follow_up_needed, \
     conversation_type, stored_at, document, embedding";

/// Raw row with the list columns still unparsed; split out so JSON parse
/// failures surface as [`DbError::ListRoundTrip`] instead of being folded
/// into the SQLite row-mapping error.
struct RawConversation {
    id: String,
    patient_name: Option<String>,
    patient_age: Option<u8>,
    patient_gender: Option<String>,
    patient_phone: Option<String>,
    diagnosis: String,
    symptoms: String,
    medications: String,
    allergies: String,
    chronic_conditions: String,
    conversation_id: String,
    conversation_date: String,
    promoter_id: Option<String>,
    priority_level: String,
    follow_up_needed: bool,
    conversation_type: String,
    stored_at: String,
    document: String,
    embedding: Vec<u8>,
}

impl RawConversation {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_name: row.get(1)?,
            patient_age: row.get(2)?,
            patient_gender: row.get(3)?,
            patient_phone: row.get(4)?,
            diagnosis: row.get(5)?,
            symptoms: row.get(6)?,
            medications: row.get(7)?,
            allergies: row.get(8)?,
            chronic_conditions: row.get(9)?,
            conversation_id: row.get(10)?,
            conversation_date: row.get(11)?,
            promoter_id: row.get(12)?,
            priority_level: row.get(13)?,
            follow_up_needed: row.get(14)?,
            conversation_type: row.get(15)?,
            stored_at: row.get(16)?,
            document: row.get(17)?,
            embedding: row.get(18)?,
        })
    }

    fn parse_list(&self, raw: &str) -> DbResult<TokenSet> {
        TokenSet::from_canonical_json(raw).map_err(|source| DbError::ListRoundTrip {
            id: self.id.clone(),
            source,
        })
    }

    fn finish(self) -> DbResult<StoredConversation> {
        let meta = ConversationMeta {
            patient_name: self.patient_name.clone(),
            patient_age: self.patient_age,
            patient_gender: self.patient_gender.as_deref().and_then(Gender::parse),
            patient_phone: self.patient_phone.clone(),
            diagnosis: self.diagnosis.clone(),
            symptoms: self.parse_list(&self.symptoms)?,
            medications: self.parse_list(&self.medications)?,
            allergies: self.parse_list(&self.allergies)?,
            chronic_conditions: self.parse_list(&self.chronic_conditions)?,
            conversation_id: self.conversation_id.clone(),
            conversation_date: self.conversation_date.clone(),
            promoter_id: self.promoter_id.clone(),
            // Upheld by the CHECK constraint on priority_level.
            priority_level: Priority::parse(&self.priority_level).unwrap_or(Priority::Normal),
            follow_up_needed: self.follow_up_needed,
            conversation_type: self.conversation_type.clone(),
            stored_at: self.stored_at.clone(),
        };
        Ok(StoredConversation {
            id: self.id,
            meta,
            document: self.document,
            embedding: vector_from_bytes(&self.embedding),
        })
    }
}

impl Database {
    /// Insert a new conversation record. Fails with [`DbError::Duplicate`]
    /// when the id is already stored; records are immutable once written.
    pub fn insert_conversation(&self, record: &StoredConversation) -> DbResult<()> {
        let m = &record.meta;
        self.conn()
            .execute(
                "INSERT INTO conversations (id, patient_name, patient_age, patient_gender, \
                 patient_phone, diagnosis, symptoms_list, medications_list, allergies_list, \
                 chronic_conditions_list, conversation_id, conversation_date, promoter_id, \
                 priority_level, follow_up_needed, conversation_type, stored_at, document, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    record.id,
                    m.patient_name,
                    m.patient_age,
                    m.patient_gender.map(Gender::as_str),
                    m.patient_phone,
                    m.diagnosis,
                    m.symptoms.to_canonical_json()?,
                    m.medications.to_canonical_json()?,
                    m.allergies.to_canonical_json()?,
                    m.chronic_conditions.to_canonical_json()?,
                    m.conversation_id,
                    m.conversation_date,
                    m.promoter_id,
                    m.priority_level.as_str(),
                    m.follow_up_needed,
                    m.conversation_type,
                    m.stored_at,
                    record.document,
                    vector_to_bytes(&record.embedding),
                ],
            )
            .map_err(|e| map_insert_err(e, &record.id))?;
        Ok(())
    }

    /// Fetch the records whose ids exist. Missing ids are skipped, never an
    /// error.
    pub fn get_conversations(&self, ids: &[String]) -> DbResult<Vec<StoredConversation>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"))?;
        let mut found = Vec::new();
        for id in ids {
            let raw = stmt
                .query_row(params![id], RawConversation::read)
                .optional()?;
            if let Some(raw) = raw {
                found.push(raw.finish()?);
            }
        }
        Ok(found)
    }

    /// All records passing the filter, in insertion order. `None` means no
    /// filter, which returns the whole collection.
    pub fn query_conversations(
        &self,
        filter: Option<&Predicate>,
    ) -> DbResult<Vec<StoredConversation>> {
        let (clause, values) = match filter {
            Some(predicate) => predicate.compile(),
            None => (String::new(), Vec::new()),
        };
        let sql = if clause.is_empty() {
            format!("SELECT {COLUMNS} FROM conversations ORDER BY rowid")
        } else {
            format!("SELECT {COLUMNS} FROM conversations WHERE {clause} ORDER BY rowid")
        };
        let mut stmt = self.conn().prepare(&sql)?;
        let raw_rows: Vec<RawConversation> = stmt
            .query_map(params_from_iter(values), RawConversation::read)?
            .collect::<rusqlite::Result<_>>()?;
        raw_rows.into_iter().map(RawConversation::finish).collect()
    }

    pub fn count_conversations(&self) -> DbResult<u64> {
        let count: u64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(count)
    }
}
