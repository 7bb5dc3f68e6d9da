//! Patient profile collection operations.

use consulta_extract::Gender;
use rusqlite::{params, OptionalExtension};

use super::{map_insert_err, Database, DbError, DbResult};
use crate::embed::{vector_from_bytes, vector_to_bytes};
use crate::models::ProfileMeta;

/// One stored patient profile, keyed by the identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub id: String,
    pub meta: ProfileMeta,
    pub document: String,
    pub embedding: Vec<f32>,
}

const COLUMNS: &str = "id, patient_name, patient_age, patient_gender, patient_phone, \
     last_conversation_id, total_conversations, updated_at, document, embedding";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredProfile> {
    let gender: Option<String> = row.get(3)?;
    let embedding: Vec<u8> = row.get(9)?;
    Ok(StoredProfile {
        id: row.get(0)?,
        meta: ProfileMeta {
            patient_name: row.get(1)?,
            patient_age: row.get(2)?,
            patient_gender: gender.as_deref().and_then(Gender::parse),
            patient_phone: row.get(4)?,
            last_conversation_id: row.get(5)?,
            total_conversations: row.get(6)?,
            updated_at: row.get(7)?,
        },
        document: row.get(8)?,
        embedding: vector_from_bytes(&embedding),
    })
}

impl Database {
    /// Create a new profile. Fails with [`DbError::Duplicate`] when a profile
    /// with the same identity key already exists.
    pub fn insert_profile(&self, profile: &StoredProfile) -> DbResult<()> {
        let m = &profile.meta;
        self.conn()
            .execute(
                "INSERT INTO profiles (id, patient_name, patient_age, patient_gender, \
                 patient_phone, last_conversation_id, total_conversations, updated_at, \
                 document, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    profile.id,
                    m.patient_name,
                    m.patient_age,
                    m.patient_gender.map(Gender::as_str),
                    m.patient_phone,
                    m.last_conversation_id,
                    m.total_conversations,
                    m.updated_at,
                    profile.document,
                    vector_to_bytes(&profile.embedding),
                ],
            )
            .map_err(|e| map_insert_err(e, &profile.id))?;
        Ok(())
    }

    /// Replace an existing profile in full. Fails with [`DbError::NotFound`]
    /// when no row carries the key.
    pub fn update_profile(&self, profile: &StoredProfile) -> DbResult<()> {
        let m = &profile.meta;
        let affected = self.conn().execute(
            "UPDATE profiles SET patient_name = ?2, patient_age = ?3, patient_gender = ?4, \
             patient_phone = ?5, last_conversation_id = ?6, total_conversations = ?7, \
             updated_at = ?8, document = ?9, embedding = ?10 \
             WHERE id = ?1",
            params![
                profile.id,
                m.patient_name,
                m.patient_age,
                m.patient_gender.map(Gender::as_str),
                m.patient_phone,
                m.last_conversation_id,
                m.total_conversations,
                m.updated_at,
                profile.document,
                vector_to_bytes(&profile.embedding),
            ],
        )?;
        if affected == 0 {
            return Err(DbError::NotFound(profile.id.clone()));
        }
        Ok(())
    }

    pub fn get_profile(&self, id: &str) -> DbResult<Option<StoredProfile>> {
        let profile = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM profiles WHERE id = ?1"),
                params![id],
                read_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn all_profiles(&self) -> DbResult<Vec<StoredProfile>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {COLUMNS} FROM profiles ORDER BY rowid"))?;
        let profiles = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(profiles)
    }

    pub fn count_profiles(&self) -> DbResult<u64> {
        let count: u64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count)
    }
}
