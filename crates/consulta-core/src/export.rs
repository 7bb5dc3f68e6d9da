//! JSON snapshot export of a collection.

use chrono::Utc;
use consulta_extract::TIMESTAMP_FORMAT;
use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};

/// The two collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "conversations")]
    Conversations,
    #[serde(rename = "patients")]
    Profiles,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Conversations => "conversations",
            Collection::Profiles => "patients",
        }
    }
}

/// One exported document: the metadata row plus the embedded text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDocument {
    pub id: String,
    pub metadata: serde_json::Value,
    pub document: String,
}

/// Self-describing snapshot of a whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionExport {
    pub collection_name: String,
    pub export_date: String,
    pub total_documents: usize,
    pub documents: Vec<ExportedDocument>,
}

impl CollectionExport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Read-only exporter over the database.
pub struct Exporter<'a> {
    db: &'a Database,
}

impl<'a> Exporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Snapshot every document of `collection`, in insertion order.
    pub fn export(&self, collection: Collection) -> DbResult<CollectionExport> {
        let documents = match collection {
            Collection::Conversations => self
                .db
                .query_conversations(None)?
                .into_iter()
                .map(|row| {
                    Ok(ExportedDocument {
                        id: row.id,
                        metadata: serde_json::to_value(&row.meta)?,
                        document: row.document,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?,
            Collection::Profiles => self
                .db
                .all_profiles()?
                .into_iter()
                .map(|row| {
                    Ok(ExportedDocument {
                        id: row.id,
                        metadata: serde_json::to_value(&row.meta)?,
                        document: row.document,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?,
        };
        Ok(CollectionExport {
            collection_name: collection.name().to_owned(),
            export_date: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            total_documents: documents.len(),
            documents,
        })
    }
}
