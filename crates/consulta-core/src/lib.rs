//! Consulta Core Library
//!
//! Hybrid archive of Spanish medical-conversation transcripts: typed
//! metadata for exact filtering plus embedded documents for semantic
//! ranking, with per-patient aggregation on top.
//!
//! # Architecture
//!
//! ```text
//! Transcript ──► Extractor ──► StructuredRecord
//!                                    │
//!                      ┌─────────────┴─────────────┐
//!                      ▼                           ▼
//!              Document builder             Metadata row
//!              (Spanish sections)       (typed, scalar columns)
//!                      │                           │
//!                      ▼                           │
//!                  Embedder                        │
//!                      │                           │
//!                      └──────────┬────────────────┘
//!                                 ▼
//!                 ┌───────────────────────────────┐
//!                 │ conversations  +  profiles    │  one transaction
//!                 │ (append-only)     (upserted)  │  per ingestion
//!                 └───────────────┬───────────────┘
//!                                 │
//!                 ┌───────────────┼───────────────┐
//!                 ▼               ▼               ▼
//!            QueryEngine     Aggregator       Exporter
//!          (filter + rank)  (per-patient)   (JSON snapshot)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite layer holding the two collections
//! - [`models`]: metadata schemas, derived ids, summary types
//! - [`document`]: embedding-text builder
//! - [`embed`]: embedder trait, default hash embedder, cosine distance
//! - [`search`]: predicate compilation and semantic ranking
//! - [`aggregate`]: patient summaries and profile upserts
//! - [`export`]: collection snapshots

pub mod aggregate;
pub mod db;
pub mod document;
pub mod embed;
pub mod export;
pub mod models;
pub mod search;

pub use aggregate::Aggregator;
pub use consulta_extract::{
    Extractor, Gender, Priority, StructuredRecord, TokenSet, DIAGNOSIS_PENDING, TIMESTAMP_FORMAT,
};
pub use db::{Database, DbError, StoredConversation, StoredProfile};
pub use embed::{Embedder, HashEmbedder, EMBEDDING_DIM};
pub use export::{Collection, CollectionExport, Exporter};
pub use models::{
    identity_key, record_id, ConversationMeta, ProfileMeta, ProfileSummary, StorageStats,
};
pub use search::{Constraint, Field, Predicate, QueryEngine, SearchHit, Value};

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<PoisonError<T>> for ArchiveError {
    fn from(e: PoisonError<T>) -> Self {
        ArchiveError::LockPoisoned(e.to_string())
    }
}

/// The archive: extraction, storage, search, aggregation and export behind
/// one explicit, thread-safe context object.
pub struct Archive {
    db: Mutex<Database>,
    extractor: Extractor,
    embedder: Box<dyn Embedder>,
    promoter_id: Option<String>,
}

impl Archive {
    /// Open or create an archive at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        Ok(Self::with_database(Database::open(path)?))
    }

    /// Create an in-memory archive (for testing).
    pub fn open_in_memory() -> Result<Self, ArchiveError> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    fn with_database(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            extractor: Extractor::new(),
            embedder: Box::new(HashEmbedder::new()),
            promoter_id: None,
        }
    }

    /// Stamp every ingested record with this promoter id.
    pub fn with_promoter(mut self, promoter_id: impl Into<String>) -> Self {
        self.promoter_id = Some(promoter_id.into());
        self
    }

    /// Replace the default hash embedder, e.g. with a real sentence model.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Ingest one transcript using the current wall clock. Returns the id of
    /// the stored conversation record.
    pub fn ingest(&self, transcript: &str) -> Result<String, ArchiveError> {
        self.ingest_at(transcript, Utc::now())
    }

    /// Ingest one transcript dated at `now`. Extraction, the conversation
    /// insert and the profile upsert run all-or-nothing: any failure leaves
    /// the store untouched.
    pub fn ingest_at(&self, transcript: &str, now: DateTime<Utc>) -> Result<String, ArchiveError> {
        let mut record = self.extractor.extract_at(transcript, now);
        record.promoter_id = self.promoter_id.clone();

        let stored_at = now.format(TIMESTAMP_FORMAT).to_string();
        let document = document::conversation_document(&record);
        let embedding = self.embedder.embed(&document);
        let stored = StoredConversation {
            id: record_id(&record.conversation_id, record.name.as_deref(), &stored_at),
            meta: ConversationMeta::from_record(&record, stored_at.clone()),
            document,
            embedding,
        };

        let db = self.db.lock()?;
        let tx = db.transaction()?;
        db.insert_conversation(&stored)?;
        Aggregator::new(&db, self.embedder.as_ref()).upsert_profile(&record, &stored_at)?;
        tx.commit().map_err(DbError::from)?;

        info!(
            record_id = %stored.id,
            conversation_id = %record.conversation_id,
            patient = record.name.as_deref().unwrap_or("?"),
            priority = record.priority.as_str(),
            "conversation ingested"
        );
        Ok(stored.id)
    }

    // =========================================================================
    // Search (degrades to empty on store failure)
    // =========================================================================

    /// Free-text semantic search over the whole conversation collection.
    pub fn search(&self, query: &str, n_results: usize) -> Vec<SearchHit> {
        self.run_search("search", |engine| engine.search(query, n_results, None))
    }

    /// Semantic search restricted to rows passing the predicate.
    pub fn search_filtered(
        &self,
        query: &str,
        n_results: usize,
        predicate: &Predicate,
    ) -> Vec<SearchHit> {
        self.run_search("search_filtered", |engine| {
            engine.search(query, n_results, Some(predicate))
        })
    }

    pub fn search_by_name(&self, patient_name: &str, n_results: usize) -> Vec<SearchHit> {
        self.run_search("search_by_name", |engine| {
            engine.by_patient_name(patient_name, n_results)
        })
    }

    pub fn search_by_symptoms(&self, symptoms: &[&str], n_results: usize) -> Vec<SearchHit> {
        self.run_search("search_by_symptoms", |engine| {
            engine.by_symptoms(symptoms, n_results)
        })
    }

    pub fn search_by_diagnosis(&self, keywords: &[&str], n_results: usize) -> Vec<SearchHit> {
        self.run_search("search_by_diagnosis", |engine| {
            engine.by_diagnosis(keywords, n_results)
        })
    }

    pub fn search_by_date_range(
        &self,
        start_date: &str,
        end_date: &str,
        n_results: usize,
    ) -> Vec<SearchHit> {
        self.run_search("search_by_date_range", |engine| {
            engine.by_date_range(start_date, end_date, n_results)
        })
    }

    pub fn search_by_priority(&self, priority: Priority, n_results: usize) -> Vec<SearchHit> {
        self.run_search("search_by_priority", |engine| {
            engine.by_priority(priority, n_results)
        })
    }

    pub fn search_by_promoter(&self, promoter_id: &str, n_results: usize) -> Vec<SearchHit> {
        self.run_search("search_by_promoter", |engine| {
            engine.by_promoter(promoter_id, n_results)
        })
    }

    pub fn search_high_priority(&self, n_results: usize) -> Vec<SearchHit> {
        self.run_search("search_high_priority", |engine| engine.high_priority(n_results))
    }

    /// A patient's conversations, most recent first.
    pub fn history(&self, patient_name: &str, limit: usize) -> Vec<SearchHit> {
        let Ok(db) = self.lock_for_read("history") else {
            return Vec::new();
        };
        let aggregator = Aggregator::new(&db, self.embedder.as_ref());
        match aggregator.history(patient_name, limit) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(operation = "history", error = %e, "store failure, returning no hits");
                Vec::new()
            }
        }
    }

    fn run_search<F>(&self, operation: &str, f: F) -> Vec<SearchHit>
    where
        F: FnOnce(&QueryEngine<'_>) -> db::DbResult<Vec<SearchHit>>,
    {
        let Ok(db) = self.lock_for_read(operation) else {
            return Vec::new();
        };
        let engine = QueryEngine::new(&db, self.embedder.as_ref());
        match f(&engine) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(operation, error = %e, "store failure, returning no hits");
                Vec::new()
            }
        }
    }

    fn lock_for_read(&self, operation: &str) -> Result<MutexGuard<'_, Database>, ()> {
        self.db.lock().map_err(|e| {
            warn!(operation, error = %e, "store lock poisoned, returning no hits");
        })
    }

    // =========================================================================
    // Aggregation, stats, export
    // =========================================================================

    /// Merged cross-conversation view of one patient. `None` when the store
    /// holds no conversation for that name.
    pub fn profile(&self, patient_name: &str) -> Result<Option<ProfileSummary>, ArchiveError> {
        let db = self.db.lock()?;
        let aggregator = Aggregator::new(&db, self.embedder.as_ref());
        Ok(aggregator.summarize(patient_name)?)
    }

    /// Store-wide counters.
    pub fn stats(&self) -> Result<StorageStats, ArchiveError> {
        let db = self.db.lock()?;
        Ok(StorageStats {
            total_patients: db.count_profiles()?,
            total_conversations: db.count_conversations()?,
            storage_size_bytes: db.storage_size_bytes()?,
        })
    }

    /// Snapshot a collection for interchange.
    pub fn export(&self, collection: Collection) -> Result<CollectionExport, ArchiveError> {
        let db = self.db.lock()?;
        Ok(Exporter::new(&db).export(collection)?)
    }
}
