//! Query engine: metadata predicates plus semantic ranking.
//!
//! A search runs in two stages. The predicate is a typed conjunction over
//! whitelisted metadata columns, compiled to a parameterized WHERE clause and
//! applied as a hard filter. Only the eligible rows are then ranked by cosine
//! distance between the query embedding and the stored document embedding.

use consulta_extract::Priority;

use crate::db::{Database, DbResult, StoredConversation};
use crate::embed::{cosine_distance, Embedder};
use crate::models::ConversationMeta;

/// Metadata columns a predicate may touch. Nothing outside this list is
/// filterable, which keeps the compiled SQL injection-free by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PatientName,
    PatientAge,
    PatientGender,
    PatientPhone,
    Diagnosis,
    SymptomsList,
    MedicationsList,
    AllergiesList,
    ChronicConditionsList,
    ConversationId,
    ConversationDate,
    PromoterId,
    PriorityLevel,
    FollowUpNeeded,
    ConversationType,
    StoredAt,
}

impl Field {
    fn column(self) -> &'static str {
        match self {
            Field::PatientName => "patient_name",
            Field::PatientAge => "patient_age",
            Field::PatientGender => "patient_gender",
            Field::PatientPhone => "patient_phone",
            Field::Diagnosis => "diagnosis",
            Field::SymptomsList => "symptoms_list",
            Field::MedicationsList => "medications_list",
            Field::AllergiesList => "allergies_list",
            Field::ChronicConditionsList => "chronic_conditions_list",
            Field::ConversationId => "conversation_id",
            Field::ConversationDate => "conversation_date",
            Field::PromoterId => "promoter_id",
            Field::PriorityLevel => "priority_level",
            Field::FollowUpNeeded => "follow_up_needed",
            Field::ConversationType => "conversation_type",
            Field::StoredAt => "stored_at",
        }
    }
}

/// Scalar comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Value> for rusqlite::types::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(s) => rusqlite::types::Value::Text(s),
            Value::Int(n) => rusqlite::types::Value::Integer(n),
            Value::Bool(b) => rusqlite::types::Value::Integer(b.into()),
        }
    }
}

/// One predicate atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Exact equality.
    Eq(Field, Value),
    /// Substring containment.
    Contains(Field, String),
    /// Inclusive range, lexicographic for text and numeric for integers.
    Between(Field, Value, Value),
}

/// A conjunction of atoms. Empty means "match everything".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    constraints: Vec<Constraint>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.constraints.push(Constraint::Eq(field, value.into()));
        self
    }

    pub fn contains(mut self, field: Field, needle: impl Into<String>) -> Self {
        self.constraints
            .push(Constraint::Contains(field, needle.into()));
        self
    }

    pub fn between(
        mut self,
        field: Field,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Self {
        self.constraints
            .push(Constraint::Between(field, lo.into(), hi.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Compile to a WHERE clause body and its positional parameters. The
    /// clause is empty when the predicate has no atoms.
    pub fn compile(&self) -> (String, Vec<rusqlite::types::Value>) {
        let mut clauses = Vec::with_capacity(self.constraints.len());
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        for constraint in &self.constraints {
            match constraint {
                Constraint::Eq(field, value) => {
                    params.push(value.clone().into());
                    clauses.push(format!("{} = ?{}", field.column(), params.len()));
                }
                Constraint::Contains(field, needle) => {
                    params.push(rusqlite::types::Value::Text(needle.clone()));
                    clauses.push(format!(
                        "instr({}, ?{}) > 0",
                        field.column(),
                        params.len()
                    ));
                }
                Constraint::Between(field, lo, hi) => {
                    params.push(lo.clone().into());
                    let lo_idx = params.len();
                    params.push(hi.clone().into());
                    clauses.push(format!(
                        "{col} BETWEEN ?{lo_idx} AND ?{hi_idx}",
                        col = field.column(),
                        hi_idx = params.len()
                    ));
                }
            }
        }
        (clauses.join(" AND "), params)
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    /// Cosine distance to the query; lower is more similar.
    pub distance: f32,
    pub meta: ConversationMeta,
    pub document: String,
}

/// Searches over the conversation collection.
pub struct QueryEngine<'a> {
    db: &'a Database,
    embedder: &'a dyn Embedder,
}

impl<'a> QueryEngine<'a> {
    pub fn new(db: &'a Database, embedder: &'a dyn Embedder) -> Self {
        Self { db, embedder }
    }

    /// Filter, rank, truncate. Rows tied on distance keep their insertion
    /// order; fewer rows than `n_results` is not an error.
    pub fn search(
        &self,
        query: &str,
        n_results: usize,
        filter: Option<&Predicate>,
    ) -> DbResult<Vec<SearchHit>> {
        let rows = self.db.query_conversations(filter)?;
        let query_vec = self.embedder.embed(query);
        let mut hits: Vec<SearchHit> = rows.into_iter().map(|row| hit(row, &query_vec)).collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n_results);
        Ok(hits)
    }

    /// Conversations whose patient name contains `patient_name`.
    pub fn by_patient_name(&self, patient_name: &str, n_results: usize) -> DbResult<Vec<SearchHit>> {
        let predicate = Predicate::new().contains(Field::PatientName, patient_name);
        self.search(&format!("paciente {patient_name}"), n_results, Some(&predicate))
    }

    /// Conversations mentioning every one of `symptoms`. Each symptom becomes
    /// a containment atom over the quoted token, so "tos" cannot match
    /// "dolor de estómago" inside the stored JSON array.
    pub fn by_symptoms(&self, symptoms: &[&str], n_results: usize) -> DbResult<Vec<SearchHit>> {
        let mut predicate = Predicate::new();
        for symptom in symptoms {
            predicate = predicate.contains(Field::SymptomsList, format!("\"{symptom}\""));
        }
        let query = format!("Síntomas: {}", symptoms.join(", "));
        self.search(&query, n_results, Some(&predicate))
    }

    /// Purely semantic: no filter, the keywords only steer the ranking.
    pub fn by_diagnosis(&self, keywords: &[&str], n_results: usize) -> DbResult<Vec<SearchHit>> {
        let query = format!("Diagnóstico: {}", keywords.join(", "));
        self.search(&query, n_results, None)
    }

    /// Conversations dated within `[start_date, end_date]`, inclusive.
    /// Correct because stored timestamps are fixed-width.
    pub fn by_date_range(
        &self,
        start_date: &str,
        end_date: &str,
        n_results: usize,
    ) -> DbResult<Vec<SearchHit>> {
        let predicate = Predicate::new().between(Field::ConversationDate, start_date, end_date);
        self.search("conversaciones en rango de fechas", n_results, Some(&predicate))
    }

    pub fn by_priority(&self, priority: Priority, n_results: usize) -> DbResult<Vec<SearchHit>> {
        let predicate = Predicate::new().eq(Field::PriorityLevel, priority.as_str());
        self.search(
            &format!("pacientes prioridad {}", priority.as_str()),
            n_results,
            Some(&predicate),
        )
    }

    pub fn by_promoter(&self, promoter_id: &str, n_results: usize) -> DbResult<Vec<SearchHit>> {
        let predicate = Predicate::new().eq(Field::PromoterId, promoter_id);
        self.search(
            &format!("conversaciones promotor {promoter_id}"),
            n_results,
            Some(&predicate),
        )
    }

    pub fn high_priority(&self, n_results: usize) -> DbResult<Vec<SearchHit>> {
        let predicate = Predicate::new().eq(Field::PriorityLevel, Priority::Alta.as_str());
        self.search("paciente alta prioridad emergencia", n_results, Some(&predicate))
    }
}

fn hit(row: StoredConversation, query_vec: &[f32]) -> SearchHit {
    SearchHit {
        distance: cosine_distance(query_vec, &row.embedding),
        id: row.id,
        meta: row.meta,
        document: row.document,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoredConversation;
    use crate::embed::HashEmbedder;
    use crate::models::{record_id, ConversationMeta};
    use chrono::{TimeZone, Utc};
    use consulta_extract::Extractor;

    fn ingest(db: &Database, text: &str, promoter: Option<&str>, minute: u32) {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, minute, 0).unwrap();
        let mut record = Extractor::new().extract_at(text, now);
        record.promoter_id = promoter.map(str::to_owned);
        let stored_at = now.format(consulta_extract::TIMESTAMP_FORMAT).to_string();
        let document = crate::document::conversation_document(&record);
        let embedding = HashEmbedder::new().embed(&document);
        let stored = StoredConversation {
            id: record_id(&record.conversation_id, record.name.as_deref(), &stored_at),
            meta: ConversationMeta::from_record(&record, stored_at),
            document,
            embedding,
        };
        db.insert_conversation(&stored).unwrap();
    }

    #[test]
    fn test_predicate_compiles_conjunction() {
        let predicate = Predicate::new()
            .eq(Field::PriorityLevel, "alta")
            .contains(Field::PatientName, "Juana")
            .between(Field::ConversationDate, "2024-01-01T00:00:00Z", "2024-12-31T23:59:59Z");
        let (clause, params) = predicate.compile();
        assert_eq!(
            clause,
            "priority_level = ?1 AND instr(patient_name, ?2) > 0 \
             AND conversation_date BETWEEN ?3 AND ?4"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_empty_predicate_compiles_to_nothing() {
        let (clause, params) = Predicate::new().compile();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_is_hard_before_ranking() {
        let db = Database::open_in_memory().unwrap();
        // Semantically close to the query but normal priority.
        ingest(&db, "tengo fiebre y dolor en las piernas", None, 1);
        // High priority.
        ingest(&db, "siento dolor en el pecho", None, 2);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);

        let hits = engine.by_priority(Priority::Alta, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meta.priority_level, Priority::Alta);
    }

    #[test]
    fn test_conjunction_filters_all_atoms() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, "siento dolor en el pecho", Some("p1"), 1);
        ingest(&db, "siento dolor en el pecho", Some("p2"), 2);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);

        let predicate = Predicate::new()
            .eq(Field::PriorityLevel, "alta")
            .eq(Field::PromoterId, "p1");
        let hits = engine.search("emergencia", 10, Some(&predicate)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meta.promoter_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_ranking_orders_by_distance() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, "tengo fiebre y tos desde hace tres días", None, 1);
        ingest(&db, "cita administrativa para renovar papeles", None, 2);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);

        let hits = engine.search("paciente con fiebre y tos", 10, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[0].meta.symptoms.contains("fiebre"));
    }

    #[test]
    fn test_truncates_and_tolerates_small_collections() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, "tengo tos", None, 1);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);
        assert_eq!(engine.search("tos", 5, None).unwrap().len(), 1);
        assert_eq!(engine.search("tos", 0, None).unwrap().len(), 0);
    }

    #[test]
    fn test_by_symptoms_quotes_tokens() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, "tengo mucha tos", None, 1);
        ingest(&db, "me duele el estómago, diarrea", None, 2);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);

        let hits = engine.by_symptoms(&["tos"], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].meta.symptoms.contains("tos"));
    }

    #[test]
    fn test_by_date_range_is_inclusive() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, "uno", None, 1);
        ingest(&db, "dos", None, 2);
        ingest(&db, "tres", None, 3);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);

        let hits = engine
            .by_date_range("2024-03-05T14:01:00Z", "2024-03-05T14:02:00Z", 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_by_patient_name_substring() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, "mi nombre es juana de la torre y tengo fiebre", None, 1);
        ingest(&db, "me llamo pedro y tengo tos", None, 2);
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);

        let hits = engine.by_patient_name("Juana", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meta.patient_name.as_deref(), Some("Juana De La Torre"));
    }

    #[test]
    fn test_empty_query_on_empty_store() {
        let db = Database::open_in_memory().unwrap();
        let embedder = HashEmbedder::new();
        let engine = QueryEngine::new(&db, &embedder);
        assert!(engine.search("", 5, None).unwrap().is_empty());
    }
}
