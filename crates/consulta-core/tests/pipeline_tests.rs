//! End-to-end pipeline tests: transcript in, ranked and aggregated views out.

use chrono::{DateTime, TimeZone, Utc};
use consulta_core::{
    Archive, ArchiveError, Collection, DbError, Field, Predicate, Priority,
};

const JUANA: &str = "Hola, mi nombre es juana, tengo 45 años y tengo fiebre y dolor de cabeza \
     desde hace tres días. Estoy tomando paracetamol. Quiero saber qué debo hacer.";

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 14, minute, 0).unwrap()
}

#[test]
fn test_ingest_extracts_and_stores_record() {
    let archive = Archive::open_in_memory().unwrap().with_promoter("promoter_1");
    let id = archive.ingest_at(JUANA, at(0)).unwrap();

    let hits = archive.search_by_name("Juana", 10);
    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert_eq!(hit.id, id);
    assert_eq!(hit.meta.patient_name.as_deref(), Some("Juana"));
    assert_eq!(hit.meta.patient_age, Some(45));
    assert!(hit.meta.symptoms.contains("fiebre"));
    assert!(hit.meta.symptoms.contains("dolor de cabeza"));
    assert!(hit.meta.medications.contains("paracetamol"));
    assert!(hit.meta.follow_up_needed);
    assert_eq!(hit.meta.promoter_id.as_deref(), Some("promoter_1"));
    assert_eq!(hit.meta.conversation_date, "2024-03-05T14:00:00Z");
    // The raw transcript is embedded verbatim in the stored document.
    assert!(hit.document.contains("mi nombre es juana"));
}

#[test]
fn test_full_name_scenario_end_to_end() {
    let archive = Archive::open_in_memory().unwrap();
    archive
        .ingest_at(
            "Hola, soy Juana De La Torre, 45 años, tengo fiebre y dolor de cabeza",
            at(0),
        )
        .unwrap();

    let hits = archive.search_by_name("Juana De La Torre", 10);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].meta.patient_name.as_deref(), Some("Juana De La Torre"));
    assert_eq!(hits[0].meta.patient_age, Some(45));
    assert!(hits[0].meta.symptoms.contains("fiebre"));
    assert!(hits[0].meta.symptoms.contains("dolor de cabeza"));
    assert_eq!(hits[0].meta.priority_level, Priority::Normal);

    let summary = archive.profile("Juana De La Torre").unwrap().unwrap();
    assert_eq!(summary.total_conversations, 1);
}

#[test]
fn test_priority_cascade_reaches_search() {
    let archive = Archive::open_in_memory().unwrap();
    archive
        .ingest_at("me llamo pedro y siento dolor en el pecho", at(0))
        .unwrap();
    archive.ingest_at("me llamo ana y tengo fiebre alta", at(1)).unwrap();
    archive.ingest_at("me llamo luis, todo bien", at(2)).unwrap();

    let high = archive.search_high_priority(10);
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].meta.priority_level, Priority::Alta);

    let media = archive.search_by_priority(Priority::Media, 10);
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].meta.patient_name.as_deref(), Some("Ana"));
}

#[test]
fn test_filter_conjunction_is_hard() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.db");

    // Same emergency text ingested by two different promoters.
    let p1 = Archive::open(&path).unwrap().with_promoter("p1");
    p1.ingest_at("siento dolor en el pecho", at(0)).unwrap();
    drop(p1);
    let p2 = Archive::open(&path).unwrap().with_promoter("p2");
    p2.ingest_at("siento dolor en el pecho", at(1)).unwrap();

    let predicate = Predicate::new()
        .eq(Field::PriorityLevel, "alta")
        .eq(Field::PromoterId, "p1");
    let hits = p2.search_filtered("emergencia dolor pecho", 10, &predicate);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].meta.promoter_id.as_deref(), Some("p1"));

    // Semantic closeness never overrides a failed predicate.
    let none = p2.search_filtered(
        "emergencia dolor pecho",
        10,
        &Predicate::new().eq(Field::PromoterId, "p3"),
    );
    assert!(none.is_empty());
}

#[test]
fn test_profile_aggregates_across_conversations() {
    let archive = Archive::open_in_memory().unwrap();
    archive
        .ingest_at("mi nombre es juana y tengo fiebre", at(0))
        .unwrap();
    archive
        .ingest_at("mi nombre es juana y ahora tengo tos", at(1))
        .unwrap();

    let summary = archive.profile("Juana").unwrap().unwrap();
    assert_eq!(summary.total_conversations, 2);
    assert!(summary.all_symptoms.contains("fiebre"));
    assert!(summary.all_symptoms.contains("tos"));
    assert_eq!(summary.first_conversation.as_deref(), Some("2024-03-05T14:00:00Z"));
    assert_eq!(summary.last_conversation.as_deref(), Some("2024-03-05T14:01:00Z"));

    assert!(archive.profile("Nadie").unwrap().is_none());
}

#[test]
fn test_identity_upsert_keeps_single_profile() {
    let archive = Archive::open_in_memory().unwrap();
    archive
        .ingest_at("mi nombre es juana y tengo fiebre", at(0))
        .unwrap();
    archive
        .ingest_at("mi nombre es juana y tengo tos", at(1))
        .unwrap();

    let stats = archive.stats().unwrap();
    assert_eq!(stats.total_patients, 1);
    assert_eq!(stats.total_conversations, 2);
    assert!(stats.storage_size_bytes > 0);
}

#[test]
fn test_duplicate_ingestion_propagates_and_counts_once() {
    let archive = Archive::open_in_memory().unwrap();
    archive.ingest_at(JUANA, at(0)).unwrap();

    // Same transcript at the same instant derives the same record id; the
    // whole ingestion aborts and the profile counter does not move.
    match archive.ingest_at(JUANA, at(0)) {
        Err(ArchiveError::Database(DbError::Duplicate(_))) => {}
        other => panic!("expected Duplicate, got {other:?}"),
    }
    let stats = archive.stats().unwrap();
    assert_eq!(stats.total_conversations, 1);
    assert_eq!(stats.total_patients, 1);
    let summary = archive.profile("Juana").unwrap().unwrap();
    assert_eq!(summary.total_conversations, 1);
}

#[test]
fn test_search_ranks_by_semantic_distance() {
    let archive = Archive::open_in_memory().unwrap();
    archive
        .ingest_at("tengo fiebre y tos desde hace tres días", at(0))
        .unwrap();
    archive
        .ingest_at("vengo a renovar un documento administrativo", at(1))
        .unwrap();

    let hits = archive.search("paciente con fiebre y tos", 10);
    assert_eq!(hits.len(), 2);
    assert!(hits[0].distance <= hits[1].distance);
    assert!(hits[0].meta.symptoms.contains("fiebre"));
}

#[test]
fn test_search_by_symptoms_requires_all_tokens() {
    let archive = Archive::open_in_memory().unwrap();
    archive.ingest_at("tengo fiebre y tos", at(0)).unwrap();
    archive.ingest_at("tengo fiebre solamente", at(1)).unwrap();

    let both = archive.search_by_symptoms(&["fiebre", "tos"], 10);
    assert_eq!(both.len(), 1);
    assert!(both[0].meta.symptoms.contains("tos"));

    let fever = archive.search_by_symptoms(&["fiebre"], 10);
    assert_eq!(fever.len(), 2);
}

#[test]
fn test_search_by_date_range_inclusive() {
    let archive = Archive::open_in_memory().unwrap();
    archive.ingest_at("primera charla", at(0)).unwrap();
    archive.ingest_at("segunda charla", at(1)).unwrap();
    archive.ingest_at("tercera charla", at(2)).unwrap();

    let hits = archive.search_by_date_range("2024-03-05T14:00:00Z", "2024-03-05T14:01:00Z", 10);
    assert_eq!(hits.len(), 2);
}

#[test]
fn test_history_most_recent_first() {
    let archive = Archive::open_in_memory().unwrap();
    archive
        .ingest_at("mi nombre es juana y tengo fiebre", at(0))
        .unwrap();
    archive
        .ingest_at("mi nombre es juana y tengo tos", at(5))
        .unwrap();

    let history = archive.history("Juana", 10);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].meta.conversation_date, "2024-03-05T14:05:00Z");
    assert_eq!(history[1].meta.conversation_date, "2024-03-05T14:00:00Z");
}

#[test]
fn test_empty_and_unmatched_queries_are_safe() {
    let archive = Archive::open_in_memory().unwrap();
    assert!(archive.search("", 5).is_empty());
    assert!(archive.search_by_name("Nadie", 5).is_empty());
    assert!(archive.history("Nadie", 5).is_empty());

    archive.ingest_at("tengo tos", at(0)).unwrap();
    // Empty query text ranks everything at maximal distance but still works.
    assert_eq!(archive.search("", 5).len(), 1);
}

#[test]
fn test_export_snapshots_both_collections() {
    let archive = Archive::open_in_memory().unwrap();
    let id = archive.ingest_at(JUANA, at(0)).unwrap();

    let conversations = archive.export(Collection::Conversations).unwrap();
    assert_eq!(conversations.collection_name, "conversations");
    assert_eq!(conversations.total_documents, 1);
    assert_eq!(conversations.documents[0].id, id);
    assert_eq!(
        conversations.documents[0].metadata["patient_name"],
        serde_json::json!("Juana")
    );

    let profiles = archive.export(Collection::Profiles).unwrap();
    assert_eq!(profiles.collection_name, "patients");
    assert_eq!(profiles.total_documents, 1);
    assert!(profiles.documents[0].id.starts_with("patient_"));
    assert!(profiles.documents[0].document.contains("Paciente: Juana"));

    let json = conversations.to_json().unwrap();
    assert!(json.contains("\"collection_name\": \"conversations\""));
}

#[test]
fn test_archive_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.db");

    let archive = Archive::open(&path).unwrap();
    archive.ingest_at(JUANA, at(0)).unwrap();
    drop(archive);

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.stats().unwrap().total_conversations, 1);
    let hits = reopened.search_by_name("Juana", 10);
    assert_eq!(hits.len(), 1);
}
