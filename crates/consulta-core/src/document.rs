//! Embedding-text builder.
//!
//! The document is the unstructured counterpart of the metadata row: a fixed
//! sequence of Spanish sections rendered from the record, with explicit
//! placeholder phrases for absent fields so the shape never varies. The full
//! transcript is embedded verbatim.

use consulta_extract::{StructuredRecord, TokenSet};

fn join_or(tokens: &TokenSet, placeholder: &str) -> String {
    if tokens.is_empty() {
        placeholder.to_owned()
    } else {
        tokens.iter().collect::<Vec<_>>().join(", ")
    }
}

/// Render the document embedded for a conversation record.
pub fn conversation_document(record: &StructuredRecord) -> String {
    let name = record.name.as_deref().unwrap_or("no identificado");
    let age = record
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "edad no especificada".to_owned());
    let gender = record
        .gender
        .map(|g| g.as_str().to_owned())
        .unwrap_or_else(|| "no especificado".to_owned());
    let transcript = if record.transcript.trim().is_empty() {
        "Sin transcripción disponible"
    } else {
        record.transcript.as_str()
    };
    let promoter = record.promoter_id.as_deref().unwrap_or("no especificado");
    let follow_up = if record.follow_up_needed { "Sí" } else { "No" };

    format!(
        "INFORMACIÓN DEL PACIENTE:\n\
         Paciente {name} de {age} años, género {gender}.\n\
         \n\
         SÍNTOMAS Y CONTEXTO CONVERSACIONAL:\n\
         El paciente presenta: {symptoms}\n\
         \n\
         CONTEXTO MÉDICO:\n\
         Medicamentos mencionados: {medications}\n\
         Alergias conocidas: {allergies}\n\
         Condiciones crónicas: {chronic}\n\
         \n\
         TRANSCRIPCIÓN COMPLETA DE LA CONVERSACIÓN:\n\
         {transcript}\n\
         \n\
         OBSERVACIONES Y CONTEXTO:\n\
         Prioridad de atención: {priority}\n\
         Tipo de conversación: {conversation_type}\n\
         Necesita seguimiento: {follow_up}\n\
         Promotor: {promoter}\n\
         Fecha de la conversación: {date}\n\
         \n\
         ANÁLISIS CONTEXTUAL:\n\
         Este paciente se encuentra en una consulta de {conversation_type} \
         con síntomas que sugieren {diagnosis}.",
        symptoms = join_or(&record.symptoms, "sin síntomas específicos"),
        medications = join_or(&record.medications, "ninguno mencionado"),
        allergies = join_or(&record.allergies, "no mencionadas"),
        chronic = join_or(&record.chronic_conditions, "no mencionadas"),
        priority = record.priority.as_str(),
        conversation_type = record.conversation_type,
        date = record.conversation_date,
        diagnosis = record.diagnosis,
    )
}

/// Render the short summary document embedded for a patient profile.
/// Callers must only invoke this for named records.
pub fn profile_document(record: &StructuredRecord) -> String {
    let name = record.name.as_deref().unwrap_or("no identificado");
    let age = record
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "No especificada".to_owned());
    let gender = record
        .gender
        .map(|g| g.as_str().to_owned())
        .unwrap_or_else(|| "No especificado".to_owned());
    format!(
        "Paciente: {name}\n\
         Edad: {age} años\n\
         Género: {gender}\n\
         Síntomas principales: {symptoms}\n\
         Medicamentos: {medications}\n\
         Última conversación: {date}",
        symptoms = join_or(&record.symptoms, ""),
        medications = join_or(&record.medications, ""),
        date = record.conversation_date,
    )
}
