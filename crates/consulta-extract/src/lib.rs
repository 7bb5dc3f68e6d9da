//! Rule-based entity extraction from Spanish medical-conversation
//! transcripts.
//!
//! The extractor turns free text from community health conversations into a
//! [`StructuredRecord`]: patient identity, symptoms, medications, a derived
//! diagnosis hint, attention priority and a follow-up flag. Extraction is
//! deterministic and never fails; transcripts that reveal nothing produce a
//! well-typed record with empty fields.

mod extractor;
mod keywords;
mod record;

pub use extractor::Extractor;
pub use record::{
    Gender, Priority, StructuredRecord, TokenSet, DIAGNOSIS_PENDING, TIMESTAMP_FORMAT,
};
