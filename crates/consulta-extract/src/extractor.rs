//! Rule-based extraction of structured patient data from a transcript.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::keywords;
use crate::record::{
    Gender, Priority, StructuredRecord, TokenSet, DIAGNOSIS_PENDING, TIMESTAMP_FORMAT,
};

/// Deterministic transcript extractor. All patterns are compiled once in
/// [`Extractor::new`]; extraction itself is a pure function of the
/// transcript text and the supplied instant.
pub struct Extractor {
    name_patterns: Vec<Regex>,
    name_tail: Regex,
    name_stopwords: Regex,
    age_patterns: Vec<Regex>,
    phone_patterns: Vec<Regex>,
    diagnosis_patterns: Vec<Regex>,
}

impl Extractor {
    pub fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("static pattern");
        Self {
            name_patterns: [
                r"mi nombre es (\w+(?:\s+\w+)*)",
                r"me llamo (\w+(?:\s+\w+)*)",
                r"soy (\w+(?:\s+\w+)*)",
                r"paciente (\w+(?:\s+\w+)*)",
                r"señor (\w+(?:\s+\w+)*)",
                r"señora (\w+(?:\s+\w+)*)",
            ]
            .into_iter()
            .map(compile)
            .collect(),
            name_tail: compile(r"\s+(tengo|tiene|años|edad|\d+).*$"),
            name_stopwords: compile(
                r"\b(y|desde|hace|tres|días|tengo|fiebre|dolor|cabeza|tos)\b",
            ),
            age_patterns: [
                r"(\d+)\s*años",
                r"edad\s*(\d+)",
                r"tengo\s*(\d+)\s*años",
                r"tiene\s*(\d+)\s*años",
            ]
            .into_iter()
            .map(compile)
            .collect(),
            phone_patterns: [
                r"(\d{3}[-.\s]?\d{3}[-.\s]?\d{4})",
                r"(\d{10})",
                r"(\+\d{1,3}[-.\s]?\d{3}[-.\s]?\d{3}[-.\s]?\d{4})",
            ]
            .into_iter()
            .map(compile)
            .collect(),
            diagnosis_patterns: [
                r"diagnóstico\s*:?\s*([^.]+)",
                r"diagnosis\s*:?\s*([^.]+)",
                r"parece\s+(?:ser|que\s+es|tener)\s+([^.]+)",
                r"posible\s+([^.]+)",
                r"probable\s+([^.]+)",
                r"sospecha\s+de\s+([^.]+)",
                r"indicativo\s+de\s+([^.]+)",
            ]
            .into_iter()
            .map(compile)
            .collect(),
        }
    }

    /// Extract a record using the current wall clock.
    pub fn extract(&self, transcript: &str) -> StructuredRecord {
        self.extract_at(transcript, Utc::now())
    }

    /// Extract a record dated at `now`. Calling this twice with the same
    /// arguments yields identical records.
    pub fn extract_at(&self, transcript: &str, now: DateTime<Utc>) -> StructuredRecord {
        let lower = transcript.to_lowercase();
        let symptoms = contained_categories(&lower, keywords::SYMPTOMS);
        StructuredRecord {
            conversation_id: now.format("conv_%Y%m%d_%H%M%S").to_string(),
            conversation_date: now.format(TIMESTAMP_FORMAT).to_string(),
            transcript: transcript.to_owned(),
            name: self.name(&lower),
            age: self.age(&lower),
            gender: gender(&lower),
            phone: self.phone(transcript),
            diagnosis: self.diagnosis(&lower, &symptoms),
            symptoms,
            medications: contained_keywords(&lower, keywords::MEDICATIONS),
            allergies: contained_keywords(&lower, keywords::ALLERGIES),
            chronic_conditions: contained_keywords(&lower, keywords::CHRONIC_CONDITIONS),
            priority: priority(&lower),
            follow_up_needed: keywords::FOLLOW_UP.iter().any(|kw| lower.contains(kw)),
            conversation_type: "initial_contact".to_owned(),
            promoter_id: None,
        }
    }

    fn name(&self, lower: &str) -> Option<String> {
        for pattern in &self.name_patterns {
            let Some(capture) = pattern.captures(lower).and_then(|c| c.get(1)) else {
                continue;
            };
            // Cut the "tengo 45 años…" tail, then drop stray non-name words.
            let trimmed = self.name_tail.replace(capture.as_str(), "");
            let cleaned = self.name_stopwords.replace_all(trimmed.trim(), "");
            let cleaned = cleaned.trim();
            if cleaned.chars().count() > 2 && cleaned.split_whitespace().count() <= 4 {
                return Some(title_case(cleaned));
            }
        }
        None
    }

    fn age(&self, lower: &str) -> Option<u8> {
        for pattern in &self.age_patterns {
            if let Some(capture) = pattern.captures(lower).and_then(|c| c.get(1)) {
                if let Ok(age) = capture.as_str().parse::<u8>() {
                    if age > 0 && age < 120 {
                        return Some(age);
                    }
                }
            }
        }
        None
    }

    fn phone(&self, transcript: &str) -> Option<String> {
        self.phone_patterns
            .iter()
            .find_map(|p| p.captures(transcript))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned())
    }

    fn diagnosis(&self, lower: &str, symptoms: &TokenSet) -> String {
        for pattern in &self.diagnosis_patterns {
            if let Some(capture) = pattern.captures(lower).and_then(|c| c.get(1)) {
                let phrase = capture.as_str().trim();
                if phrase.chars().count() > 3 {
                    return title_case(phrase);
                }
            }
        }
        for &(symptom, diagnosis) in keywords::SYMPTOM_DIAGNOSES {
            if symptoms.contains(symptom) {
                return format!("Posible {diagnosis} (basado en síntomas)");
            }
        }
        DIAGNOSIS_PENDING.to_owned()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn gender(lower: &str) -> Option<Gender> {
    // Masculine indicators first; "señora" contains "señor", so transcripts
    // saying only "señora" classify as masculine, matching the established
    // first-set-wins cascade.
    if keywords::MASCULINE.iter().any(|kw| lower.contains(kw)) {
        Some(Gender::Masculine)
    } else if keywords::FEMININE.iter().any(|kw| lower.contains(kw)) {
        Some(Gender::Feminine)
    } else {
        None
    }
}

fn priority(lower: &str) -> Priority {
    if keywords::HIGH_PRIORITY.iter().any(|kw| lower.contains(kw)) {
        Priority::Alta
    } else if keywords::MEDIUM_PRIORITY.iter().any(|kw| lower.contains(kw)) {
        Priority::Media
    } else {
        Priority::Normal
    }
}

fn contained_categories(lower: &str, table: &[(&str, &[&str])]) -> TokenSet {
    table
        .iter()
        .filter(|(_, synonyms)| synonyms.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| *category)
        .collect()
}

fn contained_keywords(lower: &str, table: &[&str]) -> TokenSet {
    table.iter().copied().filter(|kw| lower.contains(*kw)).collect()
}

/// Capitalize the first letter of each whitespace-separated word.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
