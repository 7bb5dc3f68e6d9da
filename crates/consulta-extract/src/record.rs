//! Structured record model shared by the extractor and the archive.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-width UTC timestamp format used everywhere a date is stored.
///
/// Zero-padded and constant-width, so lexicographic comparison of two
/// rendered timestamps agrees with chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Placeholder diagnosis when nothing could be derived from the transcript.
pub const DIAGNOSIS_PENDING: &str = "Diagnóstico pendiente";

/// Patient gender as spoken in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "masculino")]
    Masculine,
    #[serde(rename = "femenino")]
    Feminine,
}

impl Gender {
    /// Wire value stored in metadata columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Masculine => "masculino",
            Gender::Feminine => "femenino",
        }
    }

    /// Parse a wire value back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "masculino" => Some(Gender::Masculine),
            "femenino" => Some(Gender::Feminine),
            _ => None,
        }
    }
}

/// Attention priority derived from the transcript, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "media")]
    Media,
    #[serde(rename = "alta")]
    Alta,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Media => "media",
            Priority::Alta => "alta",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Priority::Normal),
            "media" => Some(Priority::Media),
            "alta" => Some(Priority::Alta),
            _ => None,
        }
    }
}

/// A deduplicated, order-irrelevant set of free-text tokens.
///
/// The canonical wire form is a JSON array string of the sorted tokens
/// (`["fiebre","tos"]`), which is also how the set serializes through serde
/// so metadata values stay scalar. Parsing the canonical form back must
/// reproduce the same set of tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet(BTreeSet<String>);

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>) {
        self.0.insert(token.into());
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Merge another set into this one.
    pub fn union_with(&mut self, other: &TokenSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Render the canonical JSON array string.
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    /// Parse a canonical JSON array string back into a set.
    pub fn from_canonical_json(s: &str) -> serde_json::Result<Self> {
        let tokens: Vec<String> = serde_json::from_str(s)?;
        Ok(tokens.into_iter().collect())
    }
}

impl FromIterator<String> for TokenSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for TokenSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_owned).collect())
    }
}

impl Serialize for TokenSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let canonical = self.to_canonical_json().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&canonical)
    }
}

impl<'de> Deserialize<'de> for TokenSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TokenSet::from_canonical_json(&raw).map_err(serde::de::Error::custom)
    }
}

/// Everything extracted from one conversation transcript.
///
/// Produced exactly once per transcript and never mutated afterwards. The
/// promoter id is stamped by the ingestion layer, not the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Wall-clock conversation id (`conv_YYYYMMDD_HHMMSS`).
    pub conversation_id: String,
    /// Fixed-width UTC instant of the conversation.
    pub conversation_date: String,
    /// Raw transcript text, verbatim.
    pub transcript: String,
    /// Patient name, title-cased, when an introduction pattern matched.
    pub name: Option<String>,
    /// Patient age in years (0 < age < 120).
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub symptoms: TokenSet,
    pub medications: TokenSet,
    pub allergies: TokenSet,
    pub chronic_conditions: TokenSet,
    /// Derived diagnosis hint; [`DIAGNOSIS_PENDING`] when unknown. Used only
    /// for the embedding document, never as ground truth.
    pub diagnosis: String,
    pub priority: Priority,
    pub follow_up_needed: bool,
    pub conversation_type: String,
    /// Promoter who conducted the conversation, stamped at ingestion.
    pub promoter_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_token_set_dedups() {
        let mut set = TokenSet::new();
        set.insert("fiebre");
        set.insert("fiebre");
        set.insert("tos");
        assert_eq!(set.len(), 2);
        assert!(set.contains("fiebre"));
    }

    #[test]
    fn test_token_set_canonical_is_sorted() {
        let set: TokenSet = ["tos", "fiebre"].into_iter().collect();
        assert_eq!(set.to_canonical_json().unwrap(), r#"["fiebre","tos"]"#);
    }

    #[test]
    fn test_token_set_round_trip() {
        let set: TokenSet = ["dolor de cabeza", "fiebre"].into_iter().collect();
        let wire = set.to_canonical_json().unwrap();
        let back = TokenSet::from_canonical_json(&wire).unwrap();
        assert_eq!(set, back);
    }

    #[test]
    fn test_token_set_serde_is_scalar_string() {
        let set: TokenSet = ["fiebre"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        // A JSON string containing the array, not a nested array.
        assert_eq!(json, r#""[\"fiebre\"]""#);
        let back: TokenSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_gender_wire_values() {
        assert_eq!(Gender::Masculine.as_str(), "masculino");
        assert_eq!(Gender::parse("femenino"), Some(Gender::Feminine));
        assert_eq!(Gender::parse("other"), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Normal < Priority::Media);
        assert!(Priority::Media < Priority::Alta);
        assert_eq!(Priority::parse("alta"), Some(Priority::Alta));
    }

    proptest! {
        #[test]
        fn prop_token_set_round_trip(tokens in proptest::collection::vec("[a-záéíóúñ ]{1,20}", 0..8)) {
            let set: TokenSet = tokens.iter().map(String::as_str).collect();
            let wire = set.to_canonical_json().unwrap();
            let back = TokenSet::from_canonical_json(&wire).unwrap();
            prop_assert_eq!(set, back);
        }
    }
}
