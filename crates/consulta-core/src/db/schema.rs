//! SQLite schema definition.

/// Complete database schema for the archive. Two collections, each pairing a
/// typed metadata row with the embedded document and its vector.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Conversation Records (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,                          -- content-derived sha256 hex
    patient_name TEXT,
    patient_age INTEGER,
    patient_gender TEXT,                          -- 'masculino' / 'femenino'
    patient_phone TEXT,
    diagnosis TEXT NOT NULL,
    symptoms_list TEXT NOT NULL DEFAULT '[]',     -- JSON array of strings
    medications_list TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    allergies_list TEXT NOT NULL DEFAULT '[]',    -- JSON array of strings
    chronic_conditions_list TEXT NOT NULL DEFAULT '[]', -- JSON array of strings
    conversation_id TEXT NOT NULL,
    conversation_date TEXT NOT NULL,              -- fixed-width UTC timestamp
    promoter_id TEXT,
    priority_level TEXT NOT NULL CHECK (priority_level IN ('normal', 'media', 'alta')),
    follow_up_needed INTEGER NOT NULL DEFAULT 0,
    conversation_type TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    document TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_patient_name ON conversations(patient_name);
CREATE INDEX IF NOT EXISTS idx_conversations_priority ON conversations(priority_level);
CREATE INDEX IF NOT EXISTS idx_conversations_date ON conversations(conversation_date);
CREATE INDEX IF NOT EXISTS idx_conversations_promoter ON conversations(promoter_id);

-- ============================================================================
-- Patient Profiles (One row per identity key - Mutable)
-- ============================================================================

CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,                          -- 'patient_' + sha256 hex of name
    patient_name TEXT NOT NULL,
    patient_age INTEGER,
    patient_gender TEXT,
    patient_phone TEXT,
    last_conversation_id TEXT NOT NULL,
    total_conversations INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL,
    document TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profiles_name ON profiles(patient_name);
"#;
