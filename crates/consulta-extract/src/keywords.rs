//! Keyword tables driving the rule-based extractor.
//!
//! Order matters everywhere: category tables are scanned top to bottom and
//! the cascades are first-match-wins, so reordering an entry changes
//! extraction output.

/// Symptom categories with their spoken synonyms. A category token is
/// recorded when any synonym occurs in the transcript.
pub const SYMPTOMS: &[(&str, &[&str])] = &[
    ("fiebre", &["fiebre", "temperatura alta", "calor"]),
    ("dolor de cabeza", &["dolor de cabeza", "migraña", "cefalea"]),
    ("tos", &["tos", "tos seca", "tos con flema"]),
    ("dolor de garganta", &["dolor de garganta", "irritación de garganta"]),
    ("náuseas", &["náuseas", "nauseas", "ganas de vomitar"]),
    ("vómitos", &["vómitos", "vomitos", "vomitar"]),
    ("diarrea", &["diarrea", "dolor de estómago"]),
    ("fatiga", &["fatiga", "cansancio", "agotamiento"]),
    ("dolor muscular", &["dolor muscular", "dolores en el cuerpo"]),
    ("pérdida de apetito", &["pérdida de apetito", "no tengo hambre"]),
    (
        "dificultad para respirar",
        &["dificultad para respirar", "falta de aire"],
    ),
    ("dolor en el pecho", &["dolor en el pecho", "dolor de pecho"]),
];

/// Medication mentions, recorded verbatim.
pub const MEDICATIONS: &[&str] = &[
    "paracetamol",
    "acetaminofén",
    "acetaminofen",
    "ibuprofeno",
    "aspirina",
    "antibiótico",
    "antibiotico",
    "medicamento",
    "pastilla",
    "tableta",
    "cápsula",
    "capsula",
    "jarabe",
    "gotas",
    "inyección",
    "inyeccion",
];

/// Common allergy mentions.
pub const ALLERGIES: &[&str] = &["penicilina", "polen", "polvo", "mariscos", "látex"];

/// Chronic conditions worth carrying into the profile.
pub const CHRONIC_CONDITIONS: &[&str] =
    &["diabetes", "hipertensión", "asma", "artritis", "epilepsia"];

/// Any of these forces priority `alta`.
pub const HIGH_PRIORITY: &[&str] = &[
    "dificultad para respirar",
    "dolor en el pecho",
    "pérdida de consciencia",
    "sangrado",
    "trauma",
    "accidente",
];

/// Checked only when no high-priority term matched; forces `media`.
pub const MEDIUM_PRIORITY: &[&str] = &[
    "fiebre alta",
    "dolor intenso",
    "vómitos persistentes",
    "diarrea severa",
];

/// Requests for guidance that flag the conversation for follow-up.
pub const FOLLOW_UP: &[&str] = &[
    "quiero saber",
    "necesito ayuda",
    "qué debo hacer",
    "cómo puedo",
    "cuándo debo",
    "dónde debo ir",
    "consulta",
    "cita",
    "seguimiento",
];

/// Masculine indicators, checked before the feminine set.
pub const MASCULINE: &[&str] = &["hombre", "masculino", "varón", "señor"];

/// Feminine indicators.
pub const FEMININE: &[&str] = &["mujer", "femenino", "señora", "dama"];

/// Fallback diagnosis per symptom when the transcript announces none.
/// First matching symptom wins; only the first candidate diagnosis is used.
pub const SYMPTOM_DIAGNOSES: &[(&str, &str)] = &[
    ("fiebre", "resfriado común"),
    ("dolor de cabeza", "migraña"),
    ("tos", "bronquitis"),
    ("dolor de garganta", "faringitis"),
    ("náuseas", "gastroenteritis"),
    ("diarrea", "gastroenteritis"),
];
