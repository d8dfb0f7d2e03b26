//! Maps free-form category strings onto the closed set of subjects.
//!
//! Pure and total: every input yields a [`SubjectMatch`], never an error.

use crate::model::{CanonicalSubject, SubjectMatch};

/// Bumped whenever an alias is added, removed or remapped.
pub const ALIAS_TABLE_VERSION: u32 = 3;

/// Lowercased aliases. Canonical identifiers must stay in this table so that
/// normalizing a normalized value is stable.
const ALIASES: &[(&str, CanonicalSubject)] = &[
    // Math
    ("math", CanonicalSubject::Math),
    ("maths", CanonicalSubject::Math),
    ("mathematics", CanonicalSubject::Math),
    ("numbers", CanonicalSubject::Math),
    ("numeracy", CanonicalSubject::Math),
    ("counting", CanonicalSubject::Math),
    ("arithmetic", CanonicalSubject::Math),
    ("lakkoofsa", CanonicalSubject::Math),
    ("herrega", CanonicalSubject::Math),
    ("ሒሳብ", CanonicalSubject::Math),
    ("ሂሳብ", CanonicalSubject::Math),
    ("ቁጥሮች", CanonicalSubject::Math),
    // English
    ("english", CanonicalSubject::English),
    ("eng", CanonicalSubject::English),
    ("abc", CanonicalSubject::English),
    ("alphabet", CanonicalSubject::English),
    ("phonics", CanonicalSubject::English),
    ("reading", CanonicalSubject::English),
    ("spelling", CanonicalSubject::English),
    ("vocabulary", CanonicalSubject::English),
    ("እንግሊዝኛ", CanonicalSubject::English),
    // Amharic
    ("amharic", CanonicalSubject::Amharic),
    ("amh", CanonicalSubject::Amharic),
    ("fidel", CanonicalSubject::Amharic),
    ("fidelat", CanonicalSubject::Amharic),
    ("አማርኛ", CanonicalSubject::Amharic),
    ("ፊደል", CanonicalSubject::Amharic),
    ("ፊደላት", CanonicalSubject::Amharic),
    // Afaan Oromoo
    ("oromo", CanonicalSubject::Oromo),
    ("oromoo", CanonicalSubject::Oromo),
    ("afaan oromoo", CanonicalSubject::Oromo),
    ("afaan oromo", CanonicalSubject::Oromo),
    ("afan oromo", CanonicalSubject::Oromo),
    ("oromiffa", CanonicalSubject::Oromo),
    ("oromifa", CanonicalSubject::Oromo),
    ("qubee", CanonicalSubject::Oromo),
];

/// Words that decorate a category without changing its subject.
const NOISE_WORDS: &[&str] = &[
    "quiz", "quizzes", "lesson", "lessons", "test", "practice", "drill", "game", "games",
    "activity", "exercise", "exercises", "report", "basics", "level", "unit",
];

/// Normalize a raw category, falling back to `source_hint` when the category is unmapped.
#[must_use]
pub fn normalize(raw_category: &str, source_hint: Option<&str>) -> SubjectMatch {
    match lookup(raw_category) {
        SubjectMatch::Unknown => source_hint.map_or(SubjectMatch::Unknown, lookup),
        known => known,
    }
}

/// Skill words that mean English on their own but defer to a language named
/// next to them ("Reading Amharic").
const GENERIC_SKILLS: &[&str] = &["reading", "spelling", "vocabulary", "phonics", "alphabet", "abc"];

/// Normalize a single string against the alias table.
#[must_use]
pub fn lookup(raw: &str) -> SubjectMatch {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return SubjectMatch::Unknown;
    }

    if let Some(subject) = exact(&cleaned) {
        return subject.into();
    }

    let tokens: Vec<&str> = cleaned
        .split(' ')
        .filter(|token| !token.is_empty() && !NOISE_WORDS.contains(token))
        .collect();

    let stripped = tokens.join(" ");
    if let Some(subject) = exact(&stripped) {
        return subject.into();
    }

    // Two-word aliases first ("afaan oromoo"), then single tokens in order,
    // with generic skill words last.
    for pair in tokens.windows(2) {
        if let Some(subject) = exact(&format!("{} {}", pair[0], pair[1])) {
            return subject.into();
        }
    }
    tokens
        .iter()
        .filter(|token| !GENERIC_SKILLS.contains(*token))
        .find_map(|token| exact(token))
        .or_else(|| tokens.iter().find_map(|token| exact(token)))
        .map_or(SubjectMatch::Unknown, SubjectMatch::Known)
}

fn exact(key: &str) -> Option<CanonicalSubject> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, subject)| *subject)
}

fn clean(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_observed_categories() {
        assert_eq!(normalize("English Quiz", None), CanonicalSubject::English.into());
        assert_eq!(normalize("Mathematics", None), CanonicalSubject::Math.into());
        assert_eq!(normalize("Qubee", None), CanonicalSubject::Oromo.into());
        assert_eq!(normalize("Lakkoofsa", None), CanonicalSubject::Math.into());
        assert_eq!(normalize("ፊደላት", None), CanonicalSubject::Amharic.into());
        assert_eq!(normalize("Math Quiz", None), CanonicalSubject::Math.into());
    }

    #[test]
    fn is_case_and_punctuation_insensitive() {
        assert_eq!(normalize("  AFAAN-OROMOO ", None), CanonicalSubject::Oromo.into());
        assert_eq!(normalize("english_quiz", None), CanonicalSubject::English.into());
        assert_eq!(normalize("Level 2: Maths!", None), CanonicalSubject::Math.into());
    }

    #[test]
    fn falls_back_to_hint() {
        assert_eq!(
            normalize("Animals and Colors", Some("Amharic")),
            CanonicalSubject::Amharic.into()
        );
        assert_eq!(
            normalize("Qubee", Some("Amharic")),
            CanonicalSubject::Oromo.into(),
            "category takes precedence over hint"
        );
    }

    #[test]
    fn named_language_wins_over_a_skill_word() {
        assert_eq!(lookup("Reading Amharic"), SubjectMatch::Known(CanonicalSubject::Amharic));
        assert_eq!(lookup("Oromo spelling"), SubjectMatch::Known(CanonicalSubject::Oromo));
        assert_eq!(lookup("Phonics - Fidel"), SubjectMatch::Known(CanonicalSubject::Amharic));
        assert_eq!(lookup("Reading"), SubjectMatch::Known(CanonicalSubject::English));
        assert_eq!(lookup("Spelling Practice"), SubjectMatch::Known(CanonicalSubject::English));
    }

    #[test]
    fn unmapped_input_is_unknown_not_an_error() {
        assert_eq!(normalize("Animals", None), SubjectMatch::Unknown);
        assert_eq!(normalize("", Some("   ")), SubjectMatch::Unknown);
        assert_eq!(normalize("quiz", None), SubjectMatch::Unknown);
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["English Quiz", "ፊደላት", "Qubee", "Lakkoofsa", "Animals", "unknown"] {
            let first = normalize(raw, None);
            let second = normalize(first.as_str(), None);
            assert_eq!(first, second, "{raw}");
        }
        for subject in CanonicalSubject::ALL {
            assert_eq!(lookup(subject.as_str()), SubjectMatch::Known(subject));
        }
    }
}
