use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of learning subjects the app tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalSubject {
    Math,
    English,
    Amharic,
    Oromo,
}

impl CanonicalSubject {
    pub const ALL: [CanonicalSubject; 4] = [
        CanonicalSubject::Math,
        CanonicalSubject::English,
        CanonicalSubject::Amharic,
        CanonicalSubject::Oromo,
    ];

    /// Stable identifier used in cache payloads and remote filters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalSubject::Math => "math",
            CanonicalSubject::English => "english",
            CanonicalSubject::Amharic => "amharic",
            CanonicalSubject::Oromo => "oromo",
        }
    }
}

impl fmt::Display for CanonicalSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSubjectError(pub String);

impl fmt::Display for UnknownSubjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown subject: {}", self.0)
    }
}

impl std::error::Error for UnknownSubjectError {}

impl FromStr for CanonicalSubject {
    type Err = UnknownSubjectError;

    /// Parses a canonical identifier only. Free-form categories go through
    /// the normalizer instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalSubject::ALL
            .into_iter()
            .find(|subject| subject.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSubjectError(s.to_string()))
    }
}

/// Result of normalizing a free-form category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectMatch {
    Known(CanonicalSubject),
    Unknown,
}

impl SubjectMatch {
    #[must_use]
    pub fn subject(self) -> Option<CanonicalSubject> {
        match self {
            SubjectMatch::Known(subject) => Some(subject),
            SubjectMatch::Unknown => None,
        }
    }

    #[must_use]
    pub fn is_unknown(self) -> bool {
        matches!(self, SubjectMatch::Unknown)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectMatch::Known(subject) => subject.as_str(),
            SubjectMatch::Unknown => "unknown",
        }
    }
}

impl From<CanonicalSubject> for SubjectMatch {
    fn from(subject: CanonicalSubject) -> Self {
        SubjectMatch::Known(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ids_round_trip_through_from_str() {
        for subject in CanonicalSubject::ALL {
            assert_eq!(subject.as_str().parse::<CanonicalSubject>(), Ok(subject));
        }
        assert!("Mathematics".parse::<CanonicalSubject>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&CanonicalSubject::Oromo).unwrap();
        assert_eq!(json, "\"oromo\"");
    }
}
