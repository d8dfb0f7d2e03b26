use serde::{Deserialize, Serialize};

use crate::model::ids::{ChildId, ParentId};

/// Coarse age grouping used by the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeBand {
    /// Ages 3 to 5.
    Preschool,
    /// Ages 6 to 8.
    EarlyPrimary,
    /// Ages 9 to 12.
    Primary,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// A child as listed by the roster. Read-only to the progress subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProfile {
    pub id: ChildId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ParentId>,
    #[serde(default)]
    pub age_band: AgeBand,
}

impl ChildProfile {
    #[must_use]
    pub fn new(id: ChildId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
            age_band: AgeBand::Unspecified,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: ParentId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_age_band(mut self, age_band: AgeBand) -> Self {
        self.age_band = age_band;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_age_band_deserializes_as_unspecified() {
        let json = r#"{"id":"c1","name":"Abebe","ageBand":"teen"}"#;
        let child: ChildProfile = serde_json::from_str(json).unwrap();
        assert_eq!(child.age_band, AgeBand::Unspecified);
        assert_eq!(child.parent_id, None);
    }
}
