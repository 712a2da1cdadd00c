use serde::{Deserialize, Serialize};

fn default_entity_type() -> String {
    "unknown".to_string()
}

/// A fully hydrated knowledge-graph entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,

    #[serde(default = "default_entity_type")]
    pub entity_type: String,

    /// Never null: a corrupt stored value hydrates as an empty list.
    #[serde(default)]
    pub observations: Vec<String>,

    pub id: String,

    pub version: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<i64>,

    /// `created_at` as `YYYY-MM-DD`, or null when absent/invalid.
    pub created_date: Option<String>,

    /// `updated_at` as `YYYY-MM-DD`, or null when absent/invalid.
    pub updated_date: Option<String>,
}

/// Entity exactly as the store holds it, observations still serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub observations: Option<String>,
    pub version: i64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub valid_from: Option<i64>,
    pub valid_to: Option<i64>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Some(serialize_observations(&[])),
            version: 1,
            created_at: None,
            updated_at: None,
            valid_from: None,
            valid_to: None,
        }
    }

    pub fn with_observations(mut self, observations: &[String]) -> Self {
        self.observations = Some(serialize_observations(observations));
        self
    }

    pub fn is_visible(&self) -> bool {
        self.valid_to.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }
}

/// Stored form of an observation list (a JSON array of strings).
pub fn serialize_observations(observations: &[String]) -> String {
    // Serializing a slice of strings cannot fail.
    serde_json::to_string(observations).unwrap_or_else(|_| "[]".to_string())
}

pub fn parse_observations(raw: &str) -> serde_json::Result<Vec<String>> {
    serde_json::from_str(raw)
}

/// Formats epoch milliseconds as a UTC calendar date. `None` when the
/// timestamp is absent or outside chrono's representable range.
pub fn format_epoch_date(epoch_ms: Option<i64>) -> Option<String> {
    let ms = epoch_ms?;
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_observations_round_trip() {
        let cases: Vec<Vec<String>> = vec![
            vec![],
            vec!["".to_string()],
            vec!["plain".to_string(), "two words".to_string()],
            vec![
                "quote \" inside".to_string(),
                "back\\slash".to_string(),
                "line\nbreak".to_string(),
                "unicode ✓ ünïcödé".to_string(),
                "[\"looks\", \"like json\"]".to_string(),
            ],
        ];

        for case in cases {
            let raw = serialize_observations(&case);
            assert_eq!(parse_observations(&raw).unwrap(), case);
        }
    }

    proptest! {
        #[test]
        fn prop_observations_round_trip(observations in prop::collection::vec(any::<String>(), 0..12)) {
            let raw = serialize_observations(&observations);
            prop_assert_eq!(parse_observations(&raw).unwrap(), observations);
        }
    }

    #[test]
    fn test_parse_observations_rejects_garbage() {
        assert!(parse_observations("not json").is_err());
        assert!(parse_observations("{\"a\": 1}").is_err());
        assert!(parse_observations("[1, 2]").is_err());
        assert!(parse_observations("").is_err());
    }

    #[test]
    fn test_format_epoch_date() {
        // 2024-03-15T13:45:00Z
        assert_eq!(
            format_epoch_date(Some(1_710_510_300_000)),
            Some("2024-03-15".to_string())
        );
        assert_eq!(format_epoch_date(Some(0)), Some("1970-01-01".to_string()));
        assert_eq!(format_epoch_date(None), None);
        assert_eq!(format_epoch_date(Some(i64::MAX)), None);
    }

    #[test]
    fn test_entity_record_builder() {
        let record = EntityRecord::new("Rust", "language")
            .with_observations(&["fast".to_string(), "safe".to_string()]);
        assert!(record.is_visible());
        assert_eq!(record.version, 1);
        assert_eq!(
            parse_observations(record.observations.as_deref().unwrap()).unwrap(),
            vec!["fast".to_string(), "safe".to_string()]
        );
    }
}
