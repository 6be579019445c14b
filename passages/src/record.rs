//! Passage records and their metadata.

use std::collections::BTreeMap;

use recall_embeddings::Embedding;
use serde::{Deserialize, Serialize};

/// Caller-supplied metadata carried alongside a passage.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A metadata value.
///
/// Serialized untagged, so a store file holds plain JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Parse a command-line style value: booleans and finite numbers are
    /// typed, anything else is text.
    pub fn parse_scalar(raw: &str) -> Self {
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            "null" => return Self::Null,
            _ => {}
        }

        if let Ok(integer) = raw.parse::<i64>() {
            return Self::Integer(integer);
        }
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => Self::Float(float),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Whether every number in this value, including nested ones, is finite.
    /// JSON has no encoding for NaN or infinity.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(value) => value.is_finite(),
            Self::List(values) => values.iter().all(Self::is_finite),
            Self::Map(entries) => entries.values().all(Self::is_finite),
            Self::Null | Self::Bool(_) | Self::Integer(_) | Self::Text(_) => true,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// One stored passage and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    /// Unique identifier, never reused.
    pub id: String,

    /// The passage text.
    pub content: String,

    /// The passage embedding.
    pub embedding: Embedding,

    /// Provenance tag, such as the originating document name.
    pub source: String,

    /// Optional caller metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl PassageRecord {
    /// Create a record with a freshly generated id.
    pub fn new(
        content: impl Into<String>,
        embedding: Embedding,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            embedding,
            source: source.into(),
            metadata: None,
        }
    }

    /// Use a caller-supplied id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Dimension of the embedding.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_records_get_distinct_ids() {
        let a = PassageRecord::new("a", vec![1.0], "doc");
        let b = PassageRecord::new("a", vec![1.0], "doc");
        assert_ne!(a.id, b.id);
        assert_eq!(a.dimension(), 1);
    }

    #[test]
    fn test_metadata_serializes_as_plain_json() {
        let mut nested = BTreeMap::new();
        nested.insert("page".to_string(), MetadataValue::Integer(3));

        let mut metadata = Metadata::new();
        metadata.insert("lang".to_string(), "en".into());
        metadata.insert("score".to_string(), 0.25f64.into());
        metadata.insert("draft".to_string(), false.into());
        metadata.insert("tags".to_string(), MetadataValue::List(vec!["a".into()]));
        metadata.insert("location".to_string(), MetadataValue::Map(nested));
        metadata.insert("reviewer".to_string(), MetadataValue::Null);

        let record = PassageRecord::new("text", vec![0.5], "doc")
            .with_id("r1")
            .with_metadata(metadata);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json["metadata"],
            serde_json::json!({
                "draft": false,
                "lang": "en",
                "location": { "page": 3 },
                "reviewer": null,
                "score": 0.25,
                "tags": ["a"]
            })
        );

        let back: PassageRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_metadata_is_optional_on_disk() {
        let record: PassageRecord = serde_json::from_str(
            r#"{"id":"x","content":"c","embedding":[1.0,0.0],"source":"s"}"#,
        )
        .unwrap();
        assert_eq!(record.metadata, None);

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_non_finite_floats_are_detected_when_nested() {
        assert!(MetadataValue::Float(2.5).is_finite());
        assert!(!MetadataValue::Float(f64::NAN).is_finite());

        let mut nested = BTreeMap::new();
        nested.insert("weight".to_string(), MetadataValue::Float(f64::INFINITY));
        let list = MetadataValue::List(vec!["ok".into(), MetadataValue::Map(nested)]);
        assert!(!list.is_finite());
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(MetadataValue::parse_scalar("42"), MetadataValue::Integer(42));
        assert_eq!(MetadataValue::parse_scalar("1.5"), MetadataValue::Float(1.5));
        assert_eq!(MetadataValue::parse_scalar("true"), MetadataValue::Bool(true));
        assert_eq!(MetadataValue::parse_scalar("null"), MetadataValue::Null);
        assert_eq!(
            MetadataValue::parse_scalar("chapter one"),
            MetadataValue::Text("chapter one".to_string())
        );
    }
}
