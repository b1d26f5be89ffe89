//! Knowledge-graph model and parsing of extracted entities.
//!
//! The language model returns a JSON object with `nodes` and
//! `relationships` arrays. [`parse_extraction`] turns that text into an
//! [`ExtractedGraph`]. Storage backends never interpolate the model's raw
//! `type` strings into query text: node labels go through the
//! [`EntityLabel`] allow-list and relationship types through
//! [`relationship_type`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{RagError, Result};
use crate::models::{EmbeddedChunk, TextChunk};

/// Relationship types longer than this are truncated.
pub const MAX_RELATIONSHIP_TYPE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Map<String, Value>,
}

impl GraphEntity {
    pub fn label(&self) -> EntityLabel {
        EntityLabel::from_extracted(&self.entity_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub source: String,
    #[serde(deserialize_with = "string_or_number")]
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedGraph {
    pub nodes: Vec<GraphEntity>,
    pub relationships: Vec<GraphRelationship>,
}

impl ExtractedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Prefix every node id, relationship id and endpoint with
    /// `{document_id}:`. The model's own id is kept as `properties.local_id`.
    ///
    /// Extraction ids are only unique within one response, so graphs from
    /// different documents must be scoped before they share a store.
    pub fn scoped_to(mut self, document_id: &str) -> Self {
        let scope = |id: &str| format!("{}:{}", document_id, id);
        for node in &mut self.nodes {
            node.properties
                .insert("local_id".to_string(), Value::String(node.id.clone()));
            node.id = scope(&node.id);
        }
        for rel in &mut self.relationships {
            rel.properties
                .insert("local_id".to_string(), Value::String(rel.id.clone()));
            rel.id = scope(&rel.id);
            rel.source = scope(&rel.source);
            rel.target = scope(&rel.target);
        }
        self
    }
}

/// Closed set of node labels a store may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    Person,
    Organization,
    Location,
    Event,
    Concept,
    Product,
    Technology,
    Date,
    Document,
    Entity,
}

impl EntityLabel {
    pub const ALL: [EntityLabel; 10] = [
        EntityLabel::Person,
        EntityLabel::Organization,
        EntityLabel::Location,
        EntityLabel::Event,
        EntityLabel::Concept,
        EntityLabel::Product,
        EntityLabel::Technology,
        EntityLabel::Date,
        EntityLabel::Document,
        EntityLabel::Entity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Person => "Person",
            EntityLabel::Organization => "Organization",
            EntityLabel::Location => "Location",
            EntityLabel::Event => "Event",
            EntityLabel::Concept => "Concept",
            EntityLabel::Product => "Product",
            EntityLabel::Technology => "Technology",
            EntityLabel::Date => "Date",
            EntityLabel::Document => "Document",
            EntityLabel::Entity => "Entity",
        }
    }

    /// Map a free-form type string onto the allow-list.
    ///
    /// Matching ignores case and surrounding whitespace and accepts a few
    /// common synonyms. Anything unrecognised becomes [`EntityLabel::Entity`].
    pub fn from_extracted(raw: &str) -> Self {
        let key = raw.trim().to_ascii_lowercase();
        match key.as_str() {
            "person" | "people" | "individual" | "human" | "author" => EntityLabel::Person,
            "organization" | "organisation" | "company" | "org" | "institution"
            | "corporation" | "agency" => EntityLabel::Organization,
            "location" | "place" | "city" | "country" | "region" | "address" => {
                EntityLabel::Location
            }
            "event" | "meeting" | "incident" => EntityLabel::Event,
            "concept" | "idea" | "topic" | "theory" => EntityLabel::Concept,
            "product" | "item" | "service" => EntityLabel::Product,
            "technology" | "tech" | "tool" | "software" | "framework" | "language" => {
                EntityLabel::Technology
            }
            "date" | "time" | "year" | "period" => EntityLabel::Date,
            "document" | "report" | "article" | "paper" => EntityLabel::Document,
            _ => EntityLabel::Entity,
        }
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sanitise a relationship type for use as a query-language identifier.
///
/// Uppercases, replaces every character outside `[A-Z0-9_]` with `_`,
/// prefixes `REL_` when the result does not start with a letter, and
/// truncates to [`MAX_RELATIONSHIP_TYPE_LEN`]. Input with no letters or
/// digits at all is rejected.
pub fn relationship_type(raw: &str) -> Result<String> {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if mapped.chars().all(|c| c == '_') {
        return Err(RagError::invalid(format!(
            "unusable relationship type: {:?}",
            raw
        )));
    }

    let mut sanitized = if mapped.starts_with(|c: char| c.is_ascii_uppercase()) {
        mapped
    } else {
        format!("REL_{}", mapped)
    };
    sanitized.truncate(MAX_RELATIONSHIP_TYPE_LEN);
    Ok(sanitized)
}

/// Parse the model's extraction output.
///
/// String values that themselves hold a JSON object or array are decoded
/// in place before deserialising, since models sometimes double-encode
/// `properties` or whole node lists.
pub fn parse_extraction(raw: &str) -> Result<ExtractedGraph> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| RagError::Parse(format!("extraction output is not JSON: {}", e)))?;
    let value = decode_nested_json(value);

    let obj = value
        .as_object()
        .ok_or_else(|| RagError::Parse("extraction output is not a JSON object".into()))?;
    for key in ["nodes", "relationships"] {
        if !obj.get(key).map(Value::is_array).unwrap_or(false) {
            return Err(RagError::Parse(format!(
                "extraction output is missing the `{}` array",
                key
            )));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| RagError::Parse(format!("malformed extraction record: {}", e)))
}

fn decode_nested_json(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(&s) {
                    Ok(inner) => decode_nested_json(inner),
                    Err(_) => Value::String(s),
                }
            } else {
                Value::String(s)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(decode_nested_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, decode_nested_json(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Every chunk needs an id and non-blank content.
pub fn validate_text_chunks(chunks: &[TextChunk]) -> Result<()> {
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.id.is_empty() || chunk.content.trim().is_empty() {
            return Err(RagError::invalid(format!(
                "chunk {} must have id and content",
                i
            )));
        }
    }
    Ok(())
}

/// Every chunk needs an id, non-blank content, and an embedding.
pub fn validate_embedded_chunks(chunks: &[EmbeddedChunk]) -> Result<()> {
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.id.is_empty() || chunk.content.trim().is_empty() || chunk.embedding.is_empty() {
            return Err(RagError::invalid(format!(
                "chunk {} must have id, content, and embedding",
                i
            )));
        }
    }
    Ok(())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
