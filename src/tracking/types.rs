use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PROJECT: &str = "Project";
pub const SEQUENCE: &str = "Sequence";
pub const SHOT: &str = "Shot";
pub const VERSION: &str = "Version";
pub const NOTE: &str = "Note";

/// Field map sent on create/update
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Link to another record: `{"type": "Shot", "id": 101}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.entity_type, "id": self.id })
    }
}

/// Query filter, serialised as a `[field, operator, value]` triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter(pub String, pub String, pub serde_json::Value);

impl Filter {
    pub fn is(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter(field.into(), "is".to_string(), value.into())
    }

    pub fn is_entity(field: impl Into<String>, target: &EntityRef) -> Self {
        Filter::is(field, target.to_value())
    }

    pub fn field(&self) -> &str {
        &self.0
    }

    pub fn operator(&self) -> &str {
        &self.1
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.2
    }
}

/// A record returned by the tracking service. Link fields hold
/// `{type, id[, name]}` objects (or arrays of them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
    #[serde(default)]
    pub fields: Fields,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, id: i64, fields: Fields) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            fields,
        }
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.id)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    /// Single-entity link field
    pub fn link(&self, field: &str) -> Option<EntityRef> {
        self.fields.get(field).and_then(entity_ref_of)
    }

    /// Multi-entity link field
    pub fn links(&self, field: &str) -> Vec<EntityRef> {
        match self.fields.get(field) {
            Some(serde_json::Value::Array(items)) => {
                items.iter().filter_map(entity_ref_of).collect()
            }
            Some(other) => entity_ref_of(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn entity_ref_of(value: &serde_json::Value) -> Option<EntityRef> {
    Some(EntityRef {
        entity_type: value.get("type")?.as_str()?.to_string(),
        id: value.get("id")?.as_i64()?,
    })
}

/// Result type for tracking operations
pub type TrackingResult<T> = Result<T, TrackingError>;

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("tracking service rejected the script credentials (HTTP {0})")]
    Authentication(u16),

    #[error("tracking service returned HTTP {status} for {operation}")]
    Status { operation: String, status: u16 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackingError {
    pub(crate) fn from_ureq(operation: &str, err: ureq::Error) -> Self {
        match crate::http::status_of(&err) {
            Some(code) if crate::http::is_auth_status(code) => TrackingError::Authentication(code),
            Some(status) => TrackingError::Status {
                operation: operation.to_string(),
                status,
            },
            None => TrackingError::Transport(err.to_string()),
        }
    }
}

/// Read/write access to a production-tracking service
pub trait TrackingService {
    fn find(&self, entity_type: &str, filters: &[Filter], fields: &[&str])
    -> TrackingResult<Vec<Entity>>;

    /// Create a record; the returned entity carries the new id
    fn create(&self, entity_type: &str, fields: &Fields) -> TrackingResult<Entity>;

    fn update(&self, entity_type: &str, id: i64, fields: &Fields) -> TrackingResult<Entity>;

    fn delete(&self, entity_type: &str, id: i64) -> TrackingResult<()>;

    /// Attach an image file as the record's thumbnail
    fn upload_thumbnail(&self, entity_type: &str, id: i64, path: &Path) -> TrackingResult<()>;
}
