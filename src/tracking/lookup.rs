//! Cascading lookups: Projects, then Sequences of a Project, then Shots of a
//! Sequence. Every failure is returned to the caller.

use serde::{Deserialize, Serialize};

use super::types::{
    EntityRef, Filter, PROJECT, SEQUENCE, SHOT, TrackingError, TrackingService,
};

pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("{entity_type} lookup failed: {source}")]
    Service {
        entity_type: &'static str,
        #[source]
        source: TrackingError,
    },

    #[error("{entity_type} {id} belongs to {parent_field} {actual:?}, expected {expected}")]
    ParentMismatch {
        entity_type: &'static str,
        id: i64,
        parent_field: &'static str,
        expected: i64,
        actual: Option<i64>,
    },
}

/// One selectable entity: id plus display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChoice {
    pub id: i64,
    pub label: String,
}

impl EntityChoice {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// All projects, labelled by name
pub fn projects(svc: &dyn TrackingService) -> LookupResult<Vec<EntityChoice>> {
    let found = svc
        .find(PROJECT, &[], &["name"])
        .map_err(|source| LookupError::Service {
            entity_type: PROJECT,
            source,
        })?;
    Ok(found
        .iter()
        .map(|p| EntityChoice::new(p.id, p.text("name").unwrap_or_default()))
        .collect())
}

/// Sequences of a project, labelled by code
pub fn sequences(svc: &dyn TrackingService, project_id: i64) -> LookupResult<Vec<EntityChoice>> {
    children(svc, SEQUENCE, "project", &EntityRef::new(PROJECT, project_id))
}

/// Shots of a sequence, labelled by code
pub fn shots(svc: &dyn TrackingService, sequence_id: i64) -> LookupResult<Vec<EntityChoice>> {
    children(svc, SHOT, "sg_sequence", &EntityRef::new(SEQUENCE, sequence_id))
}

fn children(
    svc: &dyn TrackingService,
    entity_type: &'static str,
    parent_field: &'static str,
    parent: &EntityRef,
) -> LookupResult<Vec<EntityChoice>> {
    let filters = [Filter::is_entity(parent_field, parent)];
    let found = svc
        .find(entity_type, &filters, &["code", parent_field])
        .map_err(|source| LookupError::Service {
            entity_type,
            source,
        })?;

    found
        .iter()
        .map(|child| {
            let actual = child.link(parent_field).map(|r| r.id);
            if actual != Some(parent.id) {
                return Err(LookupError::ParentMismatch {
                    entity_type,
                    id: child.id,
                    parent_field,
                    expected: parent.id,
                    actual,
                });
            }
            Ok(EntityChoice::new(child.id, child.text("code").unwrap_or_default()))
        })
        .collect()
}
