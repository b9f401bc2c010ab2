//! Types for stage results, printed by the CLI with `--json`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::publish::PublishTarget;
use crate::review::ReviewOutcome;

/// Result of a critique run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueOutcome {
    /// Session directory the critique was stored in
    pub session: PathBuf,

    /// Render that was analyzed
    pub image: PathBuf,

    /// Model that produced the critique
    pub model: String,

    /// The stored critique text
    pub critique: String,
}

/// Result of a review. Record ids are `null` when the review was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub session: PathBuf,

    pub cancelled: bool,

    pub version_id: Option<i64>,

    pub note_id: Option<i64>,

    pub project_id: i64,

    pub shot_id: i64,
}

impl PublishOutcome {
    pub fn new(session: impl Into<PathBuf>, target: &PublishTarget, review: ReviewOutcome) -> Self {
        let (cancelled, version_id, note_id) = match review {
            ReviewOutcome::Published(records) => {
                (false, Some(records.version_id), Some(records.note_id))
            }
            ReviewOutcome::Cancelled => (true, None, None),
        };
        Self {
            session: session.into(),
            cancelled,
            version_id,
            note_id,
            project_id: target.project.id,
            shot_id: target.shot.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishedRecords;
    use crate::tracking::EntityChoice;
    use pretty_assertions::assert_eq;

    fn target() -> PublishTarget {
        PublishTarget::new(
            EntityChoice::new(7, "Campaign A"),
            EntityChoice::new(42, "SEQ010"),
            EntityChoice::new(101, "SH020"),
        )
        .unwrap()
    }

    #[test]
    fn test_published_json_shape() {
        let records = PublishedRecords {
            version_id: 9001,
            note_id: 9002,
        };
        let outcome = PublishOutcome::new(
            "/tmp/render-critic/render_0012",
            &target(),
            ReviewOutcome::Published(records),
        );
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({
                "session": "/tmp/render-critic/render_0012",
                "cancelled": false,
                "version_id": 9001,
                "note_id": 9002,
                "project_id": 7,
                "shot_id": 101
            })
        );
    }

    #[test]
    fn test_cancelled_json_shape() {
        let outcome = PublishOutcome::new("/tmp/s", &target(), ReviewOutcome::Cancelled);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({
                "session": "/tmp/s",
                "cancelled": true,
                "version_id": null,
                "note_id": null,
                "project_id": 7,
                "shot_id": 101
            })
        );
    }
}
