//! Staged publish of a reviewed render.
//!
//! A [`PublishPlan`] is assembled locally (links, image, description, note
//! text) and validated before the first remote write. [`PublishPlan::commit`]
//! then performs the writes in a fixed order:
//!
//! 1. create the Version linked to the Project and Shot
//! 2. describe it and attach the render as its thumbnail
//! 3. create the Note linked to that Version
//!
//! If anything after step 1 fails, the Version is deleted again so no
//! half-described record is left behind. When the cleanup itself fails the
//! error names the orphaned Version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifact::RenderArtifact;
use crate::tracking::{
    EntityChoice, EntityRef, Fields, Filter, NOTE, PROJECT, SHOT, TrackingError, TrackingService,
    VERSION,
};

pub type PublishResult<T> = Result<T, PublishError>;

/// Remote write that failed after the Version existed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    Describe,
    UploadImage,
    CreateNote,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStep::Describe => write!(f, "version description"),
            PublishStep::UploadImage => write!(f, "image upload"),
            PublishStep::CreateNote => write!(f, "note creation"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("no {0} selected")]
    IncompleteSelection(&'static str),

    #[error("{level} id {id} is not a valid record id")]
    InvalidId { level: &'static str, id: i64 },

    #[error("no critique is stored for this render")]
    MissingCritique,

    #[error("shot {0} was not found")]
    ShotNotFound(i64),

    #[error("shot {shot} is not part of the selection: {detail}")]
    SelectionMismatch { shot: i64, detail: String },

    #[error("could not verify the selection: {0}")]
    Verify(#[source] TrackingError),

    #[error("could not create the version: {0}")]
    CreateVersion(#[source] TrackingError),

    #[error("{step} failed, version {version_id} was removed: {source}")]
    RolledBack {
        step: PublishStep,
        version_id: i64,
        #[source]
        source: TrackingError,
    },

    #[error("{step} failed and version {version_id} could not be removed ({cleanup}): {source}")]
    Orphaned {
        step: PublishStep,
        version_id: i64,
        #[source]
        source: TrackingError,
        cleanup: TrackingError,
    },
}

/// Project / Sequence / Shot the render is published under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTarget {
    pub project: EntityChoice,
    pub sequence: EntityChoice,
    pub shot: EntityChoice,
}

impl PublishTarget {
    /// Rejects null or negative ids
    pub fn new(
        project: EntityChoice,
        sequence: EntityChoice,
        shot: EntityChoice,
    ) -> PublishResult<Self> {
        for (level, id) in [("project", project.id), ("sequence", sequence.id), ("shot", shot.id)] {
            if id <= 0 {
                return Err(PublishError::InvalidId { level, id });
            }
        }
        Ok(Self {
            project,
            sequence,
            shot,
        })
    }

    pub fn label(&self) -> String {
        format!(
            "{} / {} / {}",
            self.project.label, self.sequence.label, self.shot.label
        )
    }
}

/// Ids of the records a successful publish created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRecords {
    pub version_id: i64,
    pub note_id: i64,
}

/// Everything a publish writes, assembled before any remote call
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPlan {
    pub target: PublishTarget,
    pub image: PathBuf,
    pub code: String,
    pub description: String,
    pub note_subject: String,
    pub note_content: String,
}

impl PublishPlan {
    pub fn new(
        target: PublishTarget,
        artifact: &RenderArtifact,
        description: &str,
        critique: Option<&str>,
        note_subject: &str,
    ) -> PublishResult<Self> {
        let note_content = critique
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(PublishError::MissingCritique)?;

        Ok(Self {
            target,
            image: artifact.path.clone(),
            code: artifact.stem(),
            description: description.to_string(),
            note_subject: note_subject.to_string(),
            note_content: note_content.to_string(),
        })
    }

    fn project_ref(&self) -> serde_json::Value {
        EntityRef::new(PROJECT, self.target.project.id).to_value()
    }

    pub fn version_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("project".into(), self.project_ref());
        fields.insert("entity".into(), EntityRef::new(SHOT, self.target.shot.id).to_value());
        fields.insert("code".into(), self.code.clone().into());
        fields
    }

    pub fn description_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("description".into(), self.description.clone().into());
        fields
    }

    pub fn note_fields(&self, version_id: i64) -> Fields {
        let mut fields = Fields::new();
        fields.insert("project".into(), self.project_ref());
        fields.insert("subject".into(), self.note_subject.clone().into());
        fields.insert(
            "note_links".into(),
            serde_json::json!([EntityRef::new(VERSION, version_id).to_value()]),
        );
        fields.insert("content".into(), self.note_content.clone().into());
        fields
    }

    /// Perform the remote writes, removing the Version again on partial failure
    pub fn commit(&self, svc: &dyn TrackingService) -> PublishResult<PublishedRecords> {
        info!(
            project = self.target.project.id,
            shot = self.target.shot.id,
            image = %self.image.display(),
            "publishing version"
        );

        let version = svc
            .create(VERSION, &self.version_fields())
            .map_err(PublishError::CreateVersion)?;
        let version_id = version.id;

        match self.finish(svc, version_id) {
            Ok(note_id) => {
                info!(version_id, note_id, "published");
                Ok(PublishedRecords {
                    version_id,
                    note_id,
                })
            }
            Err((step, source)) => {
                warn!(version_id, %step, error = %source, "publish incomplete, removing version");
                match svc.delete(VERSION, version_id) {
                    Ok(()) => Err(PublishError::RolledBack {
                        step,
                        version_id,
                        source,
                    }),
                    Err(cleanup) => Err(PublishError::Orphaned {
                        step,
                        version_id,
                        source,
                        cleanup,
                    }),
                }
            }
        }
    }

    fn finish(
        &self,
        svc: &dyn TrackingService,
        version_id: i64,
    ) -> Result<i64, (PublishStep, TrackingError)> {
        svc.update(VERSION, version_id, &self.description_fields())
            .map_err(|e| (PublishStep::Describe, e))?;
        svc.upload_thumbnail(VERSION, version_id, &self.image)
            .map_err(|e| (PublishStep::UploadImage, e))?;
        let note = svc
            .create(NOTE, &self.note_fields(version_id))
            .map_err(|e| (PublishStep::CreateNote, e))?;
        Ok(note.id)
    }
}

/// Check the selected Shot still belongs to the selected Sequence and Project
pub fn verify_target(svc: &dyn TrackingService, target: &PublishTarget) -> PublishResult<()> {
    let found = svc
        .find(
            SHOT,
            &[Filter::is("id", target.shot.id)],
            &["code", "sg_sequence", "project"],
        )
        .map_err(PublishError::Verify)?;
    let shot = found
        .iter()
        .find(|s| s.id == target.shot.id)
        .ok_or(PublishError::ShotNotFound(target.shot.id))?;

    let sequence = shot.link("sg_sequence").map(|r| r.id);
    if sequence != Some(target.sequence.id) {
        return Err(PublishError::SelectionMismatch {
            shot: target.shot.id,
            detail: format!(
                "expected sequence {}, shot is linked to {:?}",
                target.sequence.id, sequence
            ),
        });
    }

    let project = shot.link("project").map(|r| r.id);
    if project != Some(target.project.id) {
        return Err(PublishError::SelectionMismatch {
            shot: target.shot.id,
            detail: format!(
                "expected project {}, shot is linked to {:?}",
                target.project.id, project
            ),
        });
    }

    Ok(())
}
