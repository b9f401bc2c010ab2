//! Operator review of a critiqued render, followed by publish on confirmation.
//!
//! The decision logic lives in [`review_and_publish`]; how the render and the
//! critique are shown is up to a [`ReviewSurface`].

pub mod preview;
pub mod terminal;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::RenderArtifact;
use crate::publish::{PublishError, PublishPlan, PublishedRecords, verify_target};
use crate::tracking::TrackingService;

pub use terminal::TerminalReview;

pub type ReviewResult<T> = Result<T, ReviewError>;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// What the operator is asked to approve
#[derive(Debug, Clone, Copy)]
pub struct ReviewItem<'a> {
    pub artifact: &'a RenderArtifact,
    pub critique: &'a str,
    pub description: &'a str,
    pub target: &'a str,
}

impl<'a> ReviewItem<'a> {
    pub fn for_plan(artifact: &'a RenderArtifact, plan: &'a PublishPlan, target: &'a str) -> Self {
        Self {
            artifact,
            critique: &plan.note_content,
            description: &plan.description,
            target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Publish,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Published(PublishedRecords),
    Cancelled,
}

/// Presentation of a review. Implementations only display and collect the
/// decision; they never write to the tracking service.
pub trait ReviewSurface {
    fn present(&mut self, item: &ReviewItem<'_>) -> ReviewResult<ReviewDecision>;

    /// Close the surface after a successful publish
    fn dismiss(&mut self, records: &PublishedRecords) -> ReviewResult<()>;
}

/// Non-interactive surface that approves every review
#[derive(Debug, Default)]
pub struct AutoConfirm;

impl ReviewSurface for AutoConfirm {
    fn present(&mut self, item: &ReviewItem<'_>) -> ReviewResult<ReviewDecision> {
        info!(
            render = %item.artifact.path.display(),
            selection = item.target,
            "auto-confirming review"
        );
        Ok(ReviewDecision::Publish)
    }

    fn dismiss(&mut self, _records: &PublishedRecords) -> ReviewResult<()> {
        Ok(())
    }
}

/// Present the review; on confirmation verify the selection and commit.
pub fn review_and_publish(
    surface: &mut dyn ReviewSurface,
    artifact: &RenderArtifact,
    plan: &PublishPlan,
    svc: &dyn TrackingService,
) -> ReviewResult<ReviewOutcome> {
    let target = plan.target.label();
    let item = ReviewItem::for_plan(artifact, plan, &target);

    match surface.present(&item)? {
        ReviewDecision::Cancel => {
            info!(selection = %target, "review cancelled, nothing published");
            Ok(ReviewOutcome::Cancelled)
        }
        ReviewDecision::Publish => {
            verify_target(svc, &plan.target)?;
            let records = plan.commit(svc)?;
            surface.dismiss(&records)?;
            Ok(ReviewOutcome::Published(records))
        }
    }
}
