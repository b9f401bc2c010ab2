//! Render Critic - vision model critique of rendered frames, with operator
//! review and publish to Shotgrid.
//!
//! This crate provides:
//! - Critique requests to an OpenAI-compatible vision chat endpoint
//! - A Shotgrid REST client and cascading Project / Sequence / Shot lookups
//! - A staged Version + Note publish that cleans up after partial failure
//! - A terminal review surface behind the [`review::ReviewSurface`] trait
//! - File-backed sessions holding the operator's inputs and the critique
//!
//! # Example
//!
//! ```rust,no_run
//! use render_critic::artifact::RenderArtifact;
//! use render_critic::credentials::CredentialBundle;
//! use render_critic::critique::{CritiqueConfig, HttpCompletionClient, PromptPair, analyze_render};
//!
//! let creds = CredentialBundle::load("/studio/creds.json")?;
//! let config = CritiqueConfig::default();
//! let client = HttpCompletionClient::new(creds.completion_key()?, &config);
//! let render = RenderArtifact::open("/renders/render_0012.jpg")?;
//! let prompts = PromptPair::new("You are a render critic", "Critique this frame");
//! println!("{}", analyze_render(&client, &config, &prompts, &render)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod artifact;
pub mod config;
pub mod credentials;
pub mod critique;
mod http;
pub mod outcome;
pub mod publish;
pub mod review;
pub mod selection;
pub mod session;
pub mod tracking;

pub use artifact::{ArtifactError, RenderArtifact};
pub use credentials::{CredentialBundle, CredentialError, ShotgridCredentials};
pub use critique::{
    CompletionClient, CritiqueConfig, CritiqueError, HttpCompletionClient, PromptPair,
    analyze_render, build_request, run_critique_stage,
};
pub use outcome::{CritiqueOutcome, PublishOutcome};
pub use publish::{PublishError, PublishPlan, PublishTarget, PublishedRecords, verify_target};
pub use review::{
    AutoConfirm, ReviewDecision, ReviewError, ReviewItem, ReviewOutcome, ReviewSurface,
    TerminalReview, review_and_publish,
};
pub use selection::{MenuStatus, SelectionError, SelectionMenu, TrackingSelection};
pub use session::{Session, SessionError, SessionFields, cleanup_old_sessions, list_sessions};
pub use tracking::{ShotgridClient, TrackingConfig, TrackingError, TrackingService};
