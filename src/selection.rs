//! Operator's Project / Sequence / Shot choice.
//!
//! Each level is a menu of `(id, label)` pairs with an explicit status, so a
//! failed lookup shows up as a failed menu instead of a stale one. Changing a
//! parent clears every level below it; a stored selection is therefore always
//! consistent with the menus it was made from.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::publish::{PublishError, PublishResult, PublishTarget};
use crate::tracking::lookup::{self, EntityChoice, LookupResult};
use crate::tracking::TrackingService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MenuStatus {
    /// Never loaded, or cleared because its parent changed
    #[default]
    Unloaded,
    Ready,
    /// Tracking integration is switched off
    Disabled,
    Failed {
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("{level} {id} is not in the {level} menu")]
    NotInMenu { level: &'static str, id: i64 },

    #[error("the {0} menu is not available")]
    Unavailable(&'static str),
}

/// One cascading menu
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMenu {
    pub items: Vec<EntityChoice>,
    pub selected: Option<i64>,
    pub status: MenuStatus,
}

impl SelectionMenu {
    /// Replace items with a lookup result. The selection survives only if its
    /// id is still offered.
    pub fn load(&mut self, level: &'static str, result: LookupResult<Vec<EntityChoice>>) {
        match result {
            Ok(items) => {
                if let Some(id) = self.selected {
                    if !items.iter().any(|c| c.id == id) {
                        self.selected = None;
                    }
                }
                self.items = items;
                self.status = MenuStatus::Ready;
            }
            Err(err) => {
                warn!(level, error = %err, "lookup failed");
                self.items.clear();
                self.selected = None;
                self.status = MenuStatus::Failed {
                    reason: err.to_string(),
                };
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn disable(&mut self) {
        *self = Self {
            status: MenuStatus::Disabled,
            ..Self::default()
        };
    }

    fn select(&mut self, level: &'static str, id: i64) -> Result<bool, SelectionError> {
        if self.status != MenuStatus::Ready {
            return Err(SelectionError::Unavailable(level));
        }
        if !self.items.iter().any(|c| c.id == id) {
            return Err(SelectionError::NotInMenu { level, id });
        }
        let changed = self.selected != Some(id);
        self.selected = Some(id);
        Ok(changed)
    }

    pub fn selected_choice(&self) -> Option<&EntityChoice> {
        let id = self.selected?;
        self.items.iter().find(|c| c.id == id)
    }

    /// Menu ids, parallel to [`labels`](Self::labels)
    pub fn ids(&self) -> Vec<i64> {
        self.items.iter().map(|c| c.id).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|c| c.label.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSelection {
    pub projects: SelectionMenu,
    pub sequences: SelectionMenu,
    pub shots: SelectionMenu,
}

impl TrackingSelection {
    /// Tracking switched off: every menu disabled, nothing queried
    pub fn disable_all(&mut self) {
        self.projects.disable();
        self.sequences.disable();
        self.shots.disable();
    }

    /// Reload the menus top-down. A level is only queried when its parent has
    /// a selection.
    pub fn refresh(&mut self, svc: &dyn TrackingService) {
        self.projects.load("project", lookup::projects(svc));

        let Some(project_id) = self.projects.selected else {
            self.sequences.clear();
            self.shots.clear();
            return;
        };
        self.sequences
            .load("sequence", lookup::sequences(svc, project_id));

        match self.sequences.selected {
            Some(sequence_id) => self.shots.load("shot", lookup::shots(svc, sequence_id)),
            None => self.shots.clear(),
        }
    }

    pub fn select_project(&mut self, id: i64) -> Result<(), SelectionError> {
        if self.projects.select("project", id)? {
            self.sequences.clear();
            self.shots.clear();
        }
        Ok(())
    }

    pub fn select_sequence(&mut self, id: i64) -> Result<(), SelectionError> {
        if self.sequences.select("sequence", id)? {
            self.shots.clear();
        }
        Ok(())
    }

    pub fn select_shot(&mut self, id: i64) -> Result<(), SelectionError> {
        self.shots.select("shot", id)?;
        Ok(())
    }

    /// Select a project and load its sequences, unless they are already
    /// loaded for it
    pub fn choose_project(
        &mut self,
        svc: &dyn TrackingService,
        id: i64,
    ) -> Result<(), SelectionError> {
        let changed = self.projects.select("project", id)?;
        if !changed && self.sequences.status == MenuStatus::Ready {
            return Ok(());
        }
        self.shots.clear();
        self.sequences.clear();
        self.sequences.load("sequence", lookup::sequences(svc, id));
        Ok(())
    }

    /// Select a sequence and load its shots, unless they are already loaded
    /// for it
    pub fn choose_sequence(
        &mut self,
        svc: &dyn TrackingService,
        id: i64,
    ) -> Result<(), SelectionError> {
        let changed = self.sequences.select("sequence", id)?;
        if !changed && self.shots.status == MenuStatus::Ready {
            return Ok(());
        }
        self.shots.clear();
        self.shots.load("shot", lookup::shots(svc, id));
        Ok(())
    }

    /// The complete selection, or which level is missing
    pub fn target(&self) -> PublishResult<PublishTarget> {
        let project = self
            .projects
            .selected_choice()
            .ok_or(PublishError::IncompleteSelection("project"))?;
        let sequence = self
            .sequences
            .selected_choice()
            .ok_or(PublishError::IncompleteSelection("sequence"))?;
        let shot = self
            .shots
            .selected_choice()
            .ok_or(PublishError::IncompleteSelection("shot"))?;
        PublishTarget::new(project.clone(), sequence.clone(), shot.clone())
    }
}
