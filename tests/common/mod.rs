//! Shared fixtures: an in-memory tracker, a stub completion client and
//! render files on disk.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use render_critic::critique::{CompletionClient, CritiqueError, CritiqueResult};
use render_critic::tracking::{
    Entity, EntityRef, Fields, Filter, TrackingError, TrackingResult, TrackingService,
};

/// Write a solid-colour render; the format follows the extension
pub fn write_render(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([180, 90, 40]));
    img.save(&path).expect("Failed to write render");
    path
}

fn link(entity_type: &str, id: i64) -> serde_json::Value {
    EntityRef::new(entity_type, id).to_value()
}

fn record(entity_type: &str, id: i64, fields: serde_json::Value) -> Entity {
    let fields = match fields {
        serde_json::Value::Object(map) => map,
        _ => Fields::new(),
    };
    Entity::new(entity_type, id, fields)
}

/// Tracker backed by a vector of records. Operations named in `fail_on`
/// (e.g. `"create Note"`) answer with HTTP 500.
pub struct InMemoryTracker {
    pub records: RefCell<Vec<Entity>>,
    pub thumbnails: RefCell<Vec<(i64, PathBuf)>>,
    pub calls: RefCell<Vec<String>>,
    fail_on: RefCell<Vec<String>>,
    next_id: Cell<i64>,
}

impl InMemoryTracker {
    pub fn empty() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
            thumbnails: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            fail_on: RefCell::new(Vec::new()),
            next_id: Cell::new(9001),
        }
    }

    /// Two projects, each with one sequence holding one shot:
    /// 7 Campaign A / 42 SEQ010 / 101 SH020 and 8 Campaign B / 43 SEQ020 / 102 SH030
    pub fn studio() -> Self {
        let tracker = Self::empty();
        tracker.records.borrow_mut().extend([
            record("Project", 7, serde_json::json!({"name": "Campaign A"})),
            record("Project", 8, serde_json::json!({"name": "Campaign B"})),
            record(
                "Sequence",
                42,
                serde_json::json!({"code": "SEQ010", "project": link("Project", 7)}),
            ),
            record(
                "Sequence",
                43,
                serde_json::json!({"code": "SEQ020", "project": link("Project", 8)}),
            ),
            record(
                "Shot",
                101,
                serde_json::json!({
                    "code": "SH020",
                    "sg_sequence": link("Sequence", 42),
                    "project": link("Project", 7)
                }),
            ),
            record(
                "Shot",
                102,
                serde_json::json!({
                    "code": "SH030",
                    "sg_sequence": link("Sequence", 43),
                    "project": link("Project", 8)
                }),
            ),
        ]);
        tracker
    }

    pub fn fail_on(self, operation: &str) -> Self {
        self.fail_on.borrow_mut().push(operation.to_string());
        self
    }

    pub fn of_type(&self, entity_type: &str) -> Vec<Entity> {
        self.records
            .borrow()
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect()
    }

    /// Calls that wrote something
    pub fn writes(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| !c.starts_with("find"))
            .cloned()
            .collect()
    }

    fn enter(&self, operation: String) -> TrackingResult<()> {
        self.calls.borrow_mut().push(operation.clone());
        if self.fail_on.borrow().contains(&operation) {
            return Err(TrackingError::Status {
                operation,
                status: 500,
            });
        }
        Ok(())
    }
}

fn matches(entity: &Entity, filter: &Filter) -> bool {
    if filter.field() == "id" {
        return filter.value().as_i64() == Some(entity.id);
    }
    match filter.value() {
        serde_json::Value::Object(_) => {
            let wanted = filter.value().get("id").and_then(|v| v.as_i64());
            entity.link(filter.field()).map(|r| r.id) == wanted
        }
        value => entity.fields.get(filter.field()) == Some(value),
    }
}

impl TrackingService for InMemoryTracker {
    fn find(
        &self,
        entity_type: &str,
        filters: &[Filter],
        _fields: &[&str],
    ) -> TrackingResult<Vec<Entity>> {
        self.enter(format!("find {}", entity_type))?;
        Ok(self
            .of_type(entity_type)
            .into_iter()
            .filter(|e| filters.iter().all(|f| matches(e, f)))
            .collect())
    }

    fn create(&self, entity_type: &str, fields: &Fields) -> TrackingResult<Entity> {
        self.enter(format!("create {}", entity_type))?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let entity = Entity::new(entity_type, id, fields.clone());
        self.records.borrow_mut().push(entity.clone());
        Ok(entity)
    }

    fn update(&self, entity_type: &str, id: i64, fields: &Fields) -> TrackingResult<Entity> {
        self.enter(format!("update {}", entity_type))?;
        let mut records = self.records.borrow_mut();
        let entity = records
            .iter_mut()
            .find(|e| e.entity_type == entity_type && e.id == id)
            .ok_or(TrackingError::Status {
                operation: "update".to_string(),
                status: 404,
            })?;
        for (name, value) in fields {
            entity.fields.insert(name.clone(), value.clone());
        }
        Ok(entity.clone())
    }

    fn delete(&self, entity_type: &str, id: i64) -> TrackingResult<()> {
        self.enter(format!("delete {}", entity_type))?;
        self.records
            .borrow_mut()
            .retain(|e| !(e.entity_type == entity_type && e.id == id));
        Ok(())
    }

    fn upload_thumbnail(&self, entity_type: &str, id: i64, path: &Path) -> TrackingResult<()> {
        self.enter(format!("upload {}", entity_type))?;
        self.thumbnails.borrow_mut().push((id, path.to_path_buf()));
        Ok(())
    }
}

/// Completion client with a fixed answer, or a fixed HTTP failure
pub struct StubCompletion {
    reply: String,
    fail_status: Option<u16>,
    pub calls: Cell<usize>,
}

impl StubCompletion {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_status: None,
            calls: Cell::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: String::new(),
            fail_status: Some(status),
            calls: Cell::new(0),
        }
    }
}

impl CompletionClient for StubCompletion {
    fn complete(&self, _request: &serde_json::Value) -> CritiqueResult<String> {
        self.calls.set(self.calls.get() + 1);
        match self.fail_status {
            Some(status) => Err(CritiqueError::Status(status)),
            None => Ok(self.reply.clone()),
        }
    }
}
