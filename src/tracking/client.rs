//! Shotgrid REST API client.
//!
//! Authenticates once with script credentials (client-credentials grant) and
//! reuses the bearer token for every call in the invocation.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::types::{Entity, Fields, Filter, TrackingError, TrackingResult, TrackingService};
use crate::artifact::mime_for_path;
use crate::config;
use crate::credentials::ShotgridCredentials;
use crate::http;

/// Content type that lets `_search` take filters as `[field, op, value]` arrays
const ARRAY_FILTERS: &str = "application/vnd+shotgun.api3_array+json";

/// Settings for the tracking client and the records it writes
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Request timeout (seconds)
    pub timeout: u64,
    /// Records per search page
    pub page_size: u32,
    /// Subject of created notes
    pub note_subject: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            timeout: cfg.tracking.timeout,
            page_size: cfg.tracking.page_size,
            note_subject: cfg.tracking.note_subject.clone(),
        }
    }
}

impl TrackingConfig {
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn note_subject(mut self, subject: impl Into<String>) -> Self {
        self.note_subject = subject.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// A record as the REST API returns it
#[derive(Debug, Deserialize)]
struct RestRecord {
    #[serde(rename = "type")]
    entity_type: String,
    id: i64,
    #[serde(default)]
    attributes: Fields,
    #[serde(default)]
    relationships: serde_json::Map<String, serde_json::Value>,
}

impl RestRecord {
    /// Flatten attributes and relationship links into one field map
    fn into_entity(self) -> Entity {
        let mut fields = self.attributes;
        for (name, relationship) in self.relationships {
            if let Some(data) = relationship.get("data") {
                fields.insert(name, data.clone());
            }
        }
        Entity::new(self.entity_type, self.id, fields)
    }
}

#[derive(Debug, Deserialize)]
struct SingleRecord {
    data: RestRecord,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    data: Vec<RestRecord>,
}

#[derive(Debug, Deserialize)]
struct UploadTicket {
    data: serde_json::Value,
    links: UploadLinks,
}

#[derive(Debug, Deserialize)]
struct UploadLinks {
    upload: String,
    complete_upload: String,
}

/// REST collection name for an entity type (`Shot` -> `shots`)
pub fn rest_collection(entity_type: &str) -> String {
    format!("{}s", entity_type.to_lowercase())
}

pub struct ShotgridClient {
    agent: ureq::Agent,
    site: String,
    authorization: String,
    page_size: u32,
}

impl std::fmt::Debug for ShotgridClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShotgridClient")
            .field("site", &self.site)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ShotgridClient {
    /// Exchange script credentials for an access token
    pub fn connect(creds: &ShotgridCredentials, config: &TrackingConfig) -> TrackingResult<Self> {
        let agent = http::agent(config.timeout);
        let site = creds.website.trim().trim_end_matches('/').to_string();
        let url = format!("{}/api/v1/auth/access_token", site);

        let response = agent.post(&url).header("Accept", "application/json").send_form([
            ("grant_type", "client_credentials"),
            ("client_id", creds.script_name.as_str()),
            ("client_secret", creds.api_key.as_str()),
        ]);
        let token: AccessToken = parse("authenticate", &read_body("authenticate", response)?)?;

        info!(site = %site, script = %creds.script_name, "connected to Shotgrid");

        Ok(Self {
            agent,
            site,
            authorization: format!("Bearer {}", token.access_token),
            page_size: config.page_size.max(1),
        })
    }

    fn entity_url(&self, entity_type: &str, suffix: &str) -> String {
        format!(
            "{}/api/v1/entity/{}{}",
            self.site,
            rest_collection(entity_type),
            suffix
        )
    }

    /// Site-relative links come back as paths
    fn resolve(&self, link: &str) -> String {
        if link.starts_with('/') {
            format!("{}{}", self.site, link)
        } else {
            link.to_string()
        }
    }

    fn send_json(
        &self,
        operation: &str,
        request: ureq::RequestBuilder<ureq::typestate::WithBody>,
        body: &serde_json::Value,
    ) -> TrackingResult<String> {
        let payload =
            serde_json::to_string(body).map_err(|e| TrackingError::InvalidResponse(e.to_string()))?;
        let response = request
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .send(&payload);
        read_body(operation, response)
    }
}

impl TrackingService for ShotgridClient {
    fn find(
        &self,
        entity_type: &str,
        filters: &[Filter],
        fields: &[&str],
    ) -> TrackingResult<Vec<Entity>> {
        let url = self.entity_url(entity_type, "/_search");
        let mut found = Vec::new();
        let mut page = 1u32;

        loop {
            let body = serde_json::json!({
                "filters": filters,
                "fields": fields,
                "page": { "number": page, "size": self.page_size },
            });
            let request = self.agent.post(&url).header("Content-Type", ARRAY_FILTERS);
            let text = self.send_json("find", request, &body)?;
            let RecordPage { data } = parse("find", &text)?;

            let count = data.len();
            found.extend(data.into_iter().map(RestRecord::into_entity));
            debug!(entity_type, page, count, "search page");

            if count < self.page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(found)
    }

    fn create(&self, entity_type: &str, fields: &Fields) -> TrackingResult<Entity> {
        let request = self
            .agent
            .post(&self.entity_url(entity_type, ""))
            .header("Content-Type", "application/json");
        let text = self.send_json("create", request, &serde_json::Value::Object(fields.clone()))?;
        let record: SingleRecord = parse("create", &text)?;
        info!(entity_type, id = record.data.id, "created record");
        Ok(record.data.into_entity())
    }

    fn update(&self, entity_type: &str, id: i64, fields: &Fields) -> TrackingResult<Entity> {
        let request = self
            .agent
            .put(&self.entity_url(entity_type, &format!("/{}", id)))
            .header("Content-Type", "application/json");
        let text = self.send_json("update", request, &serde_json::Value::Object(fields.clone()))?;
        let record: SingleRecord = parse("update", &text)?;
        Ok(record.data.into_entity())
    }

    fn delete(&self, entity_type: &str, id: i64) -> TrackingResult<()> {
        let response = self
            .agent
            .delete(&self.entity_url(entity_type, &format!("/{}", id)))
            .header("Authorization", &self.authorization)
            .call();
        read_body("delete", response)?;
        info!(entity_type, id, "deleted record");
        Ok(())
    }

    fn upload_thumbnail(&self, entity_type: &str, id: i64, path: &Path) -> TrackingResult<()> {
        let bytes = fs::read(path).map_err(|source| TrackingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "render".to_string());

        let response = self
            .agent
            .get(&self.entity_url(entity_type, &format!("/{}/image/_upload", id)))
            .query("filename", &filename)
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .call();
        let ticket: UploadTicket = parse("upload", &read_body("upload", response)?)?;

        // Pre-signed storage links must not carry the bearer token
        let upload = self
            .agent
            .put(&self.resolve(&ticket.links.upload))
            .header("Content-Type", mime_for_path(path));
        let upload = if ticket.links.upload.starts_with('/') {
            upload.header("Authorization", &self.authorization)
        } else {
            upload
        };
        read_body("upload", upload.send(&bytes[..]))?;

        let complete = serde_json::json!({
            "upload_info": ticket.data,
            "upload_data": {},
        });
        let request = self
            .agent
            .post(&self.resolve(&ticket.links.complete_upload))
            .header("Content-Type", "application/json");
        self.send_json("upload", request, &complete)?;

        info!(entity_type, id, file = %filename, bytes = bytes.len(), "uploaded thumbnail");
        Ok(())
    }
}

fn read_body(
    operation: &str,
    response: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> TrackingResult<String> {
    let mut response = response.map_err(|e| TrackingError::from_ureq(operation, e))?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| TrackingError::Transport(e.to_string()))
}

fn parse<T: DeserializeOwned>(operation: &str, text: &str) -> TrackingResult<T> {
    serde_json::from_str(text)
        .map_err(|e| TrackingError::InvalidResponse(format!("{}: {}", operation, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_collection() {
        assert_eq!(rest_collection("Shot"), "shots");
        assert_eq!(rest_collection("Version"), "versions");
        assert_eq!(rest_collection("Note"), "notes");
    }

    #[test]
    fn test_record_flattening() {
        let record: RestRecord = serde_json::from_value(serde_json::json!({
            "type": "Shot",
            "id": 101,
            "attributes": {"code": "SH020"},
            "relationships": {
                "sg_sequence": {
                    "data": {"type": "Sequence", "id": 42, "name": "SEQ010"},
                    "links": {}
                }
            },
            "links": {"self": "/api/v1/entity/shots/101"}
        }))
        .unwrap();

        let entity = record.into_entity();
        assert_eq!(entity.id, 101);
        assert_eq!(entity.text("code"), Some("SH020"));
        assert_eq!(entity.link("sg_sequence").map(|r| r.id), Some(42));
    }
}
