//! Shotgrid REST client against mock servers

mod common;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use common::write_render;
use render_critic::publish::PublishStep;
use render_critic::tracking::{EntityChoice, Fields, Filter, lookup};
use render_critic::{
    PublishError, PublishPlan, PublishTarget, RenderArtifact, ShotgridClient, ShotgridCredentials,
    TrackingConfig, TrackingError, TrackingService, verify_target,
};

const ARRAY_FILTERS: &str = "application/vnd+shotgun.api3_array+json";

fn credentials(site: String) -> ShotgridCredentials {
    ShotgridCredentials {
        website: site,
        script_name: "render_critic".to_string(),
        api_key: "script-key".to_string(),
    }
}

fn config() -> TrackingConfig {
    TrackingConfig {
        timeout: 10,
        page_size: 500,
        note_subject: "GPT4 feedback notes".to_string(),
    }
}

fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/auth/access_token")
            .header("content-type", "application/x-www-form-urlencoded");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"token_type": "Bearer", "access_token": "tok", "expires_in": 600}));
    })
}

fn connect(server: &MockServer) -> ShotgridClient {
    mock_token(server);
    ShotgridClient::connect(&credentials(server.base_url()), &config()).expect("connect")
}

fn target() -> PublishTarget {
    PublishTarget::new(
        EntityChoice::new(7, "Campaign A"),
        EntityChoice::new(42, "SEQ010"),
        EntityChoice::new(101, "SH020"),
    )
    .unwrap()
}

#[test]
fn test_connect_exchanges_credentials() {
    let server = MockServer::start();
    let token = mock_token(&server);

    let site = format!("{}/", server.base_url());
    let client = ShotgridClient::connect(&credentials(site), &config());

    token.assert();
    assert!(client.is_ok());
}

#[test]
fn test_connect_rejected() {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method(POST).path("/api/v1/auth/access_token");
        then.status(401)
            .json_body(json!({"errors": [{"status": 401, "title": "Authentication failed"}]}));
    });

    let result = ShotgridClient::connect(&credentials(server.base_url()), &config());

    token.assert();
    assert!(matches!(result, Err(TrackingError::Authentication(401))));
}

#[test]
fn test_sequence_lookup() {
    let server = MockServer::start();
    let client = connect(&server);

    let search = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/entity/sequences/_search")
            .header("authorization", "Bearer tok")
            .header("content-type", ARRAY_FILTERS);
        then.status(200).json_body(json!({
            "data": [
                {
                    "type": "Sequence",
                    "id": 42,
                    "attributes": {"code": "SEQ010"},
                    "relationships": {
                        "project": {"data": {"type": "Project", "id": 7, "name": "Campaign A"}}
                    },
                    "links": {"self": "/api/v1/entity/sequences/42"}
                }
            ],
            "links": {"self": "/api/v1/entity/sequences/_search"}
        }));
    });

    let choices = lookup::sequences(&client, 7).expect("lookup succeeds");

    search.assert();
    assert_eq!(choices, vec![EntityChoice::new(42, "SEQ010")]);
}

#[test]
fn test_lookup_error_names_entity_type() {
    let server = MockServer::start();
    let client = connect(&server);

    server.mock(|when, then| {
        when.method(POST).path("/api/v1/entity/projects/_search");
        then.status(503);
    });

    let err = lookup::projects(&client).unwrap_err();
    assert!(err.to_string().starts_with("Project lookup failed"));
}

#[test]
fn test_find_reads_every_page() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/v1/auth/access_token")
        .with_status(200)
        .with_body(r#"{"access_token": "tok"}"#)
        .create();

    let record = |id: i64| {
        json!({"type": "Project", "id": id, "attributes": {"name": format!("Campaign {}", id)}})
    };
    let first = server
        .mock("POST", "/api/v1/entity/projects/_search")
        .match_header("content-type", ARRAY_FILTERS)
        .match_body(mockito::Matcher::PartialJson(json!({"page": {"number": 1, "size": 2}})))
        .with_status(200)
        .with_body(json!({"data": [record(1), record(2)]}).to_string())
        .create();
    let second = server
        .mock("POST", "/api/v1/entity/projects/_search")
        .match_body(mockito::Matcher::PartialJson(json!({"page": {"number": 2, "size": 2}})))
        .with_status(200)
        .with_body(json!({"data": [record(3)]}).to_string())
        .create();

    let client =
        ShotgridClient::connect(&credentials(server.url()), &config().page_size(2)).unwrap();
    let found = client.find("Project", &[], &["name"]).unwrap();

    first.assert();
    second.assert();
    let ids: Vec<i64> = found.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(found[2].text("name"), Some("Campaign 3"));
}

#[test]
fn test_verify_target_reads_shot_links() {
    let server = MockServer::start();
    let client = connect(&server);

    let search = server.mock(|when, then| {
        when.method(POST).path("/api/v1/entity/shots/_search");
        then.status(200).json_body(json!({
            "data": [{
                "type": "Shot",
                "id": 101,
                "attributes": {"code": "SH020"},
                "relationships": {
                    "sg_sequence": {"data": {"type": "Sequence", "id": 43}},
                    "project": {"data": {"type": "Project", "id": 7}}
                }
            }]
        }));
    });

    let result = verify_target(&client, &target());

    search.assert();
    assert!(matches!(result, Err(PublishError::SelectionMismatch { shot: 101, .. })));
}

#[test]
fn test_create_update_delete() {
    let server = MockServer::start();
    let client = connect(&server);

    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/entity/versions")
            .header("authorization", "Bearer tok")
            .header("content-type", "application/json");
        then.status(201).json_body(json!({
            "data": {"type": "Version", "id": 9001, "attributes": {"code": "render_0012"}}
        }));
    });
    let update = server.mock(|when, then| {
        when.method(PUT).path("/api/v1/entity/versions/9001");
        then.status(200).json_body(json!({
            "data": {
                "type": "Version",
                "id": 9001,
                "attributes": {"description": "lighting pass v3"}
            }
        }));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/v1/entity/versions/9001")
            .header("authorization", "Bearer tok");
        then.status(204);
    });

    let mut fields = Fields::new();
    fields.insert("code".into(), "render_0012".into());
    let created = client.create("Version", &fields).unwrap();
    assert_eq!(created.id, 9001);
    assert_eq!(created.text("code"), Some("render_0012"));

    let mut fields = Fields::new();
    fields.insert("description".into(), "lighting pass v3".into());
    let updated = client.update("Version", 9001, &fields).unwrap();
    assert_eq!(updated.text("description"), Some("lighting pass v3"));

    client.delete("Version", 9001).unwrap();

    create.assert();
    update.assert();
    delete.assert();
}

#[test]
fn test_server_error_names_operation() {
    let server = MockServer::start();
    let client = connect(&server);

    server.mock(|when, then| {
        when.method(PUT).path("/api/v1/entity/versions/9001");
        then.status(500);
    });

    let result = client.update("Version", 9001, &Fields::new());
    match result {
        Err(TrackingError::Status { operation, status }) => {
            assert_eq!(operation, "update");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_thumbnail_upload() {
    let server = MockServer::start();
    let client = connect(&server);
    let dir = TempDir::new().unwrap();
    let path = write_render(dir.path(), "render_0012.jpg", 16, 9);

    let ticket = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/entity/versions/9001/image/_upload")
            .query_param("filename", "render_0012.jpg")
            .header("authorization", "Bearer tok");
        then.status(200).json_body(json!({
            "data": {
                "upload_type": "Thumbnail",
                "upload_id": null,
                "original_filename": "render_0012.jpg"
            },
            "links": {
                "upload": "/storage/upload/9001",
                "complete_upload": "/api/v1/entity/versions/9001/image/_upload"
            }
        }));
    });
    let upload = server.mock(|when, then| {
        when.method(PUT)
            .path("/storage/upload/9001")
            .header("content-type", "image/jpeg")
            .header("authorization", "Bearer tok");
        then.status(200);
    });
    let complete = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/entity/versions/9001/image/_upload")
            .header("content-type", "application/json");
        then.status(200);
    });

    client.upload_thumbnail("Version", 9001, &path).unwrap();

    ticket.assert();
    upload.assert();
    complete.assert();
}

#[test]
fn test_thumbnail_missing_file() {
    let server = MockServer::start();
    let client = connect(&server);

    let missing = std::path::Path::new("/no/such/render.jpg");
    let result = client.upload_thumbnail("Version", 9001, missing);
    assert!(matches!(result, Err(TrackingError::Io { .. })));
}

#[test]
fn test_publish_rolls_back_over_rest() {
    let server = MockServer::start();
    let client = connect(&server);
    let dir = TempDir::new().unwrap();
    let render = RenderArtifact::open(write_render(dir.path(), "render_0012.jpg", 16, 9)).unwrap();

    let create_version = server.mock(|when, then| {
        when.method(POST).path("/api/v1/entity/versions");
        then.status(201)
            .json_body(json!({"data": {"type": "Version", "id": 9001, "attributes": {}}}));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/api/v1/entity/versions/9001");
        then.status(200)
            .json_body(json!({"data": {"type": "Version", "id": 9001, "attributes": {}}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/entity/versions/9001/image/_upload");
        then.status(200).json_body(json!({
            "data": {},
            "links": {
                "upload": "/storage/upload/9001",
                "complete_upload": "/api/v1/entity/versions/9001/image/_upload"
            }
        }));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/storage/upload/9001");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/entity/versions/9001/image/_upload");
        then.status(200);
    });
    let create_note = server.mock(|when, then| {
        when.method(POST).path("/api/v1/entity/notes");
        then.status(500);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/api/v1/entity/versions/9001");
        then.status(204);
    });

    let plan = PublishPlan::new(
        target(),
        &render,
        "lighting pass v3",
        Some("The rim light is blown out."),
        "GPT4 feedback notes",
    )
    .unwrap();
    let result = plan.commit(&client);

    create_version.assert();
    create_note.assert();
    delete.assert();
    assert!(matches!(
        result,
        Err(PublishError::RolledBack {
            step: PublishStep::CreateNote,
            version_id: 9001,
            ..
        })
    ));
}

#[test]
fn test_filters_serialise_as_arrays() {
    let filters = [Filter::is("id", 101)];
    assert_eq!(serde_json::to_value(&filters).unwrap(), json!([["id", "is", 101]]));
}
