//! End-to-end tests for the resource contract framework.
//!
//! A small `notes` resource is built on the base service, registered through
//! the service and controller registries, and driven through its controller
//! the way the transport layer would.
//!
//! Covered flows:
//! 1. Pagination validation and sanitization
//! 2. Bulk id validation
//! 3. Registration and lookup through the registries
//! 4. Controller actions with and without an acting principal

use admin_core::{
    AdminError, ApiResponse, BaseResourceService, BulkActions, Capability, ControllerContract,
    ControllerRegistry, CrudActions, CrudContract, DiscoveryAction, ListRequest, ListingAction,
    MemoryRepository, PermissionLookup, Record, RecordRules, ResourceController,
    ResourceDescriptor, ResourceRequest, ServiceContract, ServiceRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    #[serde(default)]
    id: u64,
    title: String,
    #[serde(default)]
    pinned: bool,
}

impl Record for Note {
    const TABLE: &'static str = "notes";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

struct NoteRules;

impl RecordRules<Note> for NoteRules {
    fn validate_create(&self, note: &Note) -> admin_core::AdminResult<()> {
        if note.title.trim().is_empty() {
            return Err(AdminError::invalid_field("title", "title is required"));
        }
        Ok(())
    }

    fn validation_rules(&self) -> BTreeMap<String, Vec<String>> {
        let mut rules = BTreeMap::new();
        rules.insert("title".to_string(), vec!["required".to_string()]);
        rules
    }
}

/// Granted permission slugs.
struct Actor(HashSet<String>);

impl Actor {
    fn with(slugs: &[&str]) -> Arc<dyn PermissionLookup> {
        Arc::new(Actor(slugs.iter().map(|s| s.to_string()).collect()))
    }
}

impl PermissionLookup for Actor {
    fn has_permission(&self, slug: &str) -> bool {
        self.0.contains(slug)
    }
}

fn note_service() -> BaseResourceService<Note> {
    BaseResourceService::new(
        ResourceDescriptor::new("notes", "Note")
            .sortable(&["title"])
            .filterable(&["pinned"])
            .searchable(&["title"])
            .standard_permissions(),
        MemoryRepository::<Note>::shared(),
    )
    .with_rules(Arc::new(NoteRules))
}

/// Registered service and controller, as wired at startup.
struct TestFixture {
    services: Arc<ServiceRegistry>,
    controllers: Arc<ControllerRegistry>,
}

impl TestFixture {
    fn new() -> Self {
        let service: Arc<dyn ServiceContract> = Arc::new(note_service());
        let controller = ResourceController::new(service.clone())
            .with_validation_rules(NoteRules.validation_rules());

        let mut services = ServiceRegistry::for_services();
        services.must_register("notes", service);

        let mut controllers = ControllerRegistry::for_controllers();
        controllers.must_register("notes", Arc::new(controller));

        Self {
            services: Arc::new(services),
            controllers: Arc::new(controllers),
        }
    }

    fn controller(&self) -> Arc<dyn ControllerContract> {
        self.controllers.get("notes").unwrap()
    }

    async fn seed(&self, titles: &[&str]) {
        let service = self.services.get("notes").unwrap();
        let crud = service.crud().unwrap();
        for title in titles {
            crud.create(json!({"title": title})).await.unwrap();
        }
    }
}

fn status(response: &ApiResponse) -> u16 {
    response.status
}

#[test]
fn test_page_zero_is_rejected() {
    let service = note_service();
    let err = service.validate_pagination_params(0, 20).unwrap_err();
    assert!(matches!(err, AdminError::InvalidArgument { .. }));
    assert_eq!(err.to_string(), "page must be greater than 0");
}

#[test]
fn test_sanitize_out_of_range_request() {
    let service = note_service();
    let sanitized = service.sanitize_list_request(ListRequest {
        page: -1,
        page_size: 9999,
        direction: "sideways".to_string(),
        ..ListRequest::default()
    });
    assert_eq!(sanitized.page, 1);
    assert_eq!(sanitized.page_size, service.config().max_page_size);
    assert_eq!(sanitized.direction, "DESC");
}

#[test]
fn test_duplicate_bulk_id_is_cited() {
    let service = note_service();
    let err = service.validate_bulk_operation(&[1, 2, 2]).unwrap_err();
    assert!(err.to_string().contains("duplicate id 2"));
}

#[test]
fn test_registries_expose_full_surface() {
    let fixture = TestFixture::new();
    let report = fixture.services.validate_all();
    assert!(report.all_passed());
    assert_eq!(report.entries[0].name, "notes");

    let controller = fixture.controller();
    assert_eq!(controller.resource(), "notes");
    assert!(fixture.controllers.validate_all().all_passed());

    let metadata = controller.discovery().unwrap().metadata();
    assert!(metadata.actions.contains(&"bulk_destroy".to_string()));
    assert_eq!(metadata.permissions["index"], "notes.view");
    assert_eq!(metadata.permissions["destroy"], "notes.delete");
    assert_eq!(metadata.validation_rules["title"], vec!["required".to_string()]);

    let service = fixture.services.get("notes").unwrap();
    let capabilities = service.metadata().capabilities;
    assert!(capabilities.contains(&Capability::BulkOperations.as_str().to_string()));
}

#[tokio::test]
async fn test_index_paginates_with_envelope() {
    let fixture = TestFixture::new();
    let titles: Vec<String> = (1..=12).map(|n| format!("note {n:02}")).collect();
    let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
    fixture.seed(&refs).await;

    let controller = fixture.controller();
    let listing = controller.listing().unwrap();

    let response = listing
        .index(
            &ResourceRequest::new()
                .with_query("page", "2")
                .with_query("page_size", "5")
                .with_query("sort", "title")
                .with_query("direction", "asc"),
        )
        .await;
    assert_eq!(status(&response), 200);
    let body = serde_json::to_value(response.body.unwrap()).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"][0]["title"], json!("note 06"));
    assert_eq!(body["pagination"]["total"], json!(12));
    assert_eq!(body["pagination"]["last_page"], json!(3));
    assert_eq!(body["pagination"]["from"], json!(6));
    assert_eq!(body["pagination"]["to"], json!(10));

    // Unrecognized page size falls back to the default instead of failing.
    let response = listing
        .index(&ResourceRequest::new().with_query("page_size", "7"))
        .await;
    assert_eq!(status(&response), 200);
    assert_eq!(response.body.unwrap().pagination.unwrap().per_page, 20);

    let response = listing
        .index(&ResourceRequest::new().with_query("page", "0"))
        .await;
    assert_eq!(status(&response), 422);

    let response = listing
        .index(&ResourceRequest::new().with_query("page", i64::MAX.to_string()))
        .await;
    assert_eq!(status(&response), 422);
    assert!(response.body.unwrap().errors.unwrap().contains_key("page"));
}

#[tokio::test]
async fn test_service_rejects_page_past_addressable_rows() {
    let service = note_service();
    let err = service
        .list(ListRequest::new(i64::MAX, 50))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("page"));

    let page = service.list(ListRequest::new(1_000_000, 50)).await.unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.current_page, 1_000_000);
}

#[tokio::test]
async fn test_crud_actions_round_trip() {
    let fixture = TestFixture::new();
    let controller = fixture.controller();
    let crud = controller.crud_actions().unwrap();

    let response = crud
        .store(&ResourceRequest::new().with_body(json!({"title": "Groceries"})))
        .await;
    assert_eq!(status(&response), 201);
    assert_eq!(response.message(), Some("Note created successfully"));
    assert_eq!(response.data().unwrap()["id"], json!(1));

    let response = crud
        .update(
            &ResourceRequest::new()
                .with_param("id", "1")
                .with_body(json!({"title": "Groceries", "pinned": true})),
        )
        .await;
    assert_eq!(status(&response), 200);
    assert_eq!(response.data().unwrap()["pinned"], json!(true));

    let response = crud
        .show(&ResourceRequest::new().with_param("id", "1"))
        .await;
    assert_eq!(status(&response), 200);

    let response = crud
        .destroy(&ResourceRequest::new().with_param("id", "1"))
        .await;
    assert_eq!(status(&response), 204);

    let response = crud
        .show(&ResourceRequest::new().with_param("id", "1"))
        .await;
    assert_eq!(status(&response), 404);
    assert_eq!(response.message(), Some("Note with ID 1 not found"));

    let response = crud
        .store(&ResourceRequest::new().with_body(json!({"title": ""})))
        .await;
    assert_eq!(status(&response), 422);

    let response = crud
        .show(&ResourceRequest::new().with_param("id", "zero"))
        .await;
    assert_eq!(status(&response), 422);
}

#[tokio::test]
async fn test_actor_permissions_gate_actions() {
    let fixture = TestFixture::new();
    fixture.seed(&["existing"]).await;
    let controller = fixture.controller();
    let crud = controller.crud_actions().unwrap();

    let reader = Actor::with(&["notes.view"]);
    let response = crud
        .show(
            &ResourceRequest::new()
                .with_param("id", "1")
                .with_actor(reader.clone()),
        )
        .await;
    assert_eq!(status(&response), 200);

    let response = crud
        .destroy(
            &ResourceRequest::new()
                .with_param("id", "1")
                .with_actor(reader),
        )
        .await;
    assert_eq!(status(&response), 403);

    // The record is untouched after a forbidden request.
    let response = crud
        .show(&ResourceRequest::new().with_param("id", "1"))
        .await;
    assert_eq!(status(&response), 200);
}

#[tokio::test]
async fn test_bulk_actions_report_partial_success() {
    let fixture = TestFixture::new();
    fixture.seed(&["a", "b", "c"]).await;
    let controller = fixture.controller();
    let bulk = controller.bulk_actions().unwrap();

    let response = bulk
        .bulk_destroy(&ResourceRequest::new().with_body(json!({"ids": [1, 1]})))
        .await;
    assert_eq!(status(&response), 409);

    let response = bulk
        .bulk_destroy(&ResourceRequest::new().with_body(json!({"ids": [1, 7, 2]})))
        .await;
    assert_eq!(status(&response), 207);
    assert_eq!(
        response.body.unwrap().meta.unwrap(),
        json!({"succeeded": 1, "total": 3})
    );

    let response = bulk
        .bulk_store(
            &ResourceRequest::new().with_body(json!([{"title": "d"}, {"title": "e"}])),
        )
        .await;
    assert_eq!(status(&response), 201);
    assert_eq!(response.data().unwrap()["succeeded"], json!(2));
}
