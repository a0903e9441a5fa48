//! End-to-end relationship create and refresh against a mocked remote.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gdap_migrate::auth::{Credential, CredentialCache, CredentialError, Resource, TokenAcquirer};
use gdap_migrate::console::Prompter;
use gdap_migrate::http::ApiClient;
use gdap_migrate::models::{CustomerRecord, DirectoryRole, Relationship, RelationshipStatus};
use gdap_migrate::store::{FileFormat, FileStore, Workspace};
use gdap_migrate::sync::{relationship::RelationshipSynchronizer, SyncContext};

struct StaticAcquirer;

#[async_trait]
impl TokenAcquirer for StaticAcquirer {
    async fn acquire(&self, _resource: Resource) -> Result<Credential, CredentialError> {
        Ok(Credential {
            access_token: "test-token".to_string(),
            tenant_id: "partner-tenant".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

/// Issues credentials that are always inside the freshness margin, so every
/// cache lookup has to come back here.
struct ShortLivedAcquirer {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenAcquirer for ShortLivedAcquirer {
    async fn acquire(&self, _resource: Resource) -> Result<Credential, CredentialError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Credential {
            access_token: format!("token-{call}"),
            tenant_id: "partner-tenant".to_string(),
            expires_at: Utc::now() + Duration::minutes(1),
        })
    }
}

struct YesPrompter;

impl Prompter for YesPrompter {
    fn confirm(&self, _message: &str) -> bool {
        true
    }

    fn read_line(&self, _prompt: &str) -> String {
        "y".to_string()
    }
}

fn context(server: &MockServer, workspace_root: std::path::PathBuf) -> SyncContext {
    let workspace = Workspace::new(workspace_root);
    workspace.ensure_directories().unwrap();
    SyncContext {
        client: ApiClient::new(),
        credentials: Arc::new(CredentialCache::new(Arc::new(StaticAcquirer))),
        store: FileStore::new(FileFormat::Json),
        workspace,
        batch_concurrency: 5,
        partner_api_base: server.uri(),
        graph_api_base: server.uri(),
        client_id: "client-1".to_string(),
    }
}

fn customer(name: &str, tenant: &str) -> CustomerRecord {
    CustomerRecord {
        name: name.to_string(),
        partner_tenant_id: "partner-tenant".to_string(),
        customer_tenant_id: tenant.to_string(),
        organization_display_name: format!("{name} Org"),
        duration: "730".to_string(),
    }
}

#[tokio::test]
async fn create_keeps_full_cardinality_when_one_draft_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, dir.path().to_path_buf());

    let customers = vec![
        customer("Alpha_GDAP", "c-alpha"),
        customer("Bravo_GDAP", "c-bravo"),
        customer("Charlie_GDAP", "c-charlie"),
    ];
    ctx.store
        .write(&ctx.workspace.customers_input_file(&ctx.store), &customers)
        .unwrap();
    let roles = vec![DirectoryRole {
        id: "62e90394-69f5-4237-9190-012177145e10".to_string(),
        name: "Global Administrator".to_string(),
        description: String::new(),
    }];
    ctx.store
        .write(&ctx.workspace.roles_input_file(&ctx.store), &roles)
        .unwrap();

    for (name, id) in [("Alpha_GDAP", "rel-alpha"), ("Charlie_GDAP", "rel-charlie")] {
        Mock::given(method("POST"))
            .and(path("/v1/delegatedAdminRelationships/migrate"))
            .and(body_partial_json(json!({"displayName": name})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": id,
                "displayName": name,
                "duration": "P730D",
                "status": "created",
            })))
            .expect(1)
            .mount(&server)
            .await;
    }
    // The middle draft collides with an existing relationship name.
    Mock::given(method("POST"))
        .and(path("/v1/delegatedAdminRelationships/migrate"))
        .and(body_partial_json(json!({"displayName": "Bravo_GDAP"})))
        .respond_with(ResponseTemplate::new(409).set_body_string("name already exists"))
        .expect(1)
        .mount(&server)
        .await;

    let submitted = RelationshipSynchronizer::new(&ctx)
        .create(&YesPrompter)
        .await
        .unwrap();
    assert!(submitted);

    let state: Vec<Relationship> = ctx
        .store
        .read(&ctx.workspace.relationship_file(&ctx.store))
        .unwrap();
    assert_eq!(state.len(), 3);

    let bravo = state
        .iter()
        .find(|r| r.display_name == "Bravo_GDAP")
        .expect("rejected draft must still be persisted");
    assert!(bravo.is_create_failure());
    assert_eq!(bravo.customer.tenant_id, "c-bravo");
    assert_eq!(bravo.duration, "P730D");
    assert!(bravo.status.is_none());

    let created: Vec<&Relationship> = state.iter().filter(|r| !r.is_create_failure()).collect();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|r| r.status == Some(RelationshipStatus::Created)));
}

#[tokio::test]
async fn refresh_polls_only_approved_records_and_marks_faults() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, dir.path().to_path_buf());

    let state = vec![
        Relationship {
            id: "rel-1".to_string(),
            display_name: "Alpha_GDAP".to_string(),
            status: Some(RelationshipStatus::Approved),
            ..Default::default()
        },
        Relationship {
            id: "rel-2".to_string(),
            display_name: "Bravo_GDAP".to_string(),
            status: Some(RelationshipStatus::Active),
            ..Default::default()
        },
        Relationship {
            id: "rel-3".to_string(),
            display_name: "Charlie_GDAP".to_string(),
            status: Some(RelationshipStatus::Created),
            ..Default::default()
        },
        Relationship {
            id: "rel-4".to_string(),
            display_name: "Delta_GDAP".to_string(),
            status: Some(RelationshipStatus::Approved),
            ..Default::default()
        },
    ];
    ctx.store
        .write(&ctx.workspace.relationship_file(&ctx.store), &state)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/delegatedAdminRelationships/rel-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rel-1",
            "displayName": "Alpha_GDAP",
            "status": "active",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/delegatedAdminRelationships/rel-4"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    RelationshipSynchronizer::new(&ctx).refresh().await.unwrap();

    let merged: Vec<Relationship> = ctx
        .store
        .read(&ctx.workspace.relationship_file(&ctx.store))
        .unwrap();
    assert_eq!(merged.len(), 4);

    let by_id = |id: &str| merged.iter().find(|r| r.id == id).unwrap();
    assert_eq!(by_id("rel-1").status, Some(RelationshipStatus::Active));
    // Settled records pass through untouched.
    assert_eq!(by_id("rel-2").status, Some(RelationshipStatus::Active));
    assert_eq!(by_id("rel-2").display_name, "Bravo_GDAP");
    assert_eq!(by_id("rel-3").status, Some(RelationshipStatus::Created));
    // A failed poll keeps the record's identity and carries the marker.
    assert_eq!(by_id("rel-4").status, Some(RelationshipStatus::Errored));
    assert_eq!(by_id("rel-4").display_name, "Delta_GDAP");
}

#[tokio::test]
async fn refresh_workers_reacquire_an_expiring_credential_per_call() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let acquirer = Arc::new(ShortLivedAcquirer {
        calls: AtomicUsize::new(0),
    });
    let mut ctx = context(&server, dir.path().to_path_buf());
    ctx.credentials = Arc::new(CredentialCache::new(acquirer.clone()));

    let state: Vec<Relationship> = (1..=3)
        .map(|n| Relationship {
            id: format!("rel-{n}"),
            display_name: format!("Org{n}_GDAP"),
            status: Some(RelationshipStatus::Approved),
            ..Default::default()
        })
        .collect();
    ctx.store
        .write(&ctx.workspace.relationship_file(&ctx.store), &state)
        .unwrap();

    for n in 1..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/v1/delegatedAdminRelationships/rel-{n}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": format!("rel-{n}"),
                "status": "active",
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    RelationshipSynchronizer::new(&ctx).refresh().await.unwrap();

    // A one-minute lifetime never clears the freshness margin, so each of
    // the three polls must go back to the acquirer instead of reusing a
    // token captured before the fan-out.
    let acquisitions = acquirer.calls.load(Ordering::SeqCst);
    assert!(acquisitions >= 3, "expected at least 3 acquisitions, got {acquisitions}");

    let merged: Vec<Relationship> = ctx
        .store
        .read(&ctx.workspace.relationship_file(&ctx.store))
        .unwrap();
    assert!(merged.iter().all(|r| r.status == Some(RelationshipStatus::Active)));
}

#[tokio::test]
async fn errored_records_are_repolled_on_the_next_refresh() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, dir.path().to_path_buf());

    let state = vec![Relationship {
        id: "rel-err".to_string(),
        display_name: "Echo_GDAP".to_string(),
        status: Some(RelationshipStatus::Errored),
        ..Default::default()
    }];
    ctx.store
        .write(&ctx.workspace.relationship_file(&ctx.store), &state)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/delegatedAdminRelationships/rel-err"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rel-err",
            "displayName": "Echo_GDAP",
            "status": "active",
        })))
        .expect(1)
        .mount(&server)
        .await;

    RelationshipSynchronizer::new(&ctx).refresh().await.unwrap();

    let merged: Vec<Relationship> = ctx
        .store
        .read(&ctx.workspace.relationship_file(&ctx.store))
        .unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].status, Some(RelationshipStatus::Active));
}

#[tokio::test]
async fn create_refuses_an_empty_customer_list() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, dir.path().to_path_buf());

    let err = RelationshipSynchronizer::new(&ctx)
        .create(&YesPrompter)
        .await
        .expect_err("create must fail without customers");
    let message = err.to_string();
    assert!(message.contains("no customers found"), "got: {message}");
}

#[tokio::test]
async fn enumerate_snapshots_the_whole_collection() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, dir.path().to_path_buf());

    Mock::given(method("GET"))
        .and(path("/v1/delegatedAdminRelationships"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 2,
            "value": [
                {"id": "rel-1", "displayName": "Alpha_GDAP", "status": "active"},
                {"id": "rel-2", "displayName": "Bravo_GDAP", "status": "terminated"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    RelationshipSynchronizer::new(&ctx).enumerate().await.unwrap();

    let snapshot: Vec<Relationship> = ctx
        .store
        .read(&ctx.workspace.relationship_snapshot_file(&ctx.store))
        .unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].status, Some(RelationshipStatus::Terminated));
}
