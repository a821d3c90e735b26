//! Integration tests for the paginated full sync.
//!
//! Drives the orchestrator against a mocked provider API, covering the
//! page-walk termination shapes, the pull request marker filter and the
//! advisory sync lock.

use std::sync::Arc;

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repomirror::config::AppConfig;
use repomirror::models::{issue, pull_request, repo};
use repomirror::provider::{GitHubProvider, ProviderApi};
use repomirror::repositories::RepoRepository;
use repomirror::sync::{FullSyncOrchestrator, SyncFailure};

async fn setup_db() -> DatabaseConnection {
    let db = sea_orm::Database::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None).await.expect("Failed to migrate");
    db
}

async fn insert_repo(db: &DatabaseConnection) -> repo::Model {
    let now = Utc::now();
    repo::ActiveModel {
        id: Set(Uuid::new_v4()),
        remote_id: Set(100),
        owner: Set("octocat".to_string()),
        name: Set("demo".to_string()),
        default_branch: Set("main".to_string()),
        sync_enabled: Set(true),
        sync_status: Set(repo::SYNC_STATUS_IDLE.to_string()),
        last_synced_at: Set(None),
        webhook_id: Set(None),
        webhook_secret: Set(Some("s3cret".to_string())),
        access_token: Set(Some("t0ken".to_string())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert repo")
}

fn orchestrator(server_uri: &str, db: &DatabaseConnection, page_size: u32) -> FullSyncOrchestrator {
    let config = Arc::new(AppConfig {
        provider_api_base: server_uri.to_string(),
        sync_page_size: page_size,
        ..AppConfig::default()
    });
    let provider: Arc<dyn ProviderApi> = Arc::new(GitHubProvider::new(&config));
    FullSyncOrchestrator::new(db.clone(), provider, config)
}

fn issue_json(number: i64) -> serde_json::Value {
    json!({
        "id": number * 1000,
        "node_id": format!("I_{}", number),
        "number": number,
        "title": format!("issue {}", number),
        "state": "open",
        "user": {"id": 1, "login": "octocat"},
        "labels": [],
        "html_url": format!("https://example.test/issues/{}", number)
    })
}

fn pull_marker_json(number: i64) -> serde_json::Value {
    let mut value = issue_json(number);
    value["pull_request"] = json!({"url": format!("https://example.test/pulls/{}", number)});
    value
}

fn pull_json(number: i64, state: &str) -> serde_json::Value {
    json!({
        "id": number * 1000,
        "node_id": format!("PR_{}", number),
        "number": number,
        "title": format!("pull {}", number),
        "state": state,
        "merged_at": null,
        "user": {"id": 1, "login": "octocat"},
        "head": {"ref": "feature"},
        "base": {"ref": "main"},
        "html_url": format!("https://example.test/pulls/{}", number)
    })
}

fn page_of_issues(range: std::ops::Range<i64>) -> serde_json::Value {
    json!(range.map(issue_json).collect::<Vec<_>>())
}

async fn mount_issue_page(server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/issues"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_pull_page(server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/pulls"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_sync_walks_pages_until_short_page() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    // 100, 100, then 50: three pages, the short page terminates the walk.
    mount_issue_page(&server, 1, page_of_issues(1..101)).await;
    mount_issue_page(&server, 2, page_of_issues(101..201)).await;
    mount_issue_page(&server, 3, page_of_issues(201..251)).await;
    mount_pull_page(&server, 1, json!([])).await;

    let report = orchestrator(&server.uri(), &db, 100)
        .run(repo.id)
        .await
        .unwrap();

    assert_eq!(report.issues, 250);
    assert_eq!(report.pull_requests, 0);
    assert_eq!(issue::Entity::find().count(&db).await.unwrap(), 250);

    let reloaded = repo::Entity::find_by_id(repo.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.sync_status, repo::SYNC_STATUS_IDLE);
    assert!(reloaded.last_synced_at.is_some());
}

#[tokio::test]
async fn test_full_sync_handles_exact_page_boundary() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    // Exactly one full page followed by an empty page.
    mount_issue_page(&server, 1, page_of_issues(1..101)).await;
    mount_issue_page(&server, 2, json!([])).await;
    mount_pull_page(&server, 1, json!([])).await;

    let report = orchestrator(&server.uri(), &db, 100)
        .run(repo.id)
        .await
        .unwrap();

    assert_eq!(report.issues, 100);
    assert_eq!(issue::Entity::find().count(&db).await.unwrap(), 100);
}

#[tokio::test]
async fn test_full_sync_filters_interleaved_pull_requests() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    mount_issue_page(
        &server,
        1,
        json!([issue_json(1), pull_marker_json(2), issue_json(3)]),
    )
    .await;
    mount_pull_page(&server, 1, json!([pull_json(2, "open")])).await;

    let report = orchestrator(&server.uri(), &db, 100)
        .run(repo.id)
        .await
        .unwrap();

    assert_eq!(report.issues, 2);
    assert_eq!(report.pull_requests, 1);
    assert_eq!(issue::Entity::find().count(&db).await.unwrap(), 2);
    assert_eq!(pull_request::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_full_sync_is_idempotent_across_runs() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    mount_issue_page(&server, 1, json!([issue_json(1), issue_json(2)])).await;
    mount_pull_page(&server, 1, json!([])).await;

    let orchestrator = orchestrator(&server.uri(), &db, 100);
    orchestrator.run(repo.id).await.unwrap();
    orchestrator.run(repo.id).await.unwrap();

    assert_eq!(issue::Entity::find().count(&db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_sync_is_rejected_by_the_lock() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    // Another sync already holds the claim.
    assert!(RepoRepository::new(&db).begin_sync(repo.id).await.unwrap());

    let result = orchestrator(&server.uri(), &db, 100).run(repo.id).await;
    assert!(matches!(result, Err(SyncFailure::AlreadySyncing)));
}

#[tokio::test]
async fn test_provider_failure_marks_repo_errored() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/issues"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = orchestrator(&server.uri(), &db, 100).run(repo.id).await;
    assert!(matches!(result, Err(SyncFailure::Provider(_))));

    let reloaded = repo::Entity::find_by_id(repo.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.sync_status, repo::SYNC_STATUS_ERROR);

    // The errored repo can be claimed again.
    assert!(RepoRepository::new(&db).begin_sync(repo.id).await.unwrap());
}

#[tokio::test]
async fn test_sync_disabled_repo_is_refused() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = insert_repo(&db).await;

    let mut active: repo::ActiveModel = repo.clone().into();
    active.sync_enabled = Set(false);
    active.update(&db).await.unwrap();

    let result = orchestrator(&server.uri(), &db, 100).run(repo.id).await;
    assert!(matches!(result, Err(SyncFailure::SyncDisabled)));
}
