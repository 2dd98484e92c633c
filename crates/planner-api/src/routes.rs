use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use planner_core::db::SqliteDocumentStore;
use planner_core::sync::{self, PullRequest, PushEdit};
use planner_core::{Collection, Folder, Item, PlannerData, Schema, Semester, SyncLimits};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: SqliteDocumentStore,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, store: SqliteDocumentStore) -> Self {
        Self { config, store }
    }
}

pub fn app_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/{collection}/pull", get(pull_collection))
        .route("/{collection}/push", post(push_collection))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    collections: Vec<&'static str>,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        collections: Collection::ALL.iter().map(|c| c.as_str()).collect(),
    })
}

async fn pull_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let collection: Collection = collection.parse()?;
    let request = PullRequest::from_query(collection, &params)?;
    let store = state.store.clone();
    let limits = state.config.limits;

    run_blocking(move || match collection {
        Collection::Folders => pull_as::<Folder>(&store, &request, &limits),
        Collection::Items => pull_as::<Item>(&store, &request, &limits),
        Collection::PlannerData => pull_as::<PlannerData>(&store, &request, &limits),
        Collection::Semesters => pull_as::<Semester>(&store, &request, &limits),
    })
    .await
}

async fn push_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let collection: Collection = collection.parse()?;
    let store = state.store.clone();
    let limits = state.config.limits;
    let cancelled = Arc::new(AtomicBool::new(false));
    let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancelled));

    run_blocking(move || match collection {
        Collection::Folders => push_as::<Folder>(&store, &body, &limits, &cancelled),
        Collection::Items => push_as::<Item>(&store, &body, &limits, &cancelled),
        Collection::PlannerData => push_as::<PlannerData>(&store, &body, &limits, &cancelled),
        Collection::Semesters => push_as::<Semester>(&store, &body, &limits, &cancelled),
    })
    .await
}

/// Raises the flag when the handler future is dropped, e.g. on request
/// timeout or client disconnect, so the blocking push stops between edits.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

fn pull_as<T: Schema>(
    store: &SqliteDocumentStore,
    request: &PullRequest,
    limits: &SyncLimits,
) -> Result<Response, AppError> {
    let response = sync::pull::<T, _>(store, request, limits)?;
    Ok(Json(response).into_response())
}

fn push_as<T: Schema>(
    store: &SqliteDocumentStore,
    body: &[u8],
    limits: &SyncLimits,
    cancelled: &AtomicBool,
) -> Result<Response, AppError> {
    // Parsed by hand so malformed bodies answer 400 rather than axum's 422
    let edits: Vec<PushEdit<T>> = serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("malformed push body: {err}")))?;
    let results = sync::push_cancellable(store, &edits, limits, cancelled)?;
    Ok(Json(results).into_response())
}

/// Store calls block on `SQLite`; keep them off the async workers.
async fn run_blocking<F>(task: F) -> Result<Response, AppError>
where
    F: FnOnce() -> Result<Response, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::internal(format!("sync task failed: {err}")))?
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use planner_core::db::{Database, DocumentStore};
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    struct TestApp {
        base_url: String,
        client: reqwest::Client,
        store: SqliteDocumentStore,
        _tmp: TempDir,
    }

    impl TestApp {
        async fn spawn(limits: SyncLimits) -> Self {
            Self::spawn_with_timeout(limits, Duration::from_secs(30)).await
        }

        async fn spawn_with_timeout(limits: SyncLimits, request_timeout: Duration) -> Self {
            let tmp = tempdir().unwrap();
            let database_path = tmp.path().join("planner.db");
            let db = Database::open(&database_path).unwrap();
            let config = AppConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                database_path,
                db_busy_timeout: Duration::from_secs(5),
                request_timeout,
                limits,
            };
            let store = SqliteDocumentStore::new(db);
            let state = AppState::new(Arc::new(config), store.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app_router(state)).await.unwrap();
            });

            Self {
                base_url: format!("http://{addr}"),
                client: reqwest::Client::new(),
                store,
                _tmp: tmp,
            }
        }

        fn stored_folders(&self) -> usize {
            self.store.query_after::<Folder>(None, 10_000).unwrap().len()
        }

        async fn pull(&self, collection: &str, query: &[(&str, &str)]) -> (StatusCode, Value) {
            let response = self
                .client
                .get(format!("{}/{collection}/pull", self.base_url))
                .query(query)
                .send()
                .await
                .unwrap();
            (response.status(), response.json().await.unwrap())
        }

        async fn push_raw(&self, collection: &str, body: String) -> (StatusCode, Value) {
            let response = self
                .client
                .post(format!("{}/{collection}/push", self.base_url))
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await
                .unwrap();
            (response.status(), response.json().await.unwrap())
        }

        async fn push(&self, collection: &str, edits: Value) -> (StatusCode, Value) {
            self.push_raw(collection, edits.to_string()).await
        }
    }

    fn year_one() -> Value {
        json!({"id": "f1", "title": "Year 1", "order": 0, "_deleted": false})
    }

    #[tokio::test]
    async fn healthz_lists_collections() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        let response = app
            .client
            .get(format!("{}/healthz", app.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(
            body["collections"],
            json!(["folders", "items", "plannerdata", "semesters"])
        );
    }

    #[tokio::test]
    async fn create_pull_then_conflict_on_folders() {
        let app = TestApp::spawn(SyncLimits::default()).await;

        let (status, created) = app.push("folders", json!([{"newDocumentState": year_one()}])).await;
        assert_eq!(status, StatusCode::OK);
        let stored = created[0].clone();
        assert_eq!(stored["title"], "Year 1");
        let t1 = stored["serverTimestamp"].as_str().unwrap().to_string();

        let (status, pulled) = app.pull("folders", &[("batchSize", "10")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pulled["checkpoint"], json!({"id": "f1", "serverTimestamp": t1}));
        assert_eq!(pulled["documents"], json!([stored.clone()]));

        let (status, conflict) = app.push("folders", json!([{"newDocumentState": year_one()}])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conflict, json!([stored]));

        let (_, caught_up) = app
            .pull("folders", &[("id", "f1"), ("serverTimestamp", t1.as_str())])
            .await;
        assert_eq!(caught_up["documents"], json!([]));
        assert_eq!(caught_up["checkpoint"], json!({"id": "f1", "serverTimestamp": t1}));
    }

    #[tokio::test]
    async fn update_and_delete_flow_through_pull() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        let (_, created) = app.push("folders", json!([{"newDocumentState": year_one()}])).await;
        let (_, first_pull) = app.pull("folders", &[]).await;
        let checkpoint = first_pull["checkpoint"].clone();

        let mut deleted = year_one();
        deleted["_deleted"] = json!(true);
        let (status, answer) = app
            .push(
                "folders",
                json!([{"newDocumentState": deleted, "assumedMasterState": created[0]}]),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer[0]["_deleted"], json!(true));

        let (_, next) = app
            .pull(
                "folders",
                &[
                    ("id", checkpoint["id"].as_str().unwrap()),
                    ("serverTimestamp", checkpoint["serverTimestamp"].as_str().unwrap()),
                ],
            )
            .await;
        assert_eq!(next["documents"], json!([answer[0].clone()]));
    }

    #[tokio::test]
    async fn assumed_missing_document_answers_null() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        let (status, answer) = app
            .push(
                "folders",
                json!([{"newDocumentState": year_one(), "assumedMasterState": year_one()}]),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer, json!([null]));
    }

    #[tokio::test]
    async fn items_checkpoint_uses_uuid_key() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        let key = uuid::Uuid::new_v4().to_string();
        let item = json!({
            "uuid": key,
            "folderId": "f1",
            "courseCode": "MATH 221",
            "title": "Linear Algebra",
            "credits": 3.0,
            "_deleted": false
        });
        let (status, _) = app.push("items", json!([{"newDocumentState": item}])).await;
        assert_eq!(status, StatusCode::OK);

        let (_, pulled) = app.pull("items", &[]).await;
        assert_eq!(pulled["checkpoint"]["uuid"], json!(key));
        assert!(pulled["checkpoint"].get("id").is_none());
    }

    #[tokio::test]
    async fn unknown_collection_is_bad_request() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        let (status, body) = app.pull("notes", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("notes"));

        let (status, _) = app.push("notes", json!([])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_checkpoint_is_bad_request() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        let (status, _) = app
            .pull("folders", &[("id", "f1"), ("serverTimestamp", "soon")])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.pull("folders", &[("id", "f1")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.pull("folders", &[("batchSize", "many")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_push_bodies_are_bad_request() {
        let app = TestApp::spawn(SyncLimits::default()).await;

        let (status, _) = app.push_raw("folders", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing_deleted = json!([{"newDocumentState": {"id": "f1", "title": "Year 1"}}]);
        let (status, _) = app.push("folders", missing_deleted).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut extra = year_one();
        extra["sharedWith"] = json!(["someone"]);
        let (status, _) = app.push("folders", json!([{"newDocumentState": extra}])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, pulled) = app.pull("folders", &[]).await;
        assert_eq!(pulled["documents"], json!([]));
    }

    #[tokio::test]
    async fn oversized_push_batch_is_rejected() {
        let limits = SyncLimits {
            max_push_batch: 1,
            ..SyncLimits::default()
        };
        let app = TestApp::spawn(limits).await;
        let mut second = year_one();
        second["id"] = json!("f2");

        let (status, _) = app
            .push(
                "folders",
                json!([{"newDocumentState": year_one()}, {"newDocumentState": second}]),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, pulled) = app.pull("folders", &[]).await;
        assert_eq!(pulled["documents"], json!([]));
    }

    #[tokio::test]
    async fn pull_batch_size_is_capped() {
        let limits = SyncLimits {
            default_pull_batch: 2,
            max_pull_batch: 3,
            max_push_batch: 10,
        };
        let app = TestApp::spawn(limits).await;
        let edits: Vec<Value> = (0..5)
            .map(|n| {
                json!({"newDocumentState": {"id": format!("f{n}"), "title": "t", "_deleted": false}})
            })
            .collect();
        let (status, _) = app.push("folders", Value::Array(edits)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, capped) = app.pull("folders", &[("batchSize", "50")]).await;
        assert_eq!(capped["documents"].as_array().unwrap().len(), 3);

        let (_, defaulted) = app.pull("folders", &[]).await;
        assert_eq!(defaulted["documents"].as_array().unwrap().len(), 2);
    }

    /// Create, pull from scratch, update, then push a stale edit.
    async fn assert_replicates(app: &TestApp, collection: &str, created: Value, renamed: Value) {
        let key = created["id"].clone();

        let (status, answer) = app.push(collection, json!([{"newDocumentState": created}])).await;
        assert_eq!(status, StatusCode::OK);
        let v1 = answer[0].clone();

        let (status, pulled) = app.pull(collection, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            pulled["checkpoint"],
            json!({"id": key, "serverTimestamp": v1["serverTimestamp"]})
        );
        assert_eq!(pulled["documents"], json!([v1.clone()]));

        let (_, answer) = app
            .push(
                collection,
                json!([{"newDocumentState": renamed, "assumedMasterState": v1}]),
            )
            .await;
        let v2 = answer[0].clone();
        assert_ne!(v2["serverTimestamp"], v1["serverTimestamp"]);

        let (status, conflict) = app
            .push(
                collection,
                json!([{"newDocumentState": created, "assumedMasterState": v1}]),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conflict, json!([v2]));
    }

    #[tokio::test]
    async fn plannerdata_replicates_and_conflicts() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        assert_replicates(
            &app,
            "plannerdata",
            json!({"id": "main", "degree": "BSc Computer Science", "startYear": 2024, "_deleted": false}),
            json!({"id": "main", "degree": "BSc Mathematics", "startYear": 2024, "_deleted": false}),
        )
        .await;
    }

    #[tokio::test]
    async fn semesters_replicate_and_conflict() {
        let app = TestApp::spawn(SyncLimits::default()).await;
        assert_replicates(
            &app,
            "semesters",
            json!({"id": "s1", "name": "Fall 2025", "term": "fall", "year": 2025, "_deleted": false}),
            json!({"id": "s1", "name": "Autumn 2025", "term": "fall", "year": 2025, "_deleted": false}),
        )
        .await;
    }

    #[tokio::test]
    async fn timed_out_push_stops_writing() {
        let limits = SyncLimits {
            default_pull_batch: 100,
            max_pull_batch: 10_000,
            max_push_batch: 5_000,
        };
        let app = TestApp::spawn_with_timeout(limits, Duration::from_millis(10)).await;
        let edits: Vec<Value> = (0..2_000)
            .map(|n| {
                json!({"newDocumentState": {"id": format!("f{n:04}"), "title": "t", "_deleted": false}})
            })
            .collect();

        let response = app
            .client
            .post(format!("{}/folders/push", app.base_url))
            .header("content-type", "application/json")
            .body(Value::Array(edits).to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let settled = app.stored_folders();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(app.stored_folders(), settled);
        assert!(settled < 2_000);
    }
}
