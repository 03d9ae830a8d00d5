use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activities::{Activity, ActivityPage, ActivityStats, DEFAULT_LIMIT, DEFAULT_OFFSET};
use crate::error::ActivityError;

use super::state::AppState;

const CREATED_MESSAGE: &str = "Activity created successfully and broadcasted in real-time";

/// Routes relative to the activities mount point
pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route("/stats", get(get_activity_stats))
        .route("/type/{activity_type}", get(list_activities_by_type))
        .route("/user/{user_id}", get(list_activities_by_user))
        .route("/{id}", get(get_activity))
}

/// Query parameters for the list endpoint. Numbers arrive as raw strings so
/// malformed values can fall back to their defaults instead of rejecting.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
}

/// Query parameters for the by-type and by-user endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<String>,
}

/// Response structure for successful activity creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateActivityResponse {
    pub success: bool,
    pub activity: Activity,
    pub message: String,
}

/// Parses a non-negative count, using `default` for anything missing or malformed
fn count_or_default(raw: Option<&str>, default: usize) -> usize {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(s) => s.parse::<usize>().unwrap_or_else(|_| {
            debug!("Ignoring malformed count '{}', using {}", s, default);
            default
        }),
    }
}

/// GET /api/activities?limit=50&offset=0&type=X
/// Returns a page of activities, newest first, optionally filtered by type
pub async fn list_activities(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<ActivityPage> {
    let limit = count_or_default(params.limit.as_deref(), DEFAULT_LIMIT);
    let offset = count_or_default(params.offset.as_deref(), DEFAULT_OFFSET);
    let activity_type = params.activity_type.as_deref().filter(|t| !t.is_empty());

    Json(state.store.list(activity_type, limit, offset))
}

/// GET /api/activities/{id}
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Activity>, ActivityError> {
    state.store.get(&id).map(Json)
}

/// POST /api/activities
/// Records a new activity and broadcasts it to real-time subscribers
pub async fn create_activity(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreateActivityResponse>, ActivityError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        error!("Rejected activity payload: {}", e);
        ActivityError::Internal(e.to_string())
    })?;

    let activity = state
        .store
        .create(payload)
        .inspect_err(|e| error!("Failed to create activity: {}", e))?;

    state.notifier.notify(&activity);

    Ok(Json(CreateActivityResponse {
        success: true,
        activity,
        message: CREATED_MESSAGE.to_string(),
    }))
}

/// GET /api/activities/type/{activity_type}?limit=50
/// Returns a bare array, newest first
pub async fn list_activities_by_type(
    State(state): State<AppState>,
    Path(activity_type): Path<String>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<Activity>> {
    let limit = count_or_default(params.limit.as_deref(), DEFAULT_LIMIT);
    Json(state.store.by_type(&activity_type, limit))
}

/// GET /api/activities/user/{user_id}?limit=50
/// Returns a bare array, newest first
pub async fn list_activities_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<Activity>> {
    let limit = count_or_default(params.limit.as_deref(), DEFAULT_LIMIT);
    Json(state.store.by_user(&user_id, limit))
}

/// GET /api/activities/stats
/// Counts by type over the last 24 hours
pub async fn get_activity_stats(State(state): State<AppState>) -> Json<ActivityStats> {
    Json(state.store.stats())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt; // for oneshot()

    use super::*;
    use crate::activities::ActivityStore;
    use crate::notifier::testing::RecordingNotifier;
    use crate::server::build_router;

    struct Harness {
        store: Arc<ActivityStore>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn seeded() -> Self {
            Self {
                store: Arc::new(ActivityStore::seeded()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn router(&self) -> Router {
            build_router(AppState::new(self.store.clone(), self.notifier.clone()))
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let resp = self.router().oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let req = Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            self.send(req).await
        }

        async fn post(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
            let req = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap();
            self.send(req).await
        }
    }

    fn ids(value: &Value) -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_count_or_default() {
        assert_eq!(count_or_default(None, 50), 50);
        assert_eq!(count_or_default(Some(""), 50), 50);
        assert_eq!(count_or_default(Some(" 7 "), 50), 7);
        assert_eq!(count_or_default(Some("abc"), 50), 50);
        assert_eq!(count_or_default(Some("-3"), 0), 0);
        assert_eq!(count_or_default(Some("0"), 50), 0);
    }

    #[tokio::test]
    async fn test_list_default_envelope() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body["activities"]), vec!["1", "2", "3"]);
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["limit"], json!(50));
        assert_eq!(body["offset"], json!(0));
    }

    #[tokio::test]
    async fn test_list_filtered_by_type() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities?type=ticket_updated").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body["activities"]), vec!["2"]);
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["limit"], json!(50));
        assert_eq!(body["offset"], json!(0));
        assert_eq!(body["activities"][0]["type"], json!("ticket_updated"));
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let h = Harness::seeded();
        let (_, body) = h.get("/api/activities?limit=1&offset=2").await;
        assert_eq!(ids(&body["activities"]), vec!["3"]);
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["limit"], json!(1));
        assert_eq!(body["offset"], json!(2));
    }

    #[tokio::test]
    async fn test_list_malformed_params_use_defaults() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities?limit=abc&offset=-1&type=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], json!(50));
        assert_eq!(body["offset"], json!(0));
        assert_eq!(body["total"], json!(3));
    }

    #[tokio::test]
    async fn test_get_single_activity() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], json!("ticket_created"));
        assert_eq!(body["userId"], json!("user1"));
        assert_eq!(body["metadata"], json!({ "ticketId": 1, "patientId": 1 }));
    }

    #[tokio::test]
    async fn test_get_missing_activity_is_404() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities/does-not-exist").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Activity not found" }));
    }

    #[tokio::test]
    async fn test_create_appends_and_broadcasts() {
        let h = Harness::seeded();
        let (status, body) = h
            .post(
                "/api/activities",
                r#"{"type":"call_logged","description":"x","userId":"u9","metadata":{}}"#,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!(CREATED_MESSAGE));
        let id = body["activity"]["id"].as_str().unwrap();
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(h.store.len(), 4);

        let seen = h.notifier.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, id);
        assert_eq!(serde_json::to_value(&seen[0]).unwrap(), body["activity"]);

        let (status, fetched) = h.get(&format!("/api/activities/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, body["activity"]);
    }

    #[tokio::test]
    async fn test_create_overrides_caller_id_and_timestamp() {
        let h = Harness::seeded();
        let (status, body) = h
            .post(
                "/api/activities",
                r#"{"id":"1","timestamp":"1999-01-01T00:00:00.000Z","type":"note"}"#,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["activity"]["id"], json!("1"));
        assert_ne!(
            body["activity"]["timestamp"],
            json!("1999-01-01T00:00:00.000Z")
        );

        // The seed record with id "1" is untouched
        let (_, original) = h.get("/api/activities/1").await;
        assert_eq!(original["type"], json!("ticket_created"));
    }

    #[tokio::test]
    async fn test_create_accepts_null_fields() {
        let h = Harness::seeded();
        let (status, body) = h
            .post(
                "/api/activities",
                r#"{"type":"call_logged","description":null,"userId":"u9","metadata":null}"#,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["activity"]["description"], json!(""));
        assert_eq!(body["activity"]["metadata"], json!({}));
        assert_eq!(h.store.len(), 4);
        assert_eq!(h.notifier.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_create_invalid_body_is_500() {
        let h = Harness::seeded();
        let (status, body) = h.post("/api/activities", "not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Failed to create activity"));
        assert!(!body["details"].as_str().unwrap().is_empty());
        assert_eq!(h.store.len(), 3);
        assert!(h.notifier.seen().is_empty());

        let (status, body) = h.post("/api/activities", "[1, 2]").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Failed to create activity"));
        assert_eq!(h.store.len(), 3);
    }

    #[tokio::test]
    async fn test_list_by_type_is_bare_array() {
        let h = Harness::seeded();
        h.store
            .create(json!({ "type": "call_logged", "userId": "user3" }))
            .unwrap();

        let (status, body) = h.get("/api/activities/type/call_logged").await;
        assert_eq!(status, StatusCode::OK);
        let listed = ids(&body);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1], "3");

        let (_, body) = h.get("/api/activities/type/call_logged?limit=1").await;
        assert_eq!(ids(&body).len(), 1);

        let (_, body) = h.get("/api/activities/type/unknown").await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_list_by_user() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities/user/user2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec!["2"]);

        let (_, body) = h.get("/api/activities/user/user2?limit=0").await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_stats_route_is_not_shadowed_by_id() {
        let h = Harness::seeded();
        let (status, body) = h.get("/api/activities/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["last24Hours"], json!(3));
        assert_eq!(
            body["typeCounts"],
            json!({ "ticket_created": 1, "ticket_updated": 1, "call_logged": 1 })
        );
        assert_eq!(body["mostActiveType"], json!("ticket_created"));
    }
}
