//! Membership API served by every running engine.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/v1/members` | List members ordered by ID |
//! | POST | `/v1/members` | Add a member (`{"peer_urls": [...]}`) |
//! | DELETE | `/v1/members/{id}` | Remove a member |
//! | GET | `/health` | Liveness and member count |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use tracing::{info, warn};

use quorum_core::{AddMemberRequest, ApiResponse};

use crate::error::EngineError;
use crate::store::MemberStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MemberStore,
    /// Name of the node serving the API.
    pub name: String,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/members", get(list_members).post(add_member))
        .route("/v1/members/{id}", delete(remove_member))
        .route("/health", get(health))
        .with_state(state)
}

fn error_response(msg: &str, status: StatusCode) -> axum::response::Response {
    (status, Json(ApiResponse::<()>::err(msg))).into_response()
}

fn engine_error_response(e: &EngineError) -> axum::response::Response {
    let status = match e {
        EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

/// GET /v1/members
async fn list_members(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_members() {
        Ok(members) => Json(ApiResponse::ok(members)).into_response(),
        Err(e) => engine_error_response(&e),
    }
}

/// POST /v1/members
async fn add_member(
    State(state): State<ApiState>,
    payload: Result<Json<AddMemberRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST);
        }
    };

    match state.store.add_member(req.peer_urls) {
        Ok(member) => {
            info!(member_id = member.id, name = %member.name, "member added via API");
            (StatusCode::CREATED, Json(ApiResponse::ok(member))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "add member rejected");
            engine_error_response(&e)
        }
    }
}

/// DELETE /v1/members/{id}
async fn remove_member(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.store.remove_member(id) {
        Ok(member) => {
            info!(member_id = id, name = %member.name, "member removed via API");
            Json(ApiResponse::ok(member)).into_response()
        }
        Err(e) => engine_error_response(&e),
    }
}

/// GET /health
async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_members() {
        Ok(members) => Json(ApiResponse::ok(serde_json::json!({
            "name": state.name,
            "members": members.len(),
        })))
        .into_response(),
        Err(e) => engine_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use quorum_core::Member;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn test_router() -> (Router, MemberStore) {
        let store = MemberStore::open_in_memory().unwrap();
        let router = build_router(ApiState {
            store: store.clone(),
            name: "localhost:2380".to_string(),
        });
        (router, store)
    }

    async fn call<T: DeserializeOwned>(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, ApiResponse<T>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Body::from(body.unwrap_or_default().to_string()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn add_then_list() {
        let (router, _store) = test_router();

        let (status, resp) = call::<Member>(
            &router,
            Method::POST,
            "/v1/members",
            Some(r#"{"peer_urls":["http://10.0.0.1:2380"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let added = resp.data.unwrap();
        assert_eq!(added.name, "10.0.0.1:2380");

        let (status, resp) = call::<Vec<Member>>(&router, Method::GET, "/v1/members", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(resp.success);
        assert_eq!(resp.data.unwrap(), vec![added]);
    }

    #[tokio::test]
    async fn duplicate_peer_url_conflicts() {
        let (router, store) = test_router();
        store
            .add_member(vec!["http://10.0.0.1:2380".to_string()])
            .unwrap();

        let (status, resp) = call::<Member>(
            &router,
            Method::POST,
            "/v1/members",
            Some(r#"{"peer_urls":["http://10.0.0.1:2380"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("10.0.0.1:2380"));
    }

    #[tokio::test]
    async fn malformed_add_is_bad_request() {
        let (router, _store) = test_router();

        let (status, _) =
            call::<Member>(&router, Method::POST, "/v1/members", Some(r#"{"peer":1}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call::<Member>(
            &router,
            Method::POST,
            "/v1/members",
            Some(r#"{"peer_urls":[]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_known_and_unknown() {
        let (router, store) = test_router();
        let member = store
            .add_member(vec!["http://10.0.0.1:2380".to_string()])
            .unwrap();

        let (status, resp) = call::<Member>(
            &router,
            Method::DELETE,
            &format!("/v1/members/{}", member.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.data.unwrap(), member);

        let (status, resp) = call::<Member>(
            &router,
            Method::DELETE,
            &format!("/v1/members/{}", member.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn health_reports_member_count() {
        let (router, store) = test_router();
        store
            .add_member(vec!["http://10.0.0.1:2380".to_string()])
            .unwrap();

        let (status, resp) =
            call::<serde_json::Value>(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let data = resp.data.unwrap();
        assert_eq!(data["members"], 1);
        assert_eq!(data["name"], "localhost:2380");
    }
}
