//! REST endpoints for survey sessions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::SurveyError;

use super::machine::SystemReaction;
use super::manager::SessionManager;

/// Shared state for survey routes.
#[derive(Clone)]
pub struct SurveyRouteState {
    pub manager: Arc<SessionManager>,
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(alias = "userName")]
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct FeedbackRequest {
    #[serde(default)]
    feedback: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Only session lookup failures surface as errors. Inputs that do not fit
/// the session's state come back inside a no-op reaction instead.
fn survey_error_response(err: &SurveyError) -> Response {
    let status = match err {
        SurveyError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        SurveyError::SessionClosed => StatusCode::GONE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

/// A reaction is always 200, including a no-op one carrying `rejection`.
fn reaction_response(result: Result<SystemReaction, SurveyError>) -> Response {
    match result {
        Ok(reaction) => Json(reaction).into_response(),
        Err(e) => survey_error_response(&e),
    }
}

/// POST /api/sessions
///
/// Starts a session and returns its id plus the welcome turns.
async fn start_session(
    State(state): State<SurveyRouteState>,
    Json(body): Json<StartRequest>,
) -> Response {
    let user_name = body.user_name.trim();
    if user_name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "user_name must not be empty");
    }
    let started = state.manager.start_session(user_name).await;
    (StatusCode::CREATED, Json(started)).into_response()
}

/// GET /api/sessions/{id}
async fn get_session(State(state): State<SurveyRouteState>, Path(id): Path<Uuid>) -> Response {
    match state.manager.snapshot(id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => survey_error_response(&e),
    }
}

/// DELETE /api/sessions/{id}
async fn end_session(State(state): State<SurveyRouteState>, Path(id): Path<Uuid>) -> Response {
    match state.manager.end_session(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => survey_error_response(&e),
    }
}

/// POST /api/sessions/{id}/answer
///
/// Consent token or question answer.
async fn submit_answer(
    State(state): State<SurveyRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerRequest>,
) -> Response {
    reaction_response(state.manager.submit_primary_answer(id, &body.answer).await)
}

/// POST /api/sessions/{id}/message
async fn submit_message(
    State(state): State<SurveyRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageRequest>,
) -> Response {
    reaction_response(state.manager.submit_free_text(id, &body.text).await)
}

/// POST /api/sessions/{id}/feedback
///
/// An absent or null `feedback` skips the round.
async fn submit_feedback(
    State(state): State<SurveyRouteState>,
    Path(id): Path<Uuid>,
    body: Option<Json<FeedbackRequest>>,
) -> Response {
    let feedback = body.map(|Json(b)| b).unwrap_or_default().feedback;
    reaction_response(
        state
            .manager
            .submit_additional_feedback(id, feedback)
            .await,
    )
}

/// Build the survey REST routes.
pub fn survey_routes(state: SurveyRouteState) -> Router {
    Router::new()
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/{id}", get(get_session).delete(end_session))
        .route("/api/sessions/{id}/answer", post(submit_answer))
        .route("/api/sessions/{id}/message", post(submit_message))
        .route("/api/sessions/{id}/feedback", post(submit_feedback))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurveyConfig;
    use crate::survey::generator::OfflineGenerator;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let manager = Arc::new(SessionManager::new(
            Arc::new(OfflineGenerator),
            SurveyConfig::default(),
        ));
        survey_routes(SurveyRouteState { manager })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn start_returns_session_and_welcome_turns() {
        let app = app();
        let (status, json) = send(
            &app,
            "POST",
            "/api/sessions",
            Some(serde_json::json!({"userName": "Rahul"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(json["session_id"].is_string());
        assert_eq!(json["phase"], "consent");
        assert_eq!(json["expects"], "consent");
        assert_eq!(json["turns"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn blank_user_name_is_rejected() {
        let app = app();
        let (status, _) = send(
            &app,
            "POST",
            "/api/sessions",
            Some(serde_json::json!({"userName": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = app();
        let uri = format!("/api/sessions/{}", Uuid::new_v4());
        let (status, json) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    async fn started(app: &Router) -> String {
        let (_, json) = send(
            app,
            "POST",
            "/api/sessions",
            Some(serde_json::json!({"userName": "Rahul"})),
        )
        .await;
        json["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn invalid_consent_token_is_a_noop_reaction() {
        let app = app();
        let id = started(&app).await;

        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/sessions/{id}/answer"),
            Some(serde_json::json!({"answer": "maybe"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["turns"].as_array().unwrap().len(), 0);
        assert_eq!(json["phase"], "consent");
        assert_eq!(json["expects"], "consent");
        assert!(json["rejection"].as_str().unwrap().contains("\"maybe\""));
    }

    #[tokio::test]
    async fn feedback_outside_wrap_up_is_a_noop_reaction() {
        let app = app();
        let id = started(&app).await;

        let (status, json) = send(&app, "POST", &format!("/api/sessions/{id}/feedback"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["turns"].as_array().unwrap().len(), 0);
        assert_eq!(json["phase"], "consent");
        assert!(json["rejection"].is_string());
    }

    #[tokio::test]
    async fn message_after_decline_is_a_noop_reaction() {
        let app = app();
        let id = started(&app).await;

        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/sessions/{id}/answer"),
            Some(serde_json::json!({"answer": "declined"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["phase"], "complete");
        assert!(json.get("rejection").is_none());

        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/sessions/{id}/message"),
            Some(serde_json::json!({"text": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["turns"].as_array().unwrap().len(), 0);
        assert_eq!(json["phase"], "complete");
        assert_eq!(json["expects"], "none");
        assert_eq!(json["flags"]["awaitingFollowUp"], false);
        assert!(json["rejection"].is_string());
    }
}
