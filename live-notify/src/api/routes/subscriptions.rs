//! Subscribe / unsubscribe routes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::monitor::RoomId;
use crate::subscription::{SubscribeOutcome, UnsubscribeOutcome};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub session_id: String,
    pub room_id: RoomId,
    #[serde(default)]
    pub anchor_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub session_id: String,
    pub room_id: RoomId,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse<T> {
    pub outcome: T,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(subscribe).delete(unsubscribe))
}

async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<OutcomeResponse<SubscribeOutcome>>)> {
    let outcome = state
        .services
        .subscribe(
            &request.session_id,
            &request.room_id,
            request.anchor_name.as_deref(),
        )
        .await?;

    let status = match outcome {
        SubscribeOutcome::Added => StatusCode::CREATED,
        SubscribeOutcome::AlreadySubscribed => StatusCode::OK,
    };
    Ok((status, Json(OutcomeResponse { outcome })))
}

async fn unsubscribe(
    State(state): State<AppState>,
    Json(request): Json<UnsubscribeRequest>,
) -> ApiResult<Json<OutcomeResponse<UnsubscribeOutcome>>> {
    let outcome = state
        .services
        .unsubscribe(&request.session_id, &request.room_id)
        .await?;

    match outcome {
        UnsubscribeOutcome::Removed => Ok(Json(OutcomeResponse { outcome })),
        UnsubscribeOutcome::NotFound => Err(ApiError::not_found(format!(
            "session '{}' is not subscribed to room '{}'",
            request.session_id, request.room_id
        ))),
    }
}
