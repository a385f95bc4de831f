//! Room status routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::monitor::{RoomId, SessionId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(query_all))
        .route("/{room_id}", get(query_room))
        .route("/{room_id}/subscribers", get(list_subscribers))
}

/// Plain-text status of every monitored room.
async fn query_all(State(state): State<AppState>) -> ApiResult<String> {
    Ok(state.services.query_info(None).await?)
}

async fn query_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<String> {
    Ok(state.services.query_info(Some(&RoomId::new(room_id))).await?)
}

async fn list_subscribers(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Vec<SessionId>>> {
    Ok(Json(
        state.services.list_subscribers(&RoomId::new(room_id)).await?,
    ))
}
