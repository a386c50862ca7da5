//! Room handlers: introspection and the HTTP producer endpoint.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    PublishEventRequest, PublishEventResponse, RoomDetailResponse, RoomListResponse,
    RoomMemberDto, RoomSummaryDto,
};
use crate::app_state::AppState;
use crate::auth::bearer_token;
use crate::domain::{RoomId, RoomKind};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /rooms` — List every non-empty room.
///
/// # Errors
///
/// Infallible in practice; returns [`GatewayError`] for signature symmetry
/// with the other handlers.
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    summary = "List rooms",
    description = "Returns every room that currently has at least one member, with its member count.",
    responses(
        (status = 200, description = "Room list", body = RoomListResponse),
    )
)]
pub async fn list_rooms(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let data: Vec<RoomSummaryDto> = state
        .realtime
        .room_summaries()
        .await
        .into_iter()
        .map(RoomSummaryDto::from)
        .collect();
    let total = data.len();
    Ok(Json(RoomListResponse { data, total }))
}

/// `GET /rooms/{kind}/{room_id}` — Members of one room.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRoom`] for a malformed id and
/// [`GatewayError::RoomNotFound`] if the room has no members.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{kind}/{room_id}",
    tag = "Rooms",
    summary = "Get room members",
    description = "Returns a point-in-time snapshot of the connections subscribed to the room.",
    params(
        ("kind" = RoomKind, Path, description = "Room kind"),
        ("room_id" = String, Path, description = "Room id within the kind"),
    ),
    responses(
        (status = 200, description = "Room members", body = RoomDetailResponse),
        (status = 400, description = "Invalid room", body = ErrorResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path((kind, room_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, GatewayError> {
    let room = RoomId::new(kind.parse()?, room_id)?;
    let members = state
        .realtime
        .room_members(&room)
        .await?
        .into_iter()
        .map(|conn| RoomMemberDto {
            connection_id: *conn.id().as_uuid(),
            user_id: conn.identity().user_id.clone(),
            connected_at: conn.connected_at(),
        })
        .collect();

    Ok(Json(RoomDetailResponse {
        room: room.to_string(),
        members,
    }))
}

/// `POST /rooms/{kind}/{room_id}/events` — Publish an event to a room.
///
/// Used by scheduling components running outside this process after they
/// commit a mutation. In-process callers use
/// [`crate::service::RealtimeService::publish`] directly.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] if a publish token is
/// configured and not presented, and [`GatewayError::InvalidRoom`] for a
/// malformed id.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{kind}/{room_id}/events",
    tag = "Rooms",
    summary = "Publish an event",
    description = "Fans the event out to every current member of the room. Members whose outbound queue is full miss the event; nothing is stored or retried.",
    params(
        ("kind" = RoomKind, Path, description = "Room kind"),
        ("room_id" = String, Path, description = "Room id within the kind"),
    ),
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Event dispatched", body = PublishEventResponse),
        (status = 400, description = "Invalid room or body", body = ErrorResponse),
        (status = 401, description = "Missing or wrong publish token", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Path((kind, room_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if let Some(expected) = state.publish_token.as_deref()
        && bearer_token(&headers).as_deref() != Some(expected)
    {
        return Err(GatewayError::Unauthenticated(
            "publish token required".to_string(),
        ));
    }

    let room = RoomId::new(kind.parse()?, room_id)?;
    let report = state
        .realtime
        .publish(room.clone(), req.event, req.data)
        .await;

    tracing::info!(
        %room,
        event = req.event.as_str(),
        delivered = report.delivered,
        dropped = report.dropped,
        "event published over http"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            room: room.to_string(),
            delivered: report.delivered,
            dropped: report.dropped,
        }),
    ))
}

/// Room routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{kind}/{room_id}", get(get_room))
        .route("/rooms/{kind}/{room_id}/events", post(publish_event))
}
