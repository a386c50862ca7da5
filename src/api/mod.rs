//! REST API layer: route handlers, DTOs, and OpenAPI document.
//!
//! Resource endpoints are mounted under `/api/v1`; the health check lives
//! at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;

/// Upper bound on a single REST request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "bandroom-gateway",
        description = "Room-scoped real-time broadcast for band and rehearsal scheduling"
    ),
    paths(
        handlers::system::health_handler,
        handlers::rooms::list_rooms,
        handlers::rooms::get_room,
        handlers::rooms::publish_event,
    ),
    components(schemas(crate::error::ErrorResponse, crate::error::ErrorBody)),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Service health"),
        (name = "Rooms", description = "Room introspection and event publishing"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer scheme used by the publish endpoint.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
