//! Cleanup Control-Surface Handlers
//!
//! Operator endpoints over the cleanup scheduler: status, configuration,
//! forced runs, and targeted session deletion. A forced run that deletes
//! only some of the expired sessions is still a success with accurate
//! counts; only total unavailability of the backing store surfaces as an
//! error response.

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};

use crate::cleanup::{CleanupConfigView, CleanupRun, CleanupStatus};
use crate::protocol::rest::dto::{ApiResponse, SessionDeletedDto};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Cleanup service status
pub async fn status(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<CleanupStatus>>, RestError> {
    Ok(Json(ApiResponse::success(handler.scheduler().status())))
}

/// Cleanup configuration view
pub async fn config(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<CleanupConfigView>>, RestError> {
    Ok(Json(ApiResponse::success(
        handler.scheduler().config_view(),
    )))
}

/// Trigger one deletion pass out-of-band and return its record
pub async fn force(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<CleanupRun>>, RestError> {
    let run = handler.scheduler().force_run().await?;
    Ok(Json(ApiResponse::success(run)))
}

/// Delete one session immediately, regardless of expiry
pub async fn delete_session(
    Extension(handler): Extension<Arc<Handler>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionDeletedDto>>, RestError> {
    handler.scheduler().delete_session(&session_id)?;
    Ok(Json(ApiResponse::success(SessionDeletedDto {
        session_id,
        deleted: true,
    })))
}
