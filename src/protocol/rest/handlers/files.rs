//! File and Session Handlers
//!
//! The request path that feeds the artifact store: spreadsheet upload
//! (which creates a session), session retrieval, and attaching the
//! derived chart configuration. Chart generation itself happens in an
//! external collaborator; this layer only persists its output.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use tracing::info;

use crate::protocol::rest::dto::{
    ApiResponse, AttachChartsRequest, FileInfoDto, SessionDto, SessionListDto, UploadResponseDto,
};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;
use crate::registry::SessionRecord;
use crate::store::ArtifactPayload;

fn extension_allowed(filename: &str, allowed: &[String]) -> bool {
    let lower = filename.to_lowercase();
    allowed.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Upload a spreadsheet and create a session for it.
///
/// Accepts a multipart form with a single `file` field. Validates the
/// extension and size before anything touches disk.
pub async fn upload(
    Extension(handler): Extension<Arc<Handler>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponseDto>>, RestError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RestError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .ok_or_else(|| RestError::bad_request("file field has no filename"))?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RestError::bad_request(format!("failed to read upload: {e}")))?;
        file = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) =
        file.ok_or_else(|| RestError::bad_request("no file field in upload"))?;

    let config = handler.config();
    if !extension_allowed(&filename, &config.storage.allowed_extensions) {
        return Err(RestError::bad_request(format!(
            "unsupported file type: {filename} (allowed: {})",
            config.storage.allowed_extensions.join(", ")
        )));
    }
    if bytes.is_empty() {
        return Err(RestError::bad_request("uploaded file is empty"));
    }
    if bytes.len() > config.max_upload_bytes() {
        return Err(RestError::payload_too_large(format!(
            "file exceeds {} MB limit",
            config.storage.max_size_mb
        )));
    }

    let session_id = crate::registry::SessionRegistry::new_session_id();
    let created_at = Utc::now();
    handler.store().put(
        &session_id,
        ArtifactPayload::Upload {
            filename: &filename,
            bytes: &bytes,
        },
        created_at,
    )?;

    handler.registry().insert(SessionRecord {
        session_id: session_id.clone(),
        created_at,
        original_filename: filename.clone(),
        has_chart: false,
    });

    info!(session_id, filename, size = bytes.len(), "file uploaded");

    let data = handler.store().get(&session_id)?;
    let meta = data
        .meta
        .ok_or_else(|| RestError::internal("upload metadata missing after write"))?;

    Ok(Json(ApiResponse::success(UploadResponseDto {
        session_id,
        file_info: FileInfoDto {
            original_filename: meta.original_filename,
            stored_filename: meta.stored_filename,
            size_bytes: meta.size_bytes,
            created_at: meta.created_at,
        },
    })))
}

/// Fetch a session's stored data, including any chart record
pub async fn get_session(
    Extension(handler): Extension<Arc<Handler>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionDto>>, RestError> {
    let data = handler.store().get(&session_id)?;
    let created_at = data
        .created_at()
        .ok_or_else(|| RestError::internal("session has no creation timestamp"))?;

    Ok(Json(ApiResponse::success(SessionDto {
        session_id,
        created_at,
        file_info: data.meta.map(|m| FileInfoDto {
            original_filename: m.original_filename,
            stored_filename: m.stored_filename,
            size_bytes: m.size_bytes,
            created_at: m.created_at,
        }),
        charts: data.charts.map(|c| c.charts),
    })))
}

/// Attach (or replace) the derived chart configuration for a session.
///
/// The chart record inherits the session's creation timestamp: writing
/// charts never extends a session's lifetime.
pub async fn attach_charts(
    Extension(handler): Extension<Arc<Handler>>,
    Path(session_id): Path<String>,
    Json(request): Json<AttachChartsRequest>,
) -> Result<Json<ApiResponse<SessionDto>>, RestError> {
    // The session must exist; charts are derived artifacts
    if !handler.registry().contains(&session_id) && handler.store().get(&session_id).is_err() {
        return Err(RestError::not_found(format!(
            "session {session_id} not found"
        )));
    }

    handler.store().put(
        &session_id,
        ArtifactPayload::Chart(&request.charts),
        Utc::now(),
    )?;
    handler.registry().set_has_chart(&session_id);

    info!(session_id, "chart configuration attached");
    get_session(Extension(handler), Path(session_id)).await
}

/// Download the session's chart configuration as a JSON attachment
pub async fn download_charts(
    Extension(handler): Extension<Arc<Handler>>,
    Path(session_id): Path<String>,
) -> Result<Response, RestError> {
    let data = handler.store().get(&session_id)?;
    let record = data
        .charts
        .ok_or_else(|| RestError::not_found(format!("session {session_id} has no charts")))?;
    let body = serde_json::to_vec_pretty(&record.charts)
        .map_err(|e| RestError::internal(format!("failed to encode charts: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"charts-{session_id}.json\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// List active sessions with store statistics (operator view)
pub async fn list_sessions(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<SessionListDto>>, RestError> {
    let sessions = handler.registry().list();
    let count = sessions.len();
    Ok(Json(ApiResponse::success(SessionListDto {
        sessions,
        count,
        file_stats: handler.store().stats(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        let allowed = vec![".csv".to_string(), ".xlsx".to_string()];
        assert!(extension_allowed("Data.CSV", &allowed));
        assert!(extension_allowed("report.xlsx", &allowed));
        assert!(!extension_allowed("notes.txt", &allowed));
        assert!(!extension_allowed("csv", &allowed));
    }
}
