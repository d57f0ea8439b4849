//! REST API Data Transfer Objects
//!
//! Defines request/response types for the REST API endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::FileStats;

/// JSON response: { success, data?, error? }
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDto>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error details in API response
#[derive(Debug, Serialize)]
pub struct ApiErrorDto {
    pub code: String,
    pub message: String,
}

// Admin DTOs

/// Health check payload
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

// Cleanup control-surface DTOs
// Status, config, and run payloads serialize the domain types
// (CleanupStatus, CleanupConfigView, CleanupRun) directly.

/// DELETE /api/cleanup/session/{id} acknowledgment
#[derive(Debug, Serialize)]
pub struct SessionDeletedDto {
    pub session_id: String,
    pub deleted: bool,
}

// File / session DTOs

/// POST /api/files/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponseDto {
    pub session_id: String,
    pub file_info: FileInfoDto,
}

/// Stored-file details
#[derive(Debug, Serialize)]
pub struct FileInfoDto {
    pub original_filename: String,
    pub stored_filename: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// GET /api/files/session/{id} response
#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfoDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<serde_json::Value>,
}

/// PUT /api/files/session/{id}/charts request
#[derive(Debug, Deserialize)]
pub struct AttachChartsRequest {
    pub charts: serde_json::Value,
}

/// Session index listing (operator view)
#[derive(Debug, Serialize)]
pub struct SessionListDto {
    pub sessions: Vec<String>,
    pub count: usize,
    pub file_stats: FileStats,
}
