//! Polling and listing payload schemas
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::status::TaskStatus;
use serde::{Deserialize, Serialize};

// ============================================================================
// Task Status Records
// ============================================================================

/// Latest snapshot of a task, as returned to pollers.
///
/// Records are replaced whole; readers never see a mix of two updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl StatusRecord {
    /// Placeholder returned for identifiers the store has no record of
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            percent: None,
            eta: None,
            msg: None,
        }
    }

    pub fn starting(msg: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Starting,
            percent: Some(0.0),
            eta: None,
            msg: Some(msg.into()),
        }
    }

    pub fn processing(percent: f64, eta: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Processing,
            percent: Some(percent),
            eta: Some(eta.into()),
            msg: Some(msg.into()),
        }
    }

    pub fn complete(msg: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Complete,
            percent: Some(100.0),
            eta: None,
            msg: Some(msg.into()),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            percent: None,
            eta: None,
            msg: Some(msg.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Response body returned when a background task is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: String,
}

// ============================================================================
// Profile Listings
// ============================================================================

/// One entry of the capability-filtered operation catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub key: String,
    /// Human readable title derived from the key
    pub name: String,
    pub description: String,
}

// ============================================================================
// Media Library
// ============================================================================

/// Folder a media file lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Fetched by the download engine
    Downloaded,
    /// Uploaded by a user
    Local,
    /// Produced by a transcode
    Processed,
}

/// One file in the media library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub name: String,
    /// Path relative to the media root, always with `/` separators
    pub path: String,
    pub source: MediaSource,
    pub size_bytes: u64,
    /// `None` when the file was not probed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_video: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record_omits_optional_fields() {
        let json = serde_json::to_value(StatusRecord::pending()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "pending" }));
    }

    #[test]
    fn test_processing_record_shape() {
        let record = StatusRecord::processing(42.5, "00:10", "Downloading: 42.5% (ETA: 00:10)");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["percent"], 42.5);
        assert_eq!(json["eta"], "00:10");
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_record_deserializes_without_optionals() {
        let record: StatusRecord = serde_json::from_str(r#"{"status":"error","msg":"boom"}"#).unwrap();
        assert_eq!(record.status, TaskStatus::Error);
        assert_eq!(record.msg.as_deref(), Some("boom"));
        assert!(record.percent.is_none());
        assert!(record.is_terminal());
    }

    #[test]
    fn test_media_file_shape() {
        let file = MediaFile {
            name: "clip.mp4".to_string(),
            path: "yt_videos/clip.mp4".to_string(),
            source: MediaSource::Downloaded,
            size_bytes: 2048,
            has_video: None,
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["source"], "downloaded");
        assert!(json.get("has_video").is_none());
    }
}
