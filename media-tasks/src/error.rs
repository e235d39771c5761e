//! Error types for the media task engine
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


use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by synchronous engine calls.
///
/// Failures inside a background task never reach the submitter as an error
/// value; they are recorded as the task's terminal `error` status instead.
#[derive(Error, Debug)]
pub enum MediaTaskError {
    /// Key is not in the capability-filtered catalog
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Missing required parameter '{name}' for profile {profile}")]
    MissingParameter { profile: String, name: String },

    #[error("Invalid profile key '{0}': only letters, digits and underscores are allowed")]
    InvalidProfileKey(String),

    #[error("Invalid template for profile {profile}: {reason}")]
    InvalidTemplate { profile: String, reason: String },

    #[error("Failed to persist custom profiles to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize custom profiles: {0}")]
    CatalogSerialization(#[from] serde_json::Error),

    #[error("Failed to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code:?}: {stderr}")]
    ExternalProcess {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaTaskError {
    /// Short message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            MediaTaskError::UnknownProfile(_) => "Invalid selection".to_string(),
            MediaTaskError::MissingParameter { name, .. } => {
                format!("Missing required field: {name}")
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaTaskError>;
