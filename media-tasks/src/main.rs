//! Media Tasks
//!
//! Serves the profile catalog and runs download and transcode tasks:
//! - Probes the toolchain for hardware encoders once at startup
//! - Accepts task submissions over HTTP
//! - Reports task progress for polling
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


use anyhow::Result;
use media_tasks::api::ApiServer;
use media_tasks::transcoder::tool_available;
use media_tasks::TaskEngine;
use std::sync::Arc;
use tracing::{error, info, warn};
use vidforge_config::AppConfig;
use vidforge_logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    let format = config.log_format().parse::<LogFormat>().unwrap_or_default();
    vidforge_logging::init("media-tasks", config.log_level(), format);

    info!(
        media_root = %config.media_root.display(),
        custom_profiles = %config.custom_profiles_path.display(),
        max_concurrent_tasks = ?config.max_concurrent_tasks,
        "Configuration loaded"
    );

    if !tool_available(&config.tools.ffmpeg).await {
        warn!(path = %config.tools.ffmpeg.display(), "FFmpeg not found, transcodes will fail");
    }
    if !tool_available(&config.tools.yt_dlp).await {
        warn!(path = %config.tools.yt_dlp.display(), "yt-dlp not found, downloads will fail");
    }

    let port = config.http_port;
    let engine = Arc::new(TaskEngine::from_config(config));
    engine
        .library()
        .ensure_folders()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create media folders: {}", e))?;

    // Probe once so the first listing does not pay for it
    let capabilities = engine.registry().prober().available().await;
    info!(capabilities = ?capabilities, "Hardware capabilities probed");

    let server = ApiServer::new(Arc::clone(&engine), port);
    if let Err(e) = server.start().await {
        error!(error = %e, "HTTP server error");
        return Err(e);
    }

    info!("Media Tasks stopped");
    Ok(())
}
