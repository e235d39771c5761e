//! Task engine - wires configuration, catalog and runner together
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


use crate::capability::CapabilityProber;
use crate::command::{CommandBuilder, ParamValue, Parameters};
use crate::downloader::{DownloadEngine, YtDlpEngine};
use crate::error::{MediaTaskError, Result};
use crate::library::MediaLibrary;
use crate::naming::{clean_filename, cleaned_path, OutputPlan};
use crate::profiles::ProfileRegistry;
use crate::progress::ProgressStore;
use crate::runner::TaskRunner;
use crate::transcoder::{ProcessLauncher, SystemLauncher};
use std::sync::Arc;
use tracing::info;
use vidforge_config::AppConfig;
use vidforge_types::{MediaFile, ProfileSummary, StatusRecord};

/// Entry point for submitting and inspecting media tasks
pub struct TaskEngine {
    config: AppConfig,
    registry: Arc<ProfileRegistry>,
    builder: CommandBuilder,
    runner: TaskRunner,
    library: MediaLibrary,
}

impl TaskEngine {
    /// Build an engine backed by the real toolchain named in `config`
    pub fn from_config(config: AppConfig) -> Self {
        let prober = Arc::new(CapabilityProber::new(&config.tools.ffmpeg));
        let downloader: Arc<dyn DownloadEngine> = Arc::new(YtDlpEngine::new(&config.tools.yt_dlp));
        let launcher: Arc<dyn ProcessLauncher> = Arc::new(SystemLauncher::with_tools(&config.tools));
        Self::with_components(config, prober, downloader, launcher)
    }

    /// Build an engine from explicit collaborators
    pub fn with_components(
        config: AppConfig,
        prober: Arc<CapabilityProber>,
        downloader: Arc<dyn DownloadEngine>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let registry = Arc::new(ProfileRegistry::new(&config.custom_profiles_path, prober));
        let builder = CommandBuilder::new(Arc::clone(&registry));
        let runner = TaskRunner::new(Arc::new(ProgressStore::new()), downloader, launcher)
            .with_concurrency_limit(config.max_concurrent_tasks);
        let library = MediaLibrary::new(&config.media_root, &config.tools.ffprobe);

        Self {
            config,
            registry,
            builder,
            runner,
            library,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    pub fn library(&self) -> &MediaLibrary {
        &self.library
    }

    pub async fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.registry.list_profiles().await
    }

    pub async fn extract_parameters(&self, key: &str) -> Result<Vec<String>> {
        self.registry.extract_parameters(key).await
    }

    pub async fn add_custom_profile(&self, key: &str, template: Vec<String>, description: &str) -> Result<()> {
        self.registry.add_custom_profile(key, template, description).await
    }

    pub async fn add_custom_command_line(&self, key: &str, command_line: &str, description: &str) -> Result<()> {
        self.registry
            .add_custom_command_line(key, command_line, description)
            .await
    }

    pub async fn list_media(&self, probe: bool) -> Result<Vec<MediaFile>> {
        self.library.list(probe).await
    }

    pub async fn delete_media(&self, relative_path: &str) -> Result<bool> {
        self.library.delete(relative_path).await
    }

    /// Start downloading `url` into the download folder
    pub fn submit_download(&self, url: &str) -> Result<String> {
        let url = url.trim();
        let valid = (url.starts_with("http://") || url.starts_with("https://"))
            && url.len() > "https://".len()
            && !url.chars().any(char::is_whitespace);
        if !valid {
            return Err(MediaTaskError::InvalidUrl(url.to_string()));
        }

        Ok(self
            .runner
            .submit_download(url.to_string(), self.config.download_dir()))
    }

    /// Start running `profile` on a file under the media root.
    ///
    /// Lookup and parameter errors are returned here; process failures end up
    /// in the task's status record.
    pub async fn submit_transcode(
        &self,
        profile: &str,
        input_relative_path: &str,
        mut params: Parameters,
    ) -> Result<String> {
        let profile = self.registry.get_profile(profile).await?;
        let input = self.library.resolve_existing(input_relative_path).await?;

        let output_dir = self.config.output_dir();
        let cleaned_input = cleaned_path(&input);
        let plan = OutputPlan::new(
            &output_dir,
            &cleaned_input,
            &profile.key,
            chrono::Utc::now().timestamp(),
            profile.uses_placeholder("output_pattern"),
        );

        params.insert("input".to_string(), ParamValue::from(cleaned_input.as_path()));
        params.insert("output".to_string(), ParamValue::from(plan.output.as_path()));
        match &plan.output_pattern {
            Some(pattern) => {
                params.insert("output_pattern".to_string(), ParamValue::from(pattern.as_path()));
            }
            None => {
                params.remove("output_pattern");
            }
        }

        // Build before touching the filesystem so a bad request leaves no trace
        let argv = self.builder.build(&profile.key, &params).await?;

        clean_filename(&input).await?;
        tokio::fs::create_dir_all(&output_dir).await?;

        let output_name = plan
            .output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let task_id = self.runner.submit_transcode(argv, output_name);
        info!(task_id = %task_id, profile = %profile.key, input = %cleaned_input.display(), "Transcode submitted");
        Ok(task_id)
    }

    /// Latest status of a task, `pending` for unknown identifiers
    pub fn status(&self, task_id: &str) -> StatusRecord {
        self.runner.status(task_id)
    }
}
