//! Transcode execution - runs resolved argument vectors as child processes
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


use crate::error::{MediaTaskError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use vidforge_config::ToolPaths;

/// Lines of stderr kept when a process fails
const STDERR_TAIL_LINES: usize = 20;

/// Captured output of a successful run
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a fully resolved argument vector (program first)
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn run(&self, argv: &[String]) -> Result<ProcessOutput>;
}

/// Launches real child processes, mapping well-known program names to configured paths
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher {
    overrides: HashMap<String, PathBuf>,
}

impl SystemLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `ffmpeg`, `ffprobe` and `yt-dlp` to the configured binaries
    pub fn with_tools(tools: &ToolPaths) -> Self {
        let mut overrides = HashMap::new();
        overrides.insert("ffmpeg".to_string(), tools.ffmpeg.clone());
        overrides.insert("ffprobe".to_string(), tools.ffprobe.clone());
        overrides.insert("yt-dlp".to_string(), tools.yt_dlp.clone());
        Self { overrides }
    }

    pub fn resolve_program(&self, name: &str) -> PathBuf {
        self.overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn run(&self, argv: &[String]) -> Result<ProcessOutput> {
        let Some((name, args)) = argv.split_first() else {
            return Err(MediaTaskError::ProcessLaunch {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argument vector"),
            });
        };

        let program = self.resolve_program(name);
        debug!(program = %program.display(), args = ?args, "Launching process");

        let output = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaTaskError::ProcessLaunch {
                program: name.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!(
                program = %name,
                code = ?output.status.code(),
                "Process exited unsuccessfully"
            );
            return Err(MediaTaskError::ExternalProcess {
                program: name.clone(),
                code: output.status.code(),
                stderr: stderr_tail(&stderr),
            });
        }

        info!(program = %name, "Process completed");
        Ok(ProcessOutput { stdout, stderr })
    }
}

/// Last few lines of a process's stderr, which is where ffmpeg and yt-dlp put the cause
pub(crate) fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Check that a tool can be executed by running it with `-version`
pub async fn tool_available(program: &Path) -> bool {
    match Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            warn!(program = %program.display(), error = %e, "Tool is not available");
            false
        }
    }
}

/// Whether `input` contains at least one video stream according to ffprobe
///
/// Any probe failure counts as "no video stream".
pub async fn has_video_stream(ffprobe: &Path, input: &Path) -> bool {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0", "-show_entries", "stream=codec_type", "-of", "csv=p=0"])
        .arg(input)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim() == "video"
        }
        Ok(output) => {
            debug!(
                input = %input.display(),
                code = ?output.status.code(),
                "ffprobe rejected input"
            );
            false
        }
        Err(e) => {
            warn!(program = %ffprobe.display(), error = %e, "Failed to run ffprobe");
            false
        }
    }
}
