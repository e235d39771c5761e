//! Download engine - fetches remote media with yt-dlp
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
use crate::transcoder::stderr_tail;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const PROGRESS_PREFIX: &str = "[progress] ";
const ETA_PLACEHOLDER: &str = "...";

/// Phase reported by a progress tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStatus {
    Downloading,
    /// One format finished; merging or further formats may follow
    Finished,
    Other(String),
}

/// One progress report from the download engine, fields as the engine formats them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTick {
    pub status: TickStatus,
    /// e.g. `" 45.3%"` or `"N/A"`
    pub percent: Option<String>,
    /// e.g. `"00:12"` or `"Unknown"`
    pub eta: Option<String>,
}

impl DownloadTick {
    /// Parse a line emitted through our `--progress-template`
    pub fn parse_line(line: &str) -> Option<Self> {
        let body = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
        let mut fields = body.splitn(3, '|');

        let status = match fields.next()?.trim() {
            "downloading" => TickStatus::Downloading,
            "finished" => TickStatus::Finished,
            "" => return None,
            other => TickStatus::Other(other.to_string()),
        };
        let percent = fields.next().map(str::to_string);
        let eta = fields.next().map(str::to_string);

        Some(Self { status, percent, eta })
    }

    /// Percentage as a number; anything unparseable is 0
    pub fn percent_value(&self) -> f64 {
        parse_percent(self.percent.as_deref())
    }

    /// ETA text; missing or unknown values become an ellipsis
    pub fn eta_text(&self) -> String {
        parse_eta(self.eta.as_deref())
    }
}

/// Parse an engine percentage string such as `" 45.3%"`; never fails
pub fn parse_percent(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned = strip_ansi(raw);
    let cleaned = cleaned.trim().trim_end_matches('%').trim();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Normalise an engine ETA string; never fails
pub fn parse_eta(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return ETA_PLACEHOLDER.to_string();
    };
    let cleaned = strip_ansi(raw);
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "NA" | "N/A" | "Unknown" | "None" => ETA_PLACEHOLDER.to_string(),
        other => other.to_string(),
    }
}

fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip a CSI sequence up to and including its final letter
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

/// Callback receiving progress ticks for one download
pub type ProgressHook = dyn Fn(DownloadTick) + Send + Sync;

/// Result of a finished download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Final file path, when the engine reported one
    pub destination: Option<PathBuf>,
}

/// External engine that downloads a URL into a folder
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    async fn download(&self, url: &str, dest_dir: &Path, hook: &ProgressHook) -> Result<DownloadOutcome>;
}

/// yt-dlp driven as a child process
pub struct YtDlpEngine {
    program: PathBuf,
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Argument list (without the program) for downloading `url` into `dest_dir`
    pub fn args(url: &str, dest_dir: &Path) -> Vec<String> {
        let output_template = dest_dir.join("%(title)s.%(ext)s");
        vec![
            "--newline".to_string(),
            "--no-colors".to_string(),
            "--no-playlist".to_string(),
            "--restrict-filenames".to_string(),
            "-f".to_string(),
            "bestvideo+bestaudio/best".to_string(),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
            "--progress-template".to_string(),
            format!(
                "download:{PROGRESS_PREFIX}%(progress.status)s|%(progress._percent_str)s|%(progress._eta_str)s"
            ),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    async fn download(&self, url: &str, dest_dir: &Path, hook: &ProgressHook) -> Result<DownloadOutcome> {
        tokio::fs::create_dir_all(dest_dir).await?;

        let program = self.program.to_string_lossy().into_owned();
        info!(url = url, destination = %dest_dir.display(), "Starting yt-dlp download");

        let mut child = Command::new(&self.program)
            .args(Self::args(url, dest_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaTaskError::ProcessLaunch {
                program: program.clone(),
                source,
            })?;

        // Drain stderr concurrently so a chatty engine cannot fill the pipe and stall
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut outcome = DownloadOutcome::default();
        if let Some(stdout) = child.stdout.take() {
            // Split on raw bytes so one non UTF-8 title cannot end the read loop
            let mut segments = BufReader::new(stdout).split(b'\n');
            loop {
                match segments.next_segment().await {
                    Ok(Some(bytes)) => {
                        let line = String::from_utf8_lossy(&bytes);
                        let line = line.trim_end_matches('\r');
                        if let Some(tick) = DownloadTick::parse_line(line) {
                            hook(tick);
                        } else if let Some(path) = parse_destination(line) {
                            debug!(path = %path.display(), "yt-dlp destination");
                            outcome.destination = Some(path);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed reading yt-dlp output");
                        break;
                    }
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(MediaTaskError::ExternalProcess {
                program,
                code: status.code(),
                stderr: stderr_tail(&stderr),
            });
        }

        info!(url = url, destination = ?outcome.destination, "yt-dlp download finished");
        Ok(outcome)
    }
}

/// Extract the output path from yt-dlp's informational lines
fn parse_destination(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into ") {
        return Some(PathBuf::from(rest.trim_matches('"')));
    }
    if let Some(rest) = line.strip_prefix("[download] Destination: ") {
        return Some(PathBuf::from(rest));
    }
    line.strip_prefix("[download] ")
        .and_then(|rest| rest.strip_suffix(" has already been downloaded"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        let tick = DownloadTick::parse_line("[progress] downloading| 45.3%|00:12").unwrap();
        assert_eq!(tick.status, TickStatus::Downloading);
        assert_eq!(tick.percent_value(), 45.3);
        assert_eq!(tick.eta_text(), "00:12");
    }

    #[test]
    fn test_parse_finished_line() {
        let tick = DownloadTick::parse_line("[progress] finished|100.0%|Unknown").unwrap();
        assert_eq!(tick.status, TickStatus::Finished);
        assert_eq!(tick.percent_value(), 100.0);
        assert_eq!(tick.eta_text(), "...");
    }

    #[test]
    fn test_non_progress_lines_ignored() {
        assert!(DownloadTick::parse_line("[youtube] abc: Downloading webpage").is_none());
        assert!(DownloadTick::parse_line("[progress] ").is_none());
    }

    #[test]
    fn test_percent_defaults() {
        assert_eq!(parse_percent(Some("N/A")), 0.0);
        assert_eq!(parse_percent(Some("  ")), 0.0);
        assert_eq!(parse_percent(None), 0.0);
        assert_eq!(parse_percent(Some("NaN%")), 0.0);
        assert_eq!(parse_percent(Some("250%")), 100.0);
        assert_eq!(parse_percent(Some("\u{1b}[0;94m 12.5%\u{1b}[0m")), 12.5);
    }

    #[test]
    fn test_eta_defaults() {
        assert_eq!(parse_eta(Some("N/A")), "...");
        assert_eq!(parse_eta(None), "...");
        assert_eq!(parse_eta(Some(" 01:02 ")), "01:02");
    }

    #[test]
    fn test_parse_destination() {
        assert_eq!(
            parse_destination("[download] Destination: /m/yt_videos/Clip.f137.mp4"),
            Some(PathBuf::from("/m/yt_videos/Clip.f137.mp4"))
        );
        assert_eq!(
            parse_destination("[Merger] Merging formats into \"/m/yt_videos/Clip.mp4\""),
            Some(PathBuf::from("/m/yt_videos/Clip.mp4"))
        );
        assert_eq!(
            parse_destination("[download] /m/yt_videos/Clip.mp4 has already been downloaded"),
            Some(PathBuf::from("/m/yt_videos/Clip.mp4"))
        );
        assert_eq!(parse_destination("[download]  10.0% of 5MiB"), None);
    }

    #[test]
    fn test_args_keep_url_last() {
        let args = YtDlpEngine::args("https://example.com/v", Path::new("/m/yt_videos"));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
        assert!(args.iter().any(|a| a == "--no-playlist"));
        assert!(args.iter().any(|a| a.ends_with("%(title)s.%(ext)s")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_output_is_skipped() {
        use std::os::unix::fs::PermissionsExt;
        use std::sync::{Arc, Mutex};

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '\\377\\376 bad title\\n[progress] downloading| 50.0%%|00:01\\n[download] Destination: /m/clip.mp4\\n'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        let hook = move |tick: DownloadTick| sink.lock().unwrap().push(tick);
        let engine = YtDlpEngine::new(&script);
        let outcome = engine
            .download("https://example.com/v", &dir.path().join("out"), &hook)
            .await
            .unwrap();

        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].percent_value(), 50.0);
        assert_eq!(outcome.destination, Some(PathBuf::from("/m/clip.mp4")));
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let engine = YtDlpEngine::new("/nonexistent/bin/yt-dlp-vidforge");
        let dir = tempfile::tempdir().unwrap();
        let hook = |_tick: DownloadTick| {};
        let result = engine.download("https://example.com/v", dir.path(), &hook).await;
        assert!(matches!(result, Err(MediaTaskError::ProcessLaunch { .. })));
    }
}
