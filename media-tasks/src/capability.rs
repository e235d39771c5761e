//! Hardware capability detection
//!
//! Asks the ffmpeg toolchain which accelerators and encoders it was built
//! with. A capability counts as present only when both the accelerator and
//! its encoder are listed.
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


use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Optional hardware feature gating a subset of profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// NVIDIA CUDA decode + NVENC H.264 encode
    Nvenc,
    /// NVIDIA CUDA decode + NVENC HEVC encode
    NvencHevc,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Nvenc, Capability::NvencHevc];

    /// Name listed by `ffmpeg -hwaccels`
    pub fn hwaccel(&self) -> &'static str {
        match self {
            Capability::Nvenc | Capability::NvencHevc => "cuda",
        }
    }

    /// Name listed by `ffmpeg -encoders`
    pub fn encoder(&self) -> &'static str {
        match self {
            Capability::Nvenc => "h264_nvenc",
            Capability::NvencHevc => "hevc_nvenc",
        }
    }

    /// Substrings that mark a key or template token as needing this capability
    fn markers(&self) -> &'static [&'static str] {
        match self {
            Capability::Nvenc => &["nvenc", "cuda"],
            Capability::NvencHevc => &["hevc_nvenc"],
        }
    }

    /// Capabilities implied by marker substrings in a profile key or template.
    ///
    /// Used for custom profiles, which carry no explicit requirement tags.
    pub fn inferred_from(key: &str, template: &[String]) -> Vec<Capability> {
        let key = key.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .filter(|cap| {
                cap.markers().iter().any(|marker| {
                    key.contains(marker)
                        || template
                            .iter()
                            .any(|token| token.to_ascii_lowercase().contains(marker))
                })
            })
            .collect()
    }
}

/// Detects capabilities once per process and caches the answer
pub struct CapabilityProber {
    ffmpeg: PathBuf,
    detected: OnceCell<HashSet<Capability>>,
}

impl CapabilityProber {
    /// Create a prober that will query the given ffmpeg binary on first use
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            detected: OnceCell::new(),
        }
    }

    /// Create a prober with a predetermined answer (no process is ever run)
    pub fn fixed(available: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            detected: OnceCell::new_with(Some(available.into_iter().collect())),
        }
    }

    /// True when hardware-accelerated encoding is usable
    pub async fn probe(&self) -> bool {
        self.supports(Capability::Nvenc).await
    }

    pub async fn supports(&self, capability: Capability) -> bool {
        self.available().await.contains(&capability)
    }

    /// All detected capabilities; the first call runs the toolchain
    pub async fn available(&self) -> &HashSet<Capability> {
        self.detected
            .get_or_init(|| detect(&self.ffmpeg))
            .await
    }
}

async fn detect(ffmpeg: &Path) -> HashSet<Capability> {
    let Some(hwaccels) = list_toolchain(ffmpeg, "-hwaccels").await else {
        info!(ffmpeg = %ffmpeg.display(), "Hardware acceleration unavailable (ffmpeg not usable)");
        return HashSet::new();
    };
    let accelerators = parse_hwaccels(&hwaccels);

    // An accelerator can be listed while the matching encoder was not compiled in
    let encoders = match list_toolchain(ffmpeg, "-encoders").await {
        Some(stdout) => parse_encoders(&stdout),
        None => HashSet::new(),
    };

    let found = supported(&accelerators, &encoders);

    if found.is_empty() {
        info!("No hardware acceleration detected");
    } else {
        info!(capabilities = ?found, "Hardware acceleration detected");
    }
    found
}

/// Capabilities whose accelerator and encoder are both listed
pub fn supported(accelerators: &HashSet<String>, encoders: &HashSet<String>) -> HashSet<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|capability| {
            let accel = accelerators.contains(capability.hwaccel());
            let encoder = encoders.contains(capability.encoder());
            debug!(
                capability = ?capability,
                accelerator_listed = accel,
                encoder_listed = encoder,
                "Capability check"
            );
            accel && encoder
        })
        .collect()
}

/// Run `ffmpeg -hide_banner <flag>` and return stdout, or `None` on any failure
async fn list_toolchain(ffmpeg: &Path, flag: &str) -> Option<String> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", flag])
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            warn!(flag = flag, code = ?output.status.code(), "ffmpeg listing exited unsuccessfully");
            None
        }
        Err(e) => {
            debug!(flag = flag, error = %e, "Failed to run ffmpeg listing");
            None
        }
    }
}

/// Parse the output of `ffmpeg -hwaccels`
pub fn parse_hwaccels(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(str::to_string)
        .collect()
}

/// Parse the encoder names out of `ffmpeg -encoders`
pub fn parse_encoders(stdout: &str) -> HashSet<String> {
    let mut encoders = HashSet::new();

    for line in stdout.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('-') || trimmed.starts_with("Encoders:") {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let flags = match parts.next() {
            Some(flags) if flags.len() == 6 => flags,
            _ => continue,
        };
        let name = match parts.next() {
            Some(name) if name != "=" => name,
            _ => continue,
        };

        if flags.starts_with(['V', 'A', 'S']) {
            encoders.insert(name.to_string());
        }
    }

    encoders
}
