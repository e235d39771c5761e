//! Profile Registry - built-in and custom operation templates
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


use crate::capability::{Capability, CapabilityProber};
use crate::command::{is_identifier, is_reserved, placeholders};
use crate::error::{MediaTaskError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vidforge_types::ProfileSummary;

/// A named, reusable external-operation template
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub key: String,
    /// Ordered argument template; tokens may contain `{name}` placeholders
    pub template: Vec<String>,
    pub description: String,
    /// Capabilities that must be present for the profile to be offered
    pub requires: Vec<Capability>,
    pub builtin: bool,
}

impl Profile {
    /// Title-cased display name derived from the key
    pub fn name(&self) -> String {
        display_name(&self.key)
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            key: self.key.clone(),
            name: self.name(),
            description: self.description.clone(),
        }
    }

    /// Distinct caller-supplied placeholder names, in order of first appearance
    pub fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for token in &self.template {
            for name in placeholders(token) {
                if !is_reserved(name) && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    pub fn uses_placeholder(&self, name: &str) -> bool {
        self.template
            .iter()
            .any(|token| placeholders(token).contains(&name))
    }
}

/// `trim_reencode` -> `Trim Reencode`
pub fn display_name(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn builtin(key: &str, template: &[&str], description: &str, requires: &[Capability]) -> Profile {
    Profile {
        key: key.to_string(),
        template: template.iter().map(|t| t.to_string()).collect(),
        description: description.to_string(),
        requires: requires.to_vec(),
        builtin: true,
    }
}

/// The built-in catalog, in listing order
pub fn builtin_profiles() -> Vec<Profile> {
    vec![
        builtin(
            "base_best_quality",
            &[
                "ffmpeg", "-y", "-i", "{input}", "-map", "0:v:0", "-map", "0:a:0?",
                "-c:v", "libx264", "-preset", "medium", "-crf", "20", "-pix_fmt", "yuv420p",
                "-profile:v", "high", "-level", "4.1", "-c:a", "aac", "-b:a", "192k",
                "-movflags", "+faststart", "{output}",
            ],
            "Visually lossless video + high quality AAC audio",
            &[],
        ),
        builtin(
            "trim_reencode",
            &[
                "ffmpeg", "-y", "-ss", "{start}", "-to", "{end}", "-i", "{input}",
                "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "aac",
                "-b:a", "128k", "-movflags", "+faststart", "{output}",
            ],
            "Frame-accurate trimming with re-encoding",
            &[],
        ),
        builtin(
            "trim_copy",
            &[
                "ffmpeg", "-y", "-ss", "{start}", "-to", "{end}", "-i", "{input}",
                "-c", "copy", "{output}",
            ],
            "Fast trim without quality loss (keyframe based)",
            &[],
        ),
        builtin(
            "split_segments",
            &[
                "ffmpeg", "-y", "-i", "{input}", "-map", "0", "-c", "copy",
                "-f", "segment", "-segment_time", "{duration}", "-reset_timestamps", "1",
                "{output_pattern}",
            ],
            "Split video into equal-length segments",
            &[],
        ),
        builtin(
            "compress_high_quality",
            &[
                "ffmpeg", "-y", "-i", "{input}", "-c:v", "libx264", "-preset", "fast",
                "-crf", "26", "-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart",
                "{output}",
            ],
            "Balanced compression (YouTube-grade quality)",
            &[],
        ),
        builtin(
            "compress_ultra",
            &[
                "ffmpeg", "-y", "-i", "{input}", "-c:v", "libx265", "-preset", "fast",
                "-crf", "28", "-c:a", "aac", "-b:a", "96k", "{output}",
            ],
            "Maximum compression using H.265",
            &[],
        ),
        builtin(
            "extract_audio_wav",
            &["ffmpeg", "-y", "-i", "{input}", "-vn", "-c:a", "pcm_s16le", "{output}"],
            "Extract lossless WAV audio",
            &[],
        ),
        builtin(
            "extract_audio_aac",
            &["ffmpeg", "-y", "-i", "{input}", "-vn", "-c:a", "aac", "-b:a", "192k", "{output}"],
            "Extract high-quality AAC audio",
            &[],
        ),
        builtin(
            "extract_video_only",
            &[
                "ffmpeg", "-y", "-i", "{input}", "-an", "-c:v", "libx264",
                "-preset", "fast", "-crf", "23", "{output}",
            ],
            "Extract video stream only",
            &[],
        ),
        builtin(
            "resize_video",
            &[
                "ffmpeg", "-y", "-i", "{input}", "-vf", "scale={width}:{height}:flags=lanczos",
                "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "aac",
                "-b:a", "128k", "{output}",
            ],
            "Resize video using high-quality Lanczos scaling",
            &[],
        ),
        builtin(
            "remux_copy",
            &["ffmpeg", "-y", "-i", "{input}", "-c", "copy", "{output}"],
            "Change container format without re-encoding",
            &[],
        ),
        builtin(
            "nvenc_h264_fast",
            &[
                "ffmpeg", "-y", "-hwaccel", "cuda", "-i", "{input}", "-c:v", "h264_nvenc",
                "-preset", "p4", "-cq", "23", "-c:a", "aac", "-b:a", "128k",
                "-movflags", "+faststart", "{output}",
            ],
            "Fast H.264 encode on an NVIDIA GPU (NVENC)",
            &[Capability::Nvenc],
        ),
        builtin(
            "nvenc_hevc_compress",
            &[
                "ffmpeg", "-y", "-hwaccel", "cuda", "-i", "{input}", "-c:v", "hevc_nvenc",
                "-preset", "p5", "-cq", "28", "-c:a", "aac", "-b:a", "96k", "{output}",
            ],
            "Strong H.265 compression on an NVIDIA GPU (NVENC)",
            &[Capability::NvencHevc],
        ),
    ]
}

/// On-disk shape of one custom profile
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredProfile {
    #[serde(alias = "command")]
    template: Vec<String>,
    #[serde(default)]
    description: String,
}

type StoredCatalog = BTreeMap<String, StoredProfile>;

/// Merged, capability-filtered view over built-in and custom profiles.
///
/// The custom catalog file is re-read on every query so additions are
/// visible immediately. A custom entry whose key matches a built-in replaces
/// the built-in in place.
pub struct ProfileRegistry {
    custom_path: PathBuf,
    prober: Arc<CapabilityProber>,
    /// Readers share; `add_custom_profile` holds it exclusively for its read-modify-write
    catalog_lock: RwLock<()>,
}

impl ProfileRegistry {
    pub fn new(custom_path: impl Into<PathBuf>, prober: Arc<CapabilityProber>) -> Self {
        Self {
            custom_path: custom_path.into(),
            prober,
            catalog_lock: RwLock::new(()),
        }
    }

    pub fn custom_path(&self) -> &Path {
        &self.custom_path
    }

    pub fn prober(&self) -> &Arc<CapabilityProber> {
        &self.prober
    }

    /// Summaries of every profile whose requirements are met
    pub async fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.profiles().await.iter().map(Profile::summary).collect()
    }

    /// Every profile whose requirements are met, in catalog order
    pub async fn profiles(&self) -> Vec<Profile> {
        let merged = {
            let _guard = self.catalog_lock.read().await;
            merge(builtin_profiles(), read_catalog(&self.custom_path).await)
        };

        let available = self.prober.available().await;
        merged
            .into_iter()
            .filter(|profile| profile.requires.iter().all(|cap| available.contains(cap)))
            .collect()
    }

    /// Exact-key lookup; hidden profiles are reported as unknown
    pub async fn get_profile(&self, key: &str) -> Result<Profile> {
        self.profiles()
            .await
            .into_iter()
            .find(|profile| profile.key == key)
            .ok_or_else(|| MediaTaskError::UnknownProfile(key.to_string()))
    }

    /// Caller-supplied placeholder names of a profile (reserved names excluded)
    pub async fn extract_parameters(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.get_profile(key).await?.parameters())
    }

    /// Persist a custom profile, replacing any existing entry with the same key.
    ///
    /// Built-in keys may be overridden.
    pub async fn add_custom_profile(
        &self,
        key: &str,
        template: Vec<String>,
        description: &str,
    ) -> Result<()> {
        if !is_identifier(key) {
            return Err(MediaTaskError::InvalidProfileKey(key.to_string()));
        }
        if template.is_empty() || template.iter().all(|token| token.trim().is_empty()) {
            return Err(MediaTaskError::InvalidTemplate {
                profile: key.to_string(),
                reason: "template has no tokens".to_string(),
            });
        }

        let _guard = self.catalog_lock.write().await;

        let mut catalog = read_catalog(&self.custom_path).await;
        if builtin_profiles().iter().any(|profile| profile.key == key) {
            warn!(profile = key, "Custom profile overrides a built-in profile");
        }
        let replaced = catalog
            .insert(
                key.to_string(),
                StoredProfile {
                    template,
                    description: description.to_string(),
                },
            )
            .is_some();

        write_catalog(&self.custom_path, &catalog).await?;

        info!(
            profile = key,
            replaced = replaced,
            path = %self.custom_path.display(),
            "Custom profile saved"
        );
        Ok(())
    }

    /// Persist a custom profile given as a whitespace-separated command line
    pub async fn add_custom_command_line(
        &self,
        key: &str,
        command_line: &str,
        description: &str,
    ) -> Result<()> {
        let template = command_line.split_whitespace().map(str::to_string).collect();
        self.add_custom_profile(key, template, description).await
    }
}

fn merge(mut profiles: Vec<Profile>, custom: StoredCatalog) -> Vec<Profile> {
    for (key, stored) in custom {
        let requires = Capability::inferred_from(&key, &stored.template);
        let profile = Profile {
            key,
            template: stored.template,
            description: stored.description,
            requires,
            builtin: false,
        };
        match profiles.iter_mut().find(|existing| existing.key == profile.key) {
            Some(existing) => *existing = profile,
            None => profiles.push(profile),
        }
    }
    profiles
}

/// Load the custom catalog; a missing, unreadable or corrupt file is an empty catalog
async fn read_catalog(path: &Path) -> StoredCatalog {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredCatalog::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Custom profiles unreadable, ignoring");
            return StoredCatalog::new();
        }
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return StoredCatalog::new();
    }

    match serde_json::from_slice(&bytes) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Custom profiles corrupt, ignoring");
            StoredCatalog::new()
        }
    }
}

/// Rewrite the whole catalog through a temporary file and rename
async fn write_catalog(path: &Path, catalog: &StoredCatalog) -> Result<()> {
    let persistence = |source| MediaTaskError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(persistence)?;
    }

    let json = serde_json::to_string_pretty(catalog)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, format!("{json}\n")).await.map_err(persistence)?;
    fs::rename(&tmp_path, path).await.map_err(persistence)?;

    debug!(path = %path.display(), entries = catalog.len(), "Custom profiles written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("trim_reencode"), "Trim Reencode");
        assert_eq!(display_name("base_best_quality"), "Base Best Quality");
        assert_eq!(display_name("nvenc_h264_fast"), "Nvenc H264 Fast");
    }

    #[test]
    fn test_builtin_keys_unique_and_valid() {
        let profiles = builtin_profiles();
        for (i, profile) in profiles.iter().enumerate() {
            assert!(is_identifier(&profile.key), "bad key {}", profile.key);
            assert!(
                profiles[i + 1..].iter().all(|other| other.key != profile.key),
                "duplicate key {}",
                profile.key
            );
        }
    }

    #[test]
    fn test_parameters_exclude_reserved() {
        for profile in builtin_profiles() {
            let params = profile.parameters();
            for reserved in ["input", "output", "output_pattern"] {
                assert!(!params.iter().any(|p| p == reserved), "{} lists {reserved}", profile.key);
            }
        }

        let resize = builtin_profiles()
            .into_iter()
            .find(|p| p.key == "resize_video")
            .unwrap();
        assert_eq!(resize.parameters(), vec!["width", "height"]);
    }

    #[test]
    fn test_split_segments_uses_output_pattern() {
        let split = builtin_profiles()
            .into_iter()
            .find(|p| p.key == "split_segments")
            .unwrap();
        assert!(split.uses_placeholder("output_pattern"));
        assert!(!split.uses_placeholder("output"));
        assert_eq!(split.parameters(), vec!["duration"]);
    }

    #[test]
    fn test_merge_overrides_in_place() {
        let mut custom = StoredCatalog::new();
        custom.insert(
            "remux_copy".to_string(),
            StoredProfile {
                template: vec!["ffmpeg".into(), "-i".into(), "{input}".into(), "{output}".into()],
                description: "Custom remux".into(),
            },
        );
        let builtins = builtin_profiles();
        let position = builtins.iter().position(|p| p.key == "remux_copy").unwrap();

        let merged = merge(builtins.clone(), custom);
        assert_eq!(merged.len(), builtins.len());
        assert_eq!(merged[position].description, "Custom remux");
        assert!(!merged[position].builtin);
    }

    #[test]
    fn test_stored_profile_accepts_legacy_field() {
        let catalog: StoredCatalog = serde_json::from_str(
            r#"{"old": {"command": ["ffmpeg", "-i", "{input}", "x.mp4"], "description": "Legacy"}}"#,
        )
        .unwrap();
        assert_eq!(catalog["old"].template.len(), 4);
    }
}
