//! Output naming for transcode jobs
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


use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stem used when cleaning leaves nothing behind
const FALLBACK_STEM: &str = "video";

/// Strip `_ [ ] ( )` from a file stem and turn spaces into underscores
pub fn clean_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .filter(|c| !matches!(c, '_' | '[' | ']' | '(' | ')'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned
    }
}

/// Path `path` would have after cleaning its stem, extension kept
pub fn cleaned_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut file_name = clean_stem(&stem);
    if let Some(ext) = path.extension() {
        file_name.push('.');
        file_name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(file_name)
}

/// Rename `path` on disk to its cleaned name and return the new path
pub async fn clean_filename(path: &Path) -> Result<PathBuf> {
    let cleaned = cleaned_path(path);
    if cleaned != path {
        tokio::fs::rename(path, &cleaned).await?;
        debug!(from = %path.display(), to = %cleaned.display(), "Renamed input file");
    }
    Ok(cleaned)
}

/// Extension of the file a profile produces
pub fn output_extension(profile_key: &str) -> &'static str {
    if profile_key.contains("audio_wav") {
        ".wav"
    } else if profile_key.contains("audio_aac") {
        ".aac"
    } else {
        ".mp4"
    }
}

/// Output locations for one transcode job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub output: PathBuf,
    /// Numbered segment pattern, only for profiles that split their output
    pub output_pattern: Option<PathBuf>,
}

impl OutputPlan {
    /// `input` should already be cleaned; its stem is used as is
    pub fn new(
        output_dir: &Path,
        input: &Path,
        profile_key: &str,
        timestamp: i64,
        needs_pattern: bool,
    ) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_STEM.to_string());
        let ext = output_extension(profile_key);

        let output = output_dir.join(format!("{stem}_{profile_key}_{timestamp}{ext}"));
        let output_pattern =
            needs_pattern.then(|| output_dir.join(format!("{stem}_{timestamp}_%03d.mp4")));

        Self {
            output,
            output_pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_stem() {
        assert_eq!(clean_stem("My Clip [HD] (2024)"), "My_Clip_HD_2024");
        assert_eq!(clean_stem("already_clean"), "alreadyclean");
        assert_eq!(clean_stem("[]"), "video");
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(output_extension("extract_audio_wav"), ".wav");
        assert_eq!(output_extension("extract_audio_aac"), ".aac");
        assert_eq!(output_extension("trim_copy"), ".mp4");
    }

    #[test]
    fn test_output_plan() {
        let plan = OutputPlan::new(
            Path::new("/m/download"),
            Path::new("/m/local_videos/Clip.mkv"),
            "extract_audio_wav",
            1700000000,
            false,
        );
        assert_eq!(plan.output, PathBuf::from("/m/download/Clip_extract_audio_wav_1700000000.wav"));
        assert!(plan.output_pattern.is_none());

        let plan = OutputPlan::new(
            Path::new("/m/download"),
            Path::new("/m/local_videos/Clip.mp4"),
            "split_segments",
            42,
            true,
        );
        assert_eq!(plan.output_pattern, Some(PathBuf::from("/m/download/Clip_42_%03d.mp4")));
    }

    #[test]
    fn test_output_plan_keeps_cleaned_stem() {
        let input = cleaned_path(Path::new("/m/local_videos/My Clip (1).mp4"));
        assert_eq!(input, PathBuf::from("/m/local_videos/My_Clip_1.mp4"));

        let plan = OutputPlan::new(Path::new("/m/download"), &input, "trim_copy", 7, true);
        assert_eq!(plan.output, PathBuf::from("/m/download/My_Clip_1_trim_copy_7.mp4"));
        assert_eq!(plan.output_pattern, Some(PathBuf::from("/m/download/My_Clip_1_7_%03d.mp4")));
    }

    #[tokio::test]
    async fn test_clean_filename_renames() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("My Clip (1).mp4");
        tokio::fs::write(&original, b"data").await.unwrap();

        let cleaned = clean_filename(&original).await.unwrap();
        assert_eq!(cleaned, dir.path().join("My_Clip_1.mp4"));
        assert!(cleaned.exists());
        assert!(!original.exists());

        // Cleaning again strips the underscores cleaning produced
        let again = clean_filename(&cleaned).await.unwrap();
        assert_eq!(again, dir.path().join("MyClip1.mp4"));
        assert!(again.exists());

        let plain = dir.path().join("plain.mp4");
        tokio::fs::write(&plain, b"data").await.unwrap();
        assert_eq!(clean_filename(&plain).await.unwrap(), plain);
    }
}
