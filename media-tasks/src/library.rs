//! Media library - files under the media root
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
use crate::transcoder::has_video_stream;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use vidforge_types::{MediaFile, MediaSource};

/// Folders scanned for media, relative to the media root
pub const MEDIA_FOLDERS: [(&str, MediaSource); 3] = [
    ("yt_videos", MediaSource::Downloaded),
    ("local_videos", MediaSource::Local),
    ("download", MediaSource::Processed),
];

/// Files under the media root, addressed by root-relative paths
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
    ffprobe: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the media folders if they are missing
    pub async fn ensure_folders(&self) -> Result<()> {
        for (folder, _) in MEDIA_FOLDERS {
            fs::create_dir_all(self.root.join(folder)).await?;
        }
        Ok(())
    }

    /// Turn a root-relative path into an absolute one.
    ///
    /// Absolute paths and `..` components are rejected so callers cannot
    /// reach outside the media root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative.trim());
        let confined = !candidate.as_os_str().is_empty()
            && candidate
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(MediaTaskError::InputNotFound(candidate.to_path_buf()));
        }
        Ok(self.root.join(candidate))
    }

    /// Resolve a root-relative path that must name an existing file
    pub async fn resolve_existing(&self, relative: &str) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(MediaTaskError::InputNotFound(path)),
        }
    }

    /// List every file in the media folders, optionally probing each for a video stream
    pub async fn list(&self, probe: bool) -> Result<Vec<MediaFile>> {
        self.ensure_folders().await?;

        let mut files = Vec::new();
        for (folder, source) in MEDIA_FOLDERS {
            let mut found = Vec::new();
            let mut entries = fs::read_dir(self.root.join(folder)).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !meta.is_file() || name == ".gitignore" {
                    continue;
                }

                let has_video = if probe {
                    Some(has_video_stream(&self.ffprobe, &entry.path()).await)
                } else {
                    None
                };

                found.push(MediaFile {
                    path: format!("{folder}/{name}"),
                    name,
                    source,
                    size_bytes: meta.len(),
                    has_video,
                });
            }
            found.sort_by(|a, b| a.name.cmp(&b.name));
            files.extend(found);
        }

        debug!(count = files.len(), "Listed media files");
        Ok(files)
    }

    /// Delete a file; returns false when it did not exist
    pub async fn delete(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Deleted media file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_escapes() {
        let library = MediaLibrary::new("/srv/media", "ffprobe");
        assert_eq!(
            library.resolve("local_videos/clip.mp4").unwrap(),
            PathBuf::from("/srv/media/local_videos/clip.mp4")
        );
        assert!(library.resolve("../etc/passwd").is_err());
        assert!(library.resolve("/etc/passwd").is_err());
        assert!(library.resolve("local_videos/../../x").is_err());
        assert!(library.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path(), "/nonexistent/ffprobe");
        library.ensure_folders().await.unwrap();
        fs::write(dir.path().join("local_videos/b.mp4"), b"bb").await.unwrap();
        fs::write(dir.path().join("local_videos/a.mp4"), b"a").await.unwrap();
        fs::write(dir.path().join("local_videos/.gitignore"), b"*").await.unwrap();
        fs::write(dir.path().join("download/out.wav"), b"wav").await.unwrap();

        let files = library.list(false).await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["local_videos/a.mp4", "local_videos/b.mp4", "download/out.wav"]);
        assert_eq!(files[1].size_bytes, 2);
        assert_eq!(files[2].source, MediaSource::Processed);
        assert!(files.iter().all(|f| f.has_video.is_none()));

        let probed = library.list(true).await.unwrap();
        assert!(probed.iter().all(|f| f.has_video == Some(false)));

        assert!(library.delete("local_videos/a.mp4").await.unwrap());
        assert!(!library.delete("local_videos/a.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_existing() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path(), "ffprobe");
        library.ensure_folders().await.unwrap();
        let missing = library.resolve_existing("local_videos/none.mp4").await;
        assert!(matches!(missing, Err(MediaTaskError::InputNotFound(_))));
        // Directories are not inputs
        assert!(library.resolve_existing("local_videos").await.is_err());
    }
}
