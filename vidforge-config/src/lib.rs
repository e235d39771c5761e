//! Configuration management for Vidforge services

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Locations of the external binaries the engine invokes
#[derive(Debug, Clone, Deserialize)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub yt_dlp: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            yt_dlp: PathBuf::from("yt-dlp"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub media_root: PathBuf,
    pub custom_profiles_path: PathBuf,
    pub tools: ToolPaths,
    pub http_port: u16,
    /// Upper bound on concurrently running background tasks; `None` spawns freely
    pub max_concurrent_tasks: Option<usize>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            custom_profiles_path: PathBuf::from("custom_commands.json"),
            tools: ToolPaths::default(),
            http_port: 8080,
            max_concurrent_tasks: None,
            log_level: Some("info".to_string()),
            log_format: Some("console".to_string()),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.media_root);

        let custom_profiles_path = env::var("CUSTOM_PROFILES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.custom_profiles_path);

        let tools = ToolPaths {
            ffmpeg: env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tools.ffmpeg),
            ffprobe: env::var("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tools.ffprobe),
            yt_dlp: env::var("YT_DLP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tools.yt_dlp),
        };

        let http_port = match env::var("HTTP_PORT") {
            Ok(raw) => parse_var("HTTP_PORT", &raw)?,
            Err(_) => defaults.http_port,
        };

        let max_concurrent_tasks = match env::var("MAX_CONCURRENT_TASKS") {
            Ok(raw) => {
                let limit: usize = parse_var("MAX_CONCURRENT_TASKS", &raw)?;
                if limit == 0 {
                    return Err(config::ConfigError::Message(
                        "MAX_CONCURRENT_TASKS must be at least 1".to_string(),
                    ));
                }
                Some(limit)
            }
            Err(_) => None,
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "console".to_string());

        Ok(Self {
            media_root,
            custom_profiles_path,
            tools,
            http_port,
            max_concurrent_tasks,
            log_level: Some(log_level),
            log_format: Some(log_format),
        })
    }

    /// Folder receiving downloaded videos
    pub fn download_dir(&self) -> PathBuf {
        self.media_root.join("yt_videos")
    }

    /// Folder receiving uploaded videos
    pub fn upload_dir(&self) -> PathBuf {
        self.media_root.join("local_videos")
    }

    /// Folder receiving transcode outputs
    pub fn output_dir(&self) -> PathBuf {
        self.media_root.join("download")
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Get log format, defaulting to "console"
    pub fn log_format(&self) -> &str {
        self.log_format.as_deref().unwrap_or("console")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, config::ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| config::ConfigError::Message(format!("{name} has an invalid value: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.log_format(), "console");
        assert!(config.max_concurrent_tasks.is_none());
        assert_eq!(config.tools.yt_dlp, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn test_media_folders() {
        let config = AppConfig {
            media_root: PathBuf::from("/srv/media"),
            ..AppConfig::default()
        };
        assert_eq!(config.download_dir(), PathBuf::from("/srv/media/yt_videos"));
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/media/local_videos"));
        assert_eq!(config.output_dir(), PathBuf::from("/srv/media/download"));
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        let parsed: Result<u16, _> = parse_var("HTTP_PORT", "eighty");
        assert!(parsed.is_err());
        let parsed: u16 = parse_var("HTTP_PORT", " 9000 ").unwrap();
        assert_eq!(parsed, 9000);
    }
}
