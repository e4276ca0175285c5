use std::path::PathBuf;
use std::time::Duration;

use crate::config::env::{self, EnvKey};
use crate::modules::media::model::Rendition;

pub const DEFAULT_MAX_VIDEO_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Clone, Debug)]
pub enum StorageSettings {
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
    },
    Local {
        root: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct TranscodeSettings {
    pub ffmpeg_path: String,
    pub renditions: Vec<Rendition>,
    pub workers: usize,
    pub max_attempts: u32,
    pub timeout: Option<Duration>,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            renditions: vec![Rendition::from_height(720), Rendition::from_height(1080)],
            workers: 2,
            max_attempts: 1,
            timeout: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub storage: StorageSettings,
    pub scratch_dir: PathBuf,
    pub max_video_size: u64,
    pub transcode: TranscodeSettings,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let storage = match env::get_or(EnvKey::StorageBackend, "s3").to_lowercase().as_str() {
            "local" => StorageSettings::Local {
                root: PathBuf::from(env::get_or(EnvKey::LocalStorageDir, "./data/media")),
            },
            _ => StorageSettings::S3 {
                endpoint: env::get(EnvKey::MinioUrl)?,
                bucket: env::get(EnvKey::MinioBucket)?,
                access_key: env::get(EnvKey::MinioAccessKey)?,
                secret_key: env::get(EnvKey::MinioSecretKey)?,
            },
        };

        let defaults = TranscodeSettings::default();
        let renditions = env::get(EnvKey::TranscodeResolutions)
            .map(|raw| parse_renditions(&raw))
            .unwrap_or_default();

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            storage,
            scratch_dir: PathBuf::from(env::get_or(EnvKey::ScratchDir, "./data/scratch")),
            max_video_size: env::get_parsed(EnvKey::MaxVideoSize, DEFAULT_MAX_VIDEO_SIZE),
            transcode: TranscodeSettings {
                ffmpeg_path: env::get_or(EnvKey::FfmpegPath, &defaults.ffmpeg_path),
                renditions: if renditions.is_empty() { defaults.renditions } else { renditions },
                workers: env::get_parsed(EnvKey::TranscodeWorkers, defaults.workers).max(1),
                max_attempts: env::get_parsed(EnvKey::TranscodeMaxAttempts, defaults.max_attempts).max(1),
                timeout: env::get_optional::<u64>(EnvKey::TranscodeTimeoutSecs)
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            },
        })
    }
}

/// Parses a comma separated list of target heights ("720,1080" or "720p,1080p").
/// Order is preserved and duplicates are dropped.
pub fn parse_renditions(raw: &str) -> Vec<Rendition> {
    let mut renditions: Vec<Rendition> = Vec::new();
    for part in raw.split(',') {
        let part = part.trim().trim_end_matches(['p', 'P']);
        let Ok(height) = part.parse::<u32>() else {
            continue;
        };
        if height == 0 || renditions.iter().any(|r| r.height == height) {
            continue;
        }
        renditions.push(Rendition::from_height(height));
    }
    renditions
}
