use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    StorageBackend,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    LocalStorageDir,
    ScratchDir,
    MaxVideoSize,
    TranscodeResolutions,
    FfmpegPath,
    TranscodeWorkers,
    TranscodeMaxAttempts,
    TranscodeTimeoutSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::StorageBackend => "STORAGE_BACKEND",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::LocalStorageDir => "LOCAL_STORAGE_DIR",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::MaxVideoSize => "MAX_VIDEO_SIZE_BYTES",
            EnvKey::TranscodeResolutions => "TRANSCODE_RESOLUTIONS",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::TranscodeWorkers => "TRANSCODE_WORKERS",
            EnvKey::TranscodeMaxAttempts => "TRANSCODE_MAX_ATTEMPTS",
            EnvKey::TranscodeTimeoutSecs => "TRANSCODE_TIMEOUT_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

pub fn get_optional<T: FromStr>(key: EnvKey) -> Option<T> {
    get(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}
