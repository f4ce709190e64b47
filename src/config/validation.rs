use super::models::Config;
use thiserror::Error;

const SUPPORTED_AUDIO_CODECS: &[&str] = &["mp3", "aac", "m4a", "opus", "vorbis", "flac", "wav"];
pub const SUPPORTED_VIDEO_CONTAINERS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "flv"];
const MAX_RETRIES: u32 = 20;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("downloads.max_batch must be at least 1")]
    InvalidMaxBatch,

    #[error("downloads.dir must not be empty")]
    EmptyDownloadDir,

    #[error("server.max_payload_bytes must be positive")]
    InvalidPayloadLimit,

    #[error("fetcher.binary must not be empty")]
    EmptyFetcherBinary,

    #[error("fetcher.retries ({0}) exceeds limit of {MAX_RETRIES}")]
    TooManyRetries(u32),

    #[error("Unsupported audio codec '{0}'")]
    UnsupportedAudioCodec(String),

    #[error("Unsupported video container '{0}'")]
    UnsupportedVideoContainer(String),

    #[error("fetcher.audio_quality must be a bitrate in kbps, got '{0}'")]
    InvalidAudioQuality(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_downloads(config)?;
    validate_fetcher(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_payload_bytes == 0 {
        return Err(ValidationError::InvalidPayloadLimit);
    }
    Ok(())
}

fn validate_downloads(config: &Config) -> Result<(), ValidationError> {
    if config.downloads.max_batch == 0 {
        return Err(ValidationError::InvalidMaxBatch);
    }
    if config.downloads.dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyDownloadDir);
    }
    Ok(())
}

fn validate_fetcher(config: &Config) -> Result<(), ValidationError> {
    let fetcher = &config.fetcher;

    if fetcher.binary.trim().is_empty() {
        return Err(ValidationError::EmptyFetcherBinary);
    }

    if fetcher.retries > MAX_RETRIES {
        return Err(ValidationError::TooManyRetries(fetcher.retries));
    }

    if !SUPPORTED_AUDIO_CODECS.contains(&fetcher.audio_codec.as_str()) {
        return Err(ValidationError::UnsupportedAudioCodec(
            fetcher.audio_codec.clone(),
        ));
    }

    if !SUPPORTED_VIDEO_CONTAINERS.contains(&fetcher.video_container.as_str()) {
        return Err(ValidationError::UnsupportedVideoContainer(
            fetcher.video_container.clone(),
        ));
    }

    if fetcher.audio_quality.parse::<u32>().map_or(true, |kbps| kbps == 0) {
        return Err(ValidationError::InvalidAudioQuality(
            fetcher.audio_quality.clone(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let mut config = Config::default();
        config.downloads.max_batch = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxBatch)
        ));
    }

    #[test]
    fn test_empty_download_dir_rejected() {
        let mut config = Config::default();
        config.downloads.dir = PathBuf::new();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyDownloadDir)
        ));
    }

    #[test]
    fn test_fetcher_settings_checked() {
        let mut config = Config::default();
        config.fetcher.retries = 100;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::TooManyRetries(100))
        ));

        let mut config = Config::default();
        config.fetcher.audio_codec = "midi".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnsupportedAudioCodec(_))
        ));

        let mut config = Config::default();
        config.fetcher.video_container = "gif".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnsupportedVideoContainer(_))
        ));

        let mut config = Config::default();
        config.fetcher.audio_quality = "best".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidAudioQuality(_))
        ));

        let mut config = Config::default();
        config.fetcher.binary = "  ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyFetcherBinary)
        ));
    }
}
