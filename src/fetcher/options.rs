use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::config::FetcherConfig;

/// Requested media kind. `mp3` and `mp4` are accepted as legacy spellings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[serde(alias = "mp3")]
    Audio,
    #[default]
    #[serde(alias = "mp4")]
    Video,
}

/// Vertical pixel ceiling for a resolution hint such as `720p` or `4k`.
pub fn target_height(resolution: &str) -> Option<u32> {
    match resolution.trim().to_ascii_lowercase().as_str() {
        "480p" => Some(480),
        "720p" => Some(720),
        "1080p" => Some(1080),
        "2k" => Some(1440),
        "4k" => Some(2160),
        _ => None,
    }
}

/// Post-processing applied after the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    ExtractAudio { codec: String, quality: String },
    ConvertVideo { container: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDownloader {
    pub name: String,
    pub args: Vec<String>,
}

/// Fully resolved options for one fetch.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct FetchOptions {
    #[builder(into)]
    pub format_selector: String,
    pub post_process: PostProcess,
    /// Output template, e.g. `downloads/%(title)s.%(ext)s`.
    #[builder(into)]
    pub output_template: PathBuf,
    #[builder(default = 3)]
    pub retries: u32,
    #[builder(default = true)]
    pub no_playlist: bool,
    /// Container the merged streams are written to.
    #[builder(into)]
    pub merge_output_format: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub external_downloader: Option<ExternalDownloader>,
}

impl FetchOptions {
    /// Options for a job of `format` with an optional resolution hint.
    pub fn for_job(
        format: MediaFormat,
        resolution: Option<&str>,
        settings: &FetcherConfig,
        download_dir: &Path,
    ) -> Self {
        let (format_selector, post_process) = match format {
            MediaFormat::Audio => (
                "bestaudio/best".to_string(),
                PostProcess::ExtractAudio {
                    codec: settings.audio_codec.clone(),
                    quality: settings.audio_quality.clone(),
                },
            ),
            MediaFormat::Video => (
                video_selector(resolution.and_then(target_height)),
                PostProcess::ConvertVideo {
                    container: settings.video_container.clone(),
                },
            ),
        };

        let cookies_file = settings
            .cookies_file
            .as_ref()
            .filter(|path| path.is_file())
            .cloned();

        let external_downloader =
            settings
                .external_downloader
                .as_ref()
                .map(|name| ExternalDownloader {
                    name: name.clone(),
                    args: settings.external_downloader_args.clone(),
                });

        FetchOptions::builder()
            .format_selector(format_selector)
            .post_process(post_process)
            .output_template(download_dir.join("%(title)s.%(ext)s"))
            .retries(settings.retries)
            .merge_output_format(settings.video_container.clone())
            .maybe_cookies_file(cookies_file)
            .maybe_external_downloader(external_downloader)
            .build()
    }
}

fn video_selector(height: Option<u32>) -> String {
    match height {
        Some(height) => format!(
            "bestvideo[ext=mp4][vcodec^=avc1][height<={height}]+bestaudio[ext=m4a]/best"
        ),
        None => "bestvideo[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]/best".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_table() {
        assert_eq!(target_height("480p"), Some(480));
        assert_eq!(target_height("720p"), Some(720));
        assert_eq!(target_height("1080P"), Some(1080));
        assert_eq!(target_height("2k"), Some(1440));
        assert_eq!(target_height("4K"), Some(2160));
        assert_eq!(target_height("8k"), None);
        assert_eq!(target_height(""), None);
    }

    #[test]
    fn audio_options_extract_fixed_codec() {
        let settings = FetcherConfig::default();
        let options = FetchOptions::for_job(
            MediaFormat::Audio,
            Some("1080p"),
            &settings,
            Path::new("/data"),
        );

        assert_eq!(options.format_selector, "bestaudio/best");
        assert_eq!(
            options.post_process,
            PostProcess::ExtractAudio {
                codec: "mp3".to_string(),
                quality: "192".to_string(),
            }
        );
        assert_eq!(options.output_template, PathBuf::from("/data/%(title)s.%(ext)s"));
        assert_eq!(options.retries, 3);
        assert!(options.no_playlist);
    }

    #[test]
    fn video_options_apply_height_ceiling() {
        let settings = FetcherConfig::default();
        let options =
            FetchOptions::for_job(MediaFormat::Video, Some("720p"), &settings, Path::new("d"));

        assert_eq!(
            options.format_selector,
            "bestvideo[ext=mp4][vcodec^=avc1][height<=720]+bestaudio[ext=m4a]/best"
        );
        assert_eq!(
            options.post_process,
            PostProcess::ConvertVideo {
                container: "mp4".to_string()
            }
        );
        assert_eq!(options.merge_output_format.as_deref(), Some("mp4"));
    }

    #[test]
    fn unknown_resolution_has_no_ceiling() {
        let settings = FetcherConfig::default();
        for hint in [None, Some("potato")] {
            let options = FetchOptions::for_job(MediaFormat::Video, hint, &settings, Path::new("d"));
            assert_eq!(
                options.format_selector,
                "bestvideo[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]/best"
            );
        }
    }

    #[test]
    fn missing_cookies_file_is_skipped() {
        let settings = FetcherConfig {
            cookies_file: Some(PathBuf::from("/definitely/not/here/cookies.txt")),
            external_downloader: Some("aria2c".to_string()),
            external_downloader_args: vec!["-x".to_string(), "16".to_string()],
            ..FetcherConfig::default()
        };
        let options = FetchOptions::for_job(MediaFormat::Video, None, &settings, Path::new("d"));

        assert!(options.cookies_file.is_none());
        assert_eq!(
            options.external_downloader,
            Some(ExternalDownloader {
                name: "aria2c".to_string(),
                args: vec!["-x".to_string(), "16".to_string()],
            })
        );
    }

    #[test]
    fn format_accepts_legacy_spellings() {
        let audio: MediaFormat = serde_json::from_str("\"mp3\"").unwrap();
        let video: MediaFormat = serde_json::from_str("\"mp4\"").unwrap();
        let plain: MediaFormat = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(audio, MediaFormat::Audio);
        assert_eq!(video, MediaFormat::Video);
        assert_eq!(plain, MediaFormat::Audio);
        assert!(serde_json::from_str::<MediaFormat>("\"gif\"").is_err());
        assert_eq!(MediaFormat::default(), MediaFormat::Video);
    }
}
