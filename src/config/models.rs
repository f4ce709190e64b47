use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound for a `POST /download` body
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000))
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

/// Where artifacts land and how much one request may submit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,
    /// Maximum number of jobs accepted in a single request
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
            max_batch: default_max_batch(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_batch() -> usize {
    10
}

/// External fetcher (yt-dlp) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    /// Audio bitrate in kbps
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    #[serde(default = "default_video_container")]
    pub video_container: String,
    /// Netscape-format cookies file, passed only when it exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<PathBuf>,
    /// e.g. "aria2c"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_downloader: Option<String>,
    #[serde(default)]
    pub external_downloader_args: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            retries: default_retries(),
            audio_codec: default_audio_codec(),
            audio_quality: default_audio_quality(),
            video_container: default_video_container(),
            cookies_file: None,
            external_downloader: None,
            external_downloader_args: Vec::new(),
        }
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_audio_codec() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "192".to_string()
}

fn default_video_container() -> String {
    "mp4".to_string()
}
