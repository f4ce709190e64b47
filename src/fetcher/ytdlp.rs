//! yt-dlp backed fetcher
//!
//! Runs the yt-dlp binary as a child process. Progress and the final file
//! path are requested through `--progress-template` and `--print` with
//! distinct prefixes, so each output line can be classified on its own.
//! yt-dlp sends progress to stderr once `--print` is used, so both streams
//! are read.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::options::{FetchOptions, PostProcess};
use super::progress::DownloadProgress;
use super::{FetchError, FetchEvent, FetchOutcome, MediaFetcher, ProgressSink};

const PROGRESS_PREFIX: &str = "nexlify-progress|";
const FILE_PREFIX: &str = "nexlify-file|";
const TITLE_PREFIX: &str = "nexlify-title|";

/// One classified line of yt-dlp output.
#[derive(Debug, Clone, PartialEq)]
enum OutputLine {
    Progress {
        status: String,
        progress: DownloadProgress,
    },
    File(PathBuf),
    Title(String),
    Error(String),
    Other,
}

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: String,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run `<binary> --version`.
    pub async fn check_version(&self) -> Result<String, FetchError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| FetchError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::Failed(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        sink: ProgressSink,
    ) -> Result<FetchOutcome, FetchError> {
        let args = build_args(url, options);
        debug!(binary = %self.binary, ?args, "Spawning yt-dlp");

        let mut child = match Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                let err = FetchError::Spawn {
                    binary: self.binary.clone(),
                    source,
                };
                sink.emit(FetchEvent::Error(err.to_string()));
                return Err(err);
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        } else {
            drop(tx);
        }

        let mut outcome = FetchOutcome::default();
        let mut last_error: Option<String> = None;

        while let Some(line) = rx.recv().await {
            match parse_line(&line) {
                OutputLine::Progress { status, progress } => {
                    // "finished" here closes one part of a merged format;
                    // the job-level finish is emitted after the process exits.
                    if status == "downloading" {
                        sink.emit(FetchEvent::Downloading(progress));
                    }
                }
                OutputLine::File(path) => outcome.filepath = Some(path),
                OutputLine::Title(title) => outcome.title = Some(title),
                OutputLine::Error(message) => {
                    warn!(url, error = %message, "yt-dlp reported an error");
                    last_error = Some(message);
                }
                OutputLine::Other => {}
            }
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(err) => {
                sink.emit(FetchEvent::Error(err.to_string()));
                return Err(FetchError::Io(err));
            }
        };

        if !status.success() {
            let message =
                last_error.unwrap_or_else(|| format!("yt-dlp exited with {status}"));
            sink.emit(FetchEvent::Error(message.clone()));
            return Err(FetchError::Failed(message));
        }

        info!(url, filepath = ?outcome.filepath, "yt-dlp finished");
        sink.emit(FetchEvent::Finished);
        Ok(outcome)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "Failed to read yt-dlp output");
                break;
            }
        }
    }
}

/// Command-line arguments for one fetch.
fn build_args(url: &str, options: &FetchOptions) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    if options.no_playlist {
        args.push("--no-playlist".into());
    }
    args.extend([
        "--newline".into(),
        "--progress".into(),
        "--no-colors".into(),
        "--retries".into(),
        options.retries.to_string(),
        "-f".into(),
        options.format_selector.clone(),
        "-o".into(),
        options.output_template.to_string_lossy().into_owned(),
        "--progress-template".into(),
        format!(
            "download:{PROGRESS_PREFIX}%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress._percent_str)s"
        ),
        "--print".into(),
        format!("after_move:{FILE_PREFIX}%(filepath)s"),
        "--print".into(),
        format!("after_move:{TITLE_PREFIX}%(title)s"),
    ]);

    match &options.post_process {
        PostProcess::ExtractAudio { codec, quality } => {
            args.extend([
                "--extract-audio".into(),
                "--audio-format".into(),
                codec.clone(),
                "--audio-quality".into(),
                format!("{quality}K"),
            ]);
        }
        PostProcess::ConvertVideo { container } => {
            if let Some(merge) = &options.merge_output_format {
                args.extend(["--merge-output-format".into(), merge.clone()]);
            }
            args.extend(["--recode-video".into(), container.clone()]);
        }
    }

    if let Some(cookies) = &options.cookies_file {
        args.extend(["--cookies".into(), cookies.to_string_lossy().into_owned()]);
    }

    if let Some(downloader) = &options.external_downloader {
        args.extend(["--downloader".into(), downloader.name.clone()]);
        if !downloader.args.is_empty() {
            args.extend([
                "--downloader-args".into(),
                format!("{}:{}", downloader.name, downloader.args.join(" ")),
            ]);
        }
    }

    args.push("--".into());
    args.push(url.to_string());
    args
}

fn parse_line(line: &str) -> OutputLine {
    let line = line.trim_end();

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        let mut fields = rest.splitn(4, '|');
        let status = fields.next().unwrap_or_default().to_string();
        let downloaded_bytes = fields.next().and_then(parse_count);
        let total_bytes = fields.next().and_then(parse_count);
        let percent_str = fields
            .next()
            .map(str::trim)
            .filter(|raw| !raw.is_empty() && *raw != "NA")
            .map(str::to_string);
        return OutputLine::Progress {
            status,
            progress: DownloadProgress {
                downloaded_bytes,
                total_bytes,
                percent_str,
            },
        };
    }

    if let Some(path) = line.strip_prefix(FILE_PREFIX) {
        return match path.trim() {
            "" | "NA" => OutputLine::Other,
            path => OutputLine::File(PathBuf::from(path)),
        };
    }

    if let Some(title) = line.strip_prefix(TITLE_PREFIX) {
        return match title.trim() {
            "" | "NA" => OutputLine::Other,
            title => OutputLine::Title(title.to_string()),
        };
    }

    if let Some(message) = line.strip_prefix("ERROR:") {
        return OutputLine::Error(message.trim().to_string());
    }

    OutputLine::Other
}

/// Byte counters may be printed as floats (`1024.0`) or `NA`.
fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .map(|value| value as u64)
    })
}
