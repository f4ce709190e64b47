//! Translation of fetcher progress reports into a percentage.

/// Raw progress as reported by the fetcher. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgress {
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub percent_str: Option<String>,
}

impl DownloadProgress {
    /// Completion percentage in `[0, 100]`.
    ///
    /// Byte counts win when both are known; otherwise the fetcher's own
    /// percent string is parsed.
    pub fn percentage(&self) -> Option<f64> {
        match (self.downloaded_bytes, self.total_bytes) {
            (Some(downloaded), Some(total)) if total > 0 => {
                Some((downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
            }
            _ => self.percent_str.as_deref().and_then(parse_percent_str),
        }
    }
}

/// Parse a percent string such as `" 42.5%"`.
///
/// ANSI escape sequences and surrounding whitespace are stripped, a trailing
/// `%` is optional and the value is clamped to `[0, 100]`. Placeholders like
/// `NA` yield `None`.
pub fn parse_percent_str(raw: &str) -> Option<f64> {
    let cleaned = strip_ansi(raw);
    let number = cleaned.trim().trim_end_matches('%').trim();
    let value: f64 = number.parse().ok()?;
    if value.is_nan() {
        return None;
    }
    Some(value.clamp(0.0, 100.0))
}

fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // CSI sequence: ESC '[' params final-byte
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(ch);
        }
    }
    out
}
