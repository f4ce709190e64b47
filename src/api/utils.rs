//! API utility functions
//!
//! Pure, stateless helpers for HTTP request and response processing.

use axum::http::HeaderValue;

use crate::api::error::ApiError;

/// Parses and validates Content-Type header for application/json
///
/// Accepts:
/// - `application/json`
/// - `application/json; charset=utf-8`
///
/// Rejects:
/// - `application/jsonp`
/// - `application/json-patch+json`
/// - `text/json`
/// - Malformed media types
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// `Content-Disposition: attachment` for `filename`.
///
/// Titles come from remote metadata, so quotes, backslashes and control
/// characters are replaced and non-ASCII names also get an RFC 5987
/// `filename*` parameter.
pub fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    let value = if filename.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=utf-8").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("application/json-patch+json").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("text/plain").is_err());
        assert!(parse_content_type("invalid").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("My \"Song\".mp3"),
            "attachment; filename=\"My _Song_.mp3\""
        );
    }

    #[test]
    fn test_content_disposition_unicode() {
        let value = content_disposition("Café.mp4");
        let value = value.to_str().unwrap();
        assert!(value.starts_with("attachment; filename=\"Caf_.mp4\""));
        assert!(value.ends_with("filename*=UTF-8''Caf%C3%A9.mp4"));
    }

    #[test]
    fn test_content_disposition_encodes_reserved_bytes() {
        let value = content_disposition("Ünïcode クリップ (live).mp4");
        let value = value.to_str().unwrap();
        let (_, encoded) = value.split_once("filename*=UTF-8''").unwrap();

        // spaces, parentheses and multi-byte characters are all escaped
        assert!(encoded.starts_with("%C3%9Cn%C3%AFcode%20"));
        assert!(encoded.ends_with("%20%28live%29.mp4"));
        assert!(!encoded.contains(' '));
    }
}
