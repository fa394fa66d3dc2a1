//! Resolution of `src`/`url(...)` references against a document base URI.

use std::fmt;
use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

/// Reasons a referenced resource could not be fetched.
#[derive(Debug)]
pub enum ResourceError {
    /// Neither the reference nor the base URI form a valid URL.
    InvalidUrl(String),
    /// The scheme is not `file` or `data`.
    UnsupportedScheme(String),
    /// The `file` URL could not be read.
    Unreadable(String, std::io::Error),
    /// A `data:` URL was malformed.
    InvalidData(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "invalid URL '{url}'"),
            Self::UnsupportedScheme(url) => write!(f, "unsupported URL scheme in '{url}'"),
            Self::Unreadable(url, err) => write!(f, "could not read '{url}': {err}"),
            Self::InvalidData(reason) => write!(f, "malformed data URL: {reason}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unreadable(_, err) => Some(err),
            _ => None,
        }
    }
}

/// Resolves `reference` against `base_uri`.
pub fn resolve(base_uri: &str, reference: &str) -> Result<Url, ResourceError> {
    let reference = reference.trim();
    if let Ok(url) = Url::parse(reference) {
        return Ok(url);
    }
    Url::parse(base_uri)
        .and_then(|base| base.join(reference))
        .map_err(|_| ResourceError::InvalidUrl(reference.to_owned()))
}

/// Resolves `reference` and returns the bytes it points to.
pub fn fetch(base_uri: &str, reference: &str) -> Result<Vec<u8>, ResourceError> {
    let url = resolve(base_uri, reference)?;
    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| ResourceError::InvalidUrl(url.to_string()))?;
            fs::read(&path).map_err(|err| ResourceError::Unreadable(url.to_string(), err))
        }
        "data" => decode_data_url(url.as_str()),
        _ => Err(ResourceError::UnsupportedScheme(url.to_string())),
    }
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, ResourceError> {
    let body = url
        .strip_prefix("data:")
        .ok_or_else(|| ResourceError::InvalidData("missing data: prefix".into()))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| ResourceError::InvalidData("missing ',' separator".into()))?;

    if header.ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|err| ResourceError::InvalidData(err.to_string()))
    } else {
        Ok(percent_decode(payload))
    }
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let hex = &bytes[index + 1..index + 3];
            let parsed = std::str::from_utf8(hex)
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(value) = parsed {
                out.push(value);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_reference_against_directory() {
        let url = resolve("file:///fixtures/testcases/", "images/flower.png").unwrap();
        assert_eq!(url.as_str(), "file:///fixtures/testcases/images/flower.png");
    }

    #[test]
    fn decodes_base64_data_url() {
        let bytes = fetch("file:///tmp/", "data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decodes_percent_encoded_data_url() {
        let bytes = fetch("file:///tmp/", "data:text/plain,a%20b").unwrap();
        assert_eq!(bytes, b"a b");
    }

    #[test]
    fn rejects_remote_urls() {
        let err = fetch("file:///tmp/", "https://example.com/a.png").unwrap_err();
        assert!(matches!(err, ResourceError::UnsupportedScheme(_)));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = fetch("file:///tmp/", "definitely-not-here-1234.png").unwrap_err();
        assert!(matches!(err, ResourceError::Unreadable(..)));
    }
}
