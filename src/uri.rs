//! Decoding of `text/uri-list` drop payloads.
//!
//! Most file managers advertise dropped files as a `text/uri-list`: one
//! percent-encoded `file://` URI per CRLF-separated line. This turns such a
//! payload into paths for destinations that accept file drops. Paths are
//! returned as written; whether they exist is the destination's business.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::str::Utf8Error;

use percent_encoding::percent_decode;

#[derive(Debug)]
pub enum UriListParseError {
    EmptyData,
    InvalidUtf8(Utf8Error),
    /// The URI names a remote host; only local files are supported.
    HostnameSpecified(String),
    /// The URI uses a scheme other than `file`.
    UnexpectedProtocol(String),
}

impl From<Utf8Error> for UriListParseError {
    fn from(err: Utf8Error) -> Self {
        UriListParseError::InvalidUtf8(err)
    }
}

impl fmt::Display for UriListParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriListParseError::EmptyData => write!(f, "empty uri-list payload"),
            UriListParseError::InvalidUtf8(err) => write!(f, "invalid utf-8: {err}"),
            UriListParseError::HostnameSpecified(host) => {
                write!(f, "uri names a remote host: {host}")
            },
            UriListParseError::UnexpectedProtocol(uri) => {
                write!(f, "unsupported uri scheme: {uri}")
            },
        }
    }
}

impl Error for UriListParseError {}

/// Decodes a `text/uri-list` payload into local paths.
pub fn parse_uri_list(data: &[u8]) -> Result<Vec<PathBuf>, UriListParseError> {
    if data.is_empty() {
        return Err(UriListParseError::EmptyData);
    }

    let decoded = percent_decode(data).decode_utf8()?.into_owned();
    let mut paths = Vec::new();
    for uri in decoded.split("\r\n").filter(|uri| !uri.is_empty()) {
        // The format is protocol://host/path, but in practice almost always
        // protocol:///path.
        let path = match uri.strip_prefix("file://") {
            Some(rest) if rest.starts_with('/') => rest,
            Some(rest) => {
                return Err(UriListParseError::HostnameSpecified(rest.to_owned()));
            },
            None => return Err(UriListParseError::UnexpectedProtocol(uri.to_owned())),
        };
        paths.push(PathBuf::from(path));
    }
    Ok(paths)
}
