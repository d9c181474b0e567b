//! Local path ↔ `file:///` URI conversion.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ConvertError;

const FILE_SCHEME: &str = "file:";
const FILE_PREFIX: &str = "file:///";

/// Build a `file:///` URI from a local path in either separator convention.
///
/// Backslashes become forward slashes and leading slashes are folded into
/// the prefix, so `C:\a\b.xmi` and `/a/b.xmi` give `file:///C:/a/b.xmi` and
/// `file:///a/b.xmi`. The result is checked with [`Url::parse`] and then
/// returned as built.
///
/// # Example
/// ```
/// use modelconv_core::file_uri;
/// assert_eq!(file_uri(r"C:\a\b.xmi").unwrap(), "file:///C:/a/b.xmi");
/// ```
pub fn file_uri(path: &str) -> Result<String, ConvertError> {
    let normalized = path.replace('\\', "/");
    let uri = format!("{FILE_PREFIX}{}", normalized.trim_start_matches('/'));
    Url::parse(&uri).map_err(|source| ConvertError::InvalidUri {
        uri: uri.clone(),
        source,
    })?;
    Ok(uri)
}

/// `file:///` URI of a local path, made absolute against the working
/// directory first.
pub fn resolve_file_uri(path: &Path) -> Result<String, ConvertError> {
    let absolute = std::path::absolute(path).map_err(|source| ConvertError::UnresolvablePath {
        path: path.to_path_buf(),
        source,
    })?;
    file_uri(&absolute.to_string_lossy())
}

/// Turn a URI or plain path back into a filesystem path.
///
/// The `file:` scheme and its slashes are stripped as plain text. Nothing
/// is decoded, so `#`, `?` and `%` stay part of the file name, mirroring
/// [`file_uri`], which never encodes them.
pub fn to_file_path(uri_or_path: &str) -> PathBuf {
    let Some(rest) = uri_or_path.strip_prefix(FILE_SCHEME) else {
        return PathBuf::from(uri_or_path);
    };
    let rest = rest.trim_start_matches('/');
    if has_drive_letter(rest) {
        PathBuf::from(rest)
    } else {
        PathBuf::from(format!("/{rest}"))
    }
}

/// `C:` or `C:/...`
fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/')
}
