//! MIME and filename inference for downloaded media.

use url::Url;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Map a file extension to its MIME type.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "csv" => Some("text/csv"),
        "txt" => Some("text/plain"),
        "zip" => Some("application/zip"),
        "mp3" => Some("audio/mpeg"),
        "ogg" | "oga" | "opus" => Some("audio/ogg"),
        "m4a" => Some("audio/mp4"),
        "wav" => Some("audio/wav"),
        "mp4" => Some("video/mp4"),
        "3gp" => Some("video/3gpp"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

/// Last non-empty path segment of `url`, if any.
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pick the MIME type for a download: a specific `Content-Type` wins, then
/// the filename extension, then `application/octet-stream`.
pub fn resolve_mime(content_type: Option<&str>, filename: Option<&str>) -> String {
    let header = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != FALLBACK_MIME);
    if let Some(ct) = header {
        return ct;
    }

    filename
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| mime_from_extension(ext))
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}
