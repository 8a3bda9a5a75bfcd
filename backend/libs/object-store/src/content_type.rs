//! Content-type resolution for packaged streaming artifacts

use std::path::Path;

/// Resolve the content type for an artifact by file extension.
///
/// The streaming-specific types come first; anything unknown is served as an
/// opaque byte stream.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") => "video/mp4",
        Some("m4s") => "video/iso.segment",
        Some("mpd") => "application/dash+xml",
        Some("json") => "application/json",
        Some("html") => "text/html",
        Some("txt") => "text/plain",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_streaming_artifact_types() {
        assert_eq!(
            content_type_for_path(&PathBuf::from("master.m3u8")),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("seg/chunk-001.ts")),
            "video/mp2t"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("chunk-0001.m4s")),
            "video/iso.segment"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("stream.mpd")),
            "application/dash+xml"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("video.mp4")),
            "video/mp4"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("info.json")),
            "application/json"
        );
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert_eq!(
            content_type_for_path(&PathBuf::from("MASTER.M3U8")),
            "application/vnd.apple.mpegurl"
        );
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        assert_eq!(
            content_type_for_path(&PathBuf::from("file.unknown")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("no_extension")),
            "application/octet-stream"
        );
    }
}
