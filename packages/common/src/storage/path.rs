use chrono::{DateTime, Utc};

use super::error::StorageError;

const MAX_PATH_LEN: usize = 255;
const MAX_EXTENSION_LEN: usize = 10;
const FALLBACK_EXTENSION: &str = "mp4";

/// Validates a flat object path (no directory components, conservative charset).
pub fn validate_object_path(path: &str) -> Result<&str, StorageError> {
    if path.is_empty() {
        return Err(StorageError::InvalidPath("path cannot be empty".into()));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(StorageError::InvalidPath(format!(
            "path exceeds {MAX_PATH_LEN} characters"
        )));
    }
    if path.starts_with('.') {
        return Err(StorageError::InvalidPath(
            "hidden paths (starting with '.') are not allowed".into(),
        ));
    }
    if !path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(StorageError::InvalidPath(
            "path may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    Ok(path)
}

/// True for any `video/*` media type, parameters ignored.
pub fn is_video_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .and_then(|essence| essence.split_once('/'))
        .is_some_and(|(top, sub)| top.eq_ignore_ascii_case("video") && !sub.is_empty())
}

/// Derive the storage path for a chapter's video.
///
/// `chapter_{id}_{unix_millis}.{ext}`. The extension comes from the uploaded
/// filename when it is sane, otherwise from the media type.
pub fn chapter_video_path(
    chapter_id: i32,
    at: DateTime<Utc>,
    filename: Option<&str>,
    content_type: &str,
) -> String {
    let from_name = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });
    let ext = from_name
        .or_else(|| {
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    format!("chapter_{chapter_id}_{}.{ext}", at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn video_types_are_recognised() {
        assert!(is_video_content_type("video/mp4"));
        assert!(is_video_content_type("Video/WebM; codecs=vp9"));
        assert!(!is_video_content_type("image/png"));
        assert!(!is_video_content_type("video/"));
        assert!(!is_video_content_type("application/octet-stream"));
        assert!(!is_video_content_type(""));
    }

    #[test]
    fn path_uses_filename_extension() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            chapter_video_path(7, at, Some("Lecture 1.MOV"), "video/quicktime"),
            "chapter_7_1700000000123.mov"
        );
    }

    #[test]
    fn path_falls_back_to_media_type_then_default() {
        let at = Utc.timestamp_millis_opt(5).unwrap();
        let p = chapter_video_path(1, at, Some("no-extension"), "video/webm");
        assert_eq!(p, "chapter_1_5.webm");
        let p = chapter_video_path(1, at, None, "video/x-unknown-thing");
        assert_eq!(p, "chapter_1_5.mp4");
    }

    #[test]
    fn derived_paths_are_valid_object_paths() {
        let at = Utc::now();
        let p = chapter_video_path(42, at, Some("../../etc/passwd.mp4"), "video/mp4");
        assert!(validate_object_path(&p).is_ok());
    }

    #[test]
    fn traversal_and_separators_are_rejected() {
        assert!(validate_object_path("../x.mp4").is_err());
        assert!(validate_object_path("a/b.mp4").is_err());
        assert!(validate_object_path(".hidden").is_err());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("chapter_1_2.mp4").is_ok());
    }
}
