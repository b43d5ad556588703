//! Local media files → upload payloads.
//!
//! Post bodies inline each attachment as a data URL plus whatever metadata
//! the client could extract. Dimension probing works for the image formats
//! the backend accepts; video files upload without dimensions or duration
//! (the metadata is best-effort and the server re-derives it anyway).

use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::GenericImageView;

use crate::ApiError;
use crate::types::MediaUpload;

/// A local file read and classified for upload.
#[derive(Debug, Clone)]
pub struct LoadedMedia {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

/// Read a file for upload. Returns `None` for types the backend does not
/// accept, mirroring the console's skip-with-a-log behavior.
pub fn load_media_file(path: &Path) -> Result<Option<LoadedMedia>, ApiError> {
    let Some(mime_type) = mime_for_extension(path) else {
        tracing::warn!(path = %path.display(), "media.skip_unsupported");
        return Ok(None);
    };
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Media(format!("unusable file name: {}", path.display())))?;
    Ok(Some(LoadedMedia {
        file_name,
        mime_type: mime_type.to_string(),
        bytes,
    }))
}

/// Build the `POST /v1/posts` attachment payload for one local file.
/// Returns `None` for unsupported types.
pub fn upload_from_file(path: &Path) -> Result<Option<MediaUpload>, ApiError> {
    let Some(media) = load_media_file(path)? else {
        return Ok(None);
    };

    let (width, height) = if media.mime_type.starts_with("image/") {
        match image::load_from_memory(&media.bytes) {
            Ok(img) => {
                let (w, h) = img.dimensions();
                (Some(w), Some(h))
            }
            Err(e) => {
                tracing::warn!(file = %media.file_name, error = %e, "media.meta_unreadable");
                (None, None)
            }
        }
    } else {
        tracing::warn!(file = %media.file_name, "media.video_meta_unavailable");
        (None, None)
    };

    let data_url = format!(
        "data:{};base64,{}",
        media.mime_type,
        BASE64.encode(&media.bytes)
    );

    Ok(Some(MediaUpload {
        data_url,
        mime_type: Some(media.mime_type),
        width,
        height,
        duration_ms: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn extensions_map_to_mime_types() {
        assert_eq!(mime_for_extension(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_for_extension(Path::new("b.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_extension(Path::new("c.mp4")), Some("video/mp4"));
        assert_eq!(mime_for_extension(Path::new("d.txt")), None);
        assert_eq!(mime_for_extension(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_files_are_skipped_not_errors() {
        let dir = std::env::temp_dir();
        let p = dir.join("perch-media-test.txt");
        std::fs::write(&p, b"not media").unwrap();
        assert!(load_media_file(&p).unwrap().is_none());
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn image_uploads_carry_dimensions_and_a_data_url() {
        let img = image::RgbaImage::new(2, 3);
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let dir = std::env::temp_dir();
        let p = dir.join("perch-media-test.png");
        std::fs::write(&p, &png).unwrap();

        let up = upload_from_file(&p).unwrap().expect("supported");
        assert_eq!(up.width, Some(2));
        assert_eq!(up.height, Some(3));
        assert_eq!(up.mime_type.as_deref(), Some("image/png"));
        assert!(up.data_url.starts_with("data:image/png;base64,"));

        let _ = std::fs::remove_file(&p);
    }
}
