/// Image inspection and processing for uploads
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, ImageFormat};
use std::io::Cursor;

/// Thumbnail bounding box in pixels
pub const THUMBNAIL_SIZE: u32 = 300;

const JPEG_QUALITY: u8 = 85;

/// MIME types accepted for upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "video/mov",
    "video/avi",
    "video/x-msvideo",
    "video/webm",
];

/// Check whether a MIME type is on the upload allowlist
pub fn is_allowed_mime(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

/// Check whether a MIME type is a still image we can decode
pub fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Check whether a MIME type is a video
pub fn is_video(mime_type: &str) -> bool {
    mime_type.starts_with("video/")
}

/// Extract width and height from image bytes.
///
/// Returns (0, 0) when the bytes cannot be decoded, videos included.
pub fn extract_dimensions(data: &[u8], mime_type: &str) -> (u32, u32) {
    if !is_image(mime_type) {
        return (0, 0);
    }

    match image::load_from_memory(data) {
        Ok(img) => (img.width(), img.height()),
        Err(e) => {
            tracing::warn!("Failed to decode image for dimensions: {}", e);
            (0, 0)
        }
    }
}

/// Generate a thumbnail for an image, preserving aspect ratio within
/// a THUMBNAIL_SIZE bounding box. Re-encodes in the source format so
/// the thumbnail can share the original's extension and MIME type.
///
/// Returns None for videos and undecodable images.
pub fn generate_thumbnail(data: &[u8], mime_type: &str) -> Option<Vec<u8>> {
    if !is_image(mime_type) {
        return None;
    }

    let format = format_for_mime(mime_type)?;

    match image::load_from_memory(data) {
        Ok(img) => {
            // Only shrink; images already inside the box keep their size
            let thumb = if img.width() <= THUMBNAIL_SIZE && img.height() <= THUMBNAIL_SIZE {
                img
            } else {
                img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
            };

            let mut cursor = Cursor::new(Vec::new());
            match thumb.write_to(&mut cursor, format) {
                Ok(()) => Some(cursor.into_inner()),
                Err(e) => {
                    tracing::warn!("Failed to encode thumbnail: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to generate thumbnail: {}", e);
            None
        }
    }
}

/// Re-encode an image to shrink it before storage.
///
/// PNG gets maximum compression, JPEG is re-encoded at quality 85.
/// GIF and WebP pass through untouched (re-encoding would drop
/// animation frames or inflate size), as do videos and anything
/// that fails to decode.
pub fn optimize_image(data: Vec<u8>, mime_type: &str) -> Vec<u8> {
    let optimized = match mime_type {
        "image/png" => reencode_png(&data),
        "image/jpeg" | "image/jpg" => reencode_jpeg(&data),
        _ => None,
    };

    match optimized {
        // Keep the original when re-encoding did not help
        Some(out) if out.len() < data.len() => out,
        _ => data,
    }
}

fn format_for_mime(mime_type: &str) -> Option<ImageFormat> {
    match mime_type {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

fn reencode_png(data: &[u8]) -> Option<Vec<u8>> {
    let img = image::load_from_memory(data).ok()?;
    let mut out = Vec::new();

    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut out),
        CompressionType::Best,
        FilterType::Adaptive,
    );
    encoder
        .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
        .ok()?;

    Some(out)
}

fn reencode_jpeg(data: &[u8]) -> Option<Vec<u8>> {
    let img = image::load_from_memory(data).ok()?;
    let mut out = Vec::new();

    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), JPEG_QUALITY);
    encoder.encode_image(&img).ok()?;

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 80, 200]),
        ));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_mime_allowlist() {
        assert!(is_allowed_mime("image/png"));
        assert!(is_allowed_mime("video/mp4"));
        // Non-standard spellings some clients send for mov/avi
        assert!(is_allowed_mime("video/mov"));
        assert!(is_allowed_mime("video/avi"));
        assert!(is_allowed_mime("video/quicktime"));
        assert!(is_allowed_mime("video/x-msvideo"));
        assert!(!is_allowed_mime("application/pdf"));
        assert!(!is_allowed_mime("image/svg+xml"));
    }

    #[test]
    fn test_extract_dimensions() {
        let data = sample_png(64, 48);
        assert_eq!(extract_dimensions(&data, "image/png"), (64, 48));
    }

    #[test]
    fn test_extract_dimensions_video_is_zero() {
        assert_eq!(extract_dimensions(b"not an image", "video/mp4"), (0, 0));
    }

    #[test]
    fn test_thumbnail_fits_bounding_box() {
        let data = sample_png(900, 600);
        let thumb = generate_thumbnail(&data, "image/png").unwrap();

        let img = image::load_from_memory(&thumb).unwrap();
        assert!(img.width() <= THUMBNAIL_SIZE);
        assert!(img.height() <= THUMBNAIL_SIZE);
        // Aspect ratio is preserved
        assert_eq!(img.width(), 300);
        assert_eq!(img.height(), 200);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let data = sample_png(100, 80);
        let thumb = generate_thumbnail(&data, "image/png").unwrap();

        let img = image::load_from_memory(&thumb).unwrap();
        assert_eq!((img.width(), img.height()), (100, 80));
    }

    #[test]
    fn test_no_thumbnail_for_video() {
        assert!(generate_thumbnail(b"video bytes", "video/mp4").is_none());
    }

    #[test]
    fn test_optimize_passes_through_video() {
        let data = b"video bytes".to_vec();
        assert_eq!(optimize_image(data.clone(), "video/mp4"), data);
    }

    #[test]
    fn test_optimize_never_grows_output() {
        let data = sample_png(200, 200);
        let out = optimize_image(data.clone(), "image/png");
        assert!(out.len() <= data.len());
    }
}
