//! Image ingestion: raw bytes in, placeable image object out.
//!
//! Where the bytes came from (file picker, clipboard, drag and drop) is the
//! caller's business. Deciding whether the result still belongs on the
//! scene is the workspace's.

use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;

use super::{ImageItem, SceneObject, Transform};
use crate::error::{EaselError, Result};

/// Where freshly ingested images land on the canvas.
const DROP_OFFSET: f64 = 40.0;

fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Decode `bytes`, read the natural size and embed them as a `data:` URL.
pub fn decode_image(bytes: &[u8]) -> Result<ImageItem> {
    let format = image::guess_format(bytes).map_err(|e| EaselError::ImageDecode(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| EaselError::ImageDecode(e.to_string()))?;
    let (width, height) = decoded.to_rgba8().dimensions();

    if width == 0 || height == 0 {
        return Err(EaselError::ImageDecode("image has no pixels".to_string()));
    }

    Ok(ImageItem {
        src: format!(
            "data:{};base64,{}",
            mime_type(format),
            general_purpose::STANDARD.encode(bytes)
        ),
        width,
        height,
    })
}

/// Decode the bytes back out of an image item's `data:` URL.
pub fn data_url_bytes(src: &str) -> Result<Vec<u8>> {
    let payload = src
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| EaselError::ImageDecode("image source is not a base64 data URL".to_string()))?;

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| EaselError::ImageDecode(e.to_string()))
}

/// Wrap a decoded image in a scene object, scaled down to `max_width`.
pub fn place(image: ImageItem, max_width: u32) -> SceneObject {
    let scale = if max_width > 0 && image.width > max_width {
        max_width as f64 / image.width as f64
    } else {
        1.0
    };

    let transform = Transform {
        scale_x: scale,
        scale_y: scale,
        ..Transform::at(DROP_OFFSET, DROP_OFFSET)
    };
    SceneObject::image(image, transform)
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_reads_dimensions() {
        let item = decode_image(&png_bytes(3, 2)).unwrap();
        assert_eq!((item.width, item.height), (3, 2));
        assert!(item.src.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_data_url_round_trip() {
        let bytes = png_bytes(1, 1);
        let item = decode_image(&bytes).unwrap();
        assert_eq!(data_url_bytes(&item.src).unwrap(), bytes);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(EaselError::ImageDecode(_))));
    }

    #[test]
    fn test_non_data_url_rejected() {
        assert!(data_url_bytes("https://example.com/cat.png").is_err());
    }

    #[test]
    fn test_place_scales_wide_images_down() {
        let item = ImageItem {
            src: String::new(),
            width: 960,
            height: 100,
        };
        let object = place(item, 480);
        assert_eq!(object.transform.scale_x, 0.5);
        assert_eq!(object.transform.scale_y, 0.5);
        assert!(object.flags.is_interactive());
    }

    #[test]
    fn test_place_keeps_small_images_at_natural_size() {
        let item = ImageItem {
            src: String::new(),
            width: 100,
            height: 100,
        };
        let object = place(item, 480);
        assert_eq!(object.transform.scale_x, 1.0);
        assert_eq!(object.transform.left, DROP_OFFSET);
    }
}
