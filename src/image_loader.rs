//! # Image Loading and Decoding
//!
//! Loads images from file paths, data URIs or raw base64 strings. JPEG data
//! is kept as-is (backends can embed it with DCTDecode); PNG is decoded to
//! RGB pixels plus an optional alpha channel. Failures name the offending
//! source as `InvalidResource`.

use std::io::Cursor;
use std::path::Path;

use crate::error::{QuireError, Result};

/// A decoded image, sized in pixels.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone)]
pub enum ImagePixelData {
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    Decoded {
        /// width * height * 3 bytes
        rgb: Vec<u8>,
        /// width * height bytes, `None` when fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

/// Load an image from `src`: a `data:image/...;base64,` URI, an existing file
/// path, or raw base64 data.
pub fn load_image(src: &str) -> Result<LoadedImage> {
    let bytes = read_source_bytes(src)?;
    decode_image_bytes(&bytes).map_err(|message| QuireError::invalid_resource(src, message))
}

fn read_source_bytes(src: &str) -> Result<Vec<u8>> {
    if src.trim().is_empty() {
        return Err(QuireError::invalid_resource(src, "empty image source"));
    }

    if let Some(rest) = src.strip_prefix("data:image/") {
        let (_, payload) = rest
            .split_once(',')
            .ok_or_else(|| QuireError::invalid_resource(src, "data URI without payload"))?;
        return base64_decode(src, payload);
    }

    // Explicit path prefixes keep base64 payloads (which may contain '/')
    // from being taken as paths.
    let looks_like_path = src.starts_with('/') || src.starts_with("./") || src.starts_with("../");
    if looks_like_path || Path::new(src).is_file() {
        return std::fs::read(src).map_err(|e| QuireError::invalid_resource_caused_by(src, e));
    }

    base64_decode(src, src)
}

fn base64_decode(src: &str, payload: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| QuireError::invalid_resource_caused_by(src, e))
}

fn decode_image_bytes(data: &[u8]) -> std::result::Result<LoadedImage, String> {
    if data.len() < 4 {
        return Err("image data too short".to_string());
    }
    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) {
        decode_png(data)
    } else {
        Err("unsupported image format (expected JPEG or PNG)".to_string())
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8])
}

fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

fn decode_jpeg(data: &[u8]) -> std::result::Result<LoadedImage, String> {
    let (width, height) = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("JPEG format detection error: {}", e))?
        .into_dimensions()
        .map_err(|e| format!("failed to read JPEG dimensions: {}", e))?;

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: jpeg_color_space(data),
        },
        width_px: width,
        height_px: height,
    })
}

/// Read the component count from the first SOF segment.
fn jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2;
    while i + 3 < data.len() && data[i] == 0xFF {
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            return if data[i + 9] == 1 {
                JpegColorSpace::DeviceGray
            } else {
                JpegColorSpace::DeviceRGB
            };
        }
        let segment = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + segment;
    }
    JpegColorSpace::DeviceRGB
}

fn decode_png(data: &[u8]) -> std::result::Result<LoadedImage, String> {
    let decoded = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("PNG format detection error: {}", e))?
        .decode()
        .map_err(|e| format!("failed to decode PNG: {}", e))?
        .to_rgba8();

    let (width, height) = decoded.dimensions();
    let pixels = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in decoded.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    let opaque = alpha.iter().all(|a| *a == 255);

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: if opaque { None } else { Some(alpha) },
        },
        width_px: width,
        height_px: height,
    })
}
