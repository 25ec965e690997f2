use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

/// Canonical portrait frame all downstream logic operates on.
pub const PORTRAIT_WIDTH: u32 = 720;
pub const PORTRAIT_HEIGHT: u32 = 1280;

const JPEG_QUALITY: u8 = 90;

/// Deterministic center-crop of an arbitrary-aspect frame to the canonical
/// 9:16 portrait, rendered at exactly 720x1280 with one bilinear resample
/// and encoded as JPEG. Re-applying to an already-canonical frame changes
/// nothing but the encoder pass.
pub fn crop_to_portrait(frame: &[u8]) -> Result<Vec<u8>> {
    let source = image::load_from_memory(frame).context("failed to decode captured frame")?;
    let (src_w, src_h) = (source.width(), source.height());
    let (x, y, w, h) = portrait_crop_rect(src_w, src_h);
    let cropped = source.crop_imm(x, y, w, h);
    let canonical = if cropped.width() == PORTRAIT_WIDTH && cropped.height() == PORTRAIT_HEIGHT {
        cropped
    } else {
        cropped.resize_exact(PORTRAIT_WIDTH, PORTRAIT_HEIGHT, FilterType::Triangle)
    };
    encode_jpeg(&canonical)
}

/// Same as `crop_to_portrait`, returned as the canonical boundary
/// representation (`data:image/jpeg` URL).
pub fn crop_to_portrait_data_uri(frame: &[u8]) -> Result<String> {
    let bytes = crop_to_portrait(frame)?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)))
}

/// The centered source rectangle matching the portrait aspect: wider sources
/// lose width, taller sources lose height, equal-aspect sources pass through.
pub fn portrait_crop_rect(src_w: u32, src_h: u32) -> (u32, u32, u32, u32) {
    let target_aspect = f64::from(PORTRAIT_WIDTH) / f64::from(PORTRAIT_HEIGHT);
    let src_aspect = f64::from(src_w) / f64::from(src_h);

    if src_aspect > target_aspect {
        let crop_w = (f64::from(src_h) * target_aspect).round() as u32;
        let x = (src_w.saturating_sub(crop_w)) / 2;
        (x, 0, crop_w.min(src_w), src_h)
    } else if src_aspect < target_aspect {
        let crop_h = (f64::from(src_w) / target_aspect).round() as u32;
        let y = (src_h.saturating_sub(crop_h)) / 2;
        (0, y, src_w, crop_h.min(src_h))
    } else {
        (0, 0, src_w, src_h)
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .context("failed to encode canonical frame as JPEG")?;
    Ok(out)
}
