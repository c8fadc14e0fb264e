use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::config::Resolution;
use crate::error::RecordError;

/// One raw snapshot as delivered by the capture device: BGRA rows, each `stride`
/// bytes long (rows may be padded past `width * 4`).
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
}

impl CapturedFrame {
    /// Tightly packed BGRA frame.
    pub fn packed(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * 4,
            data,
        }
    }
}

/// A frame ready for the encoder: packed RGB24 at the target resolution.
#[derive(Debug, Clone)]
pub struct Frame {
    pub resolution: Resolution,
    pub data: Vec<u8>,
}

/// Reorders BGRA channels into RGB and drops alpha and row padding.
pub fn bgra_to_rgb(captured: &CapturedFrame) -> Result<RgbImage, RecordError> {
    let (w, h) = (captured.width as usize, captured.height as usize);
    let row_bytes = w * 4;
    if w == 0 || h == 0 {
        return Err(RecordError::Capture(format!("empty frame {}x{}", w, h)));
    }
    if captured.stride < row_bytes
        || captured.data.len() < captured.stride * (h - 1) + row_bytes
    {
        return Err(RecordError::Capture(format!(
            "frame buffer of {} bytes too small for {}x{} with stride {}",
            captured.data.len(),
            w,
            h,
            captured.stride
        )));
    }

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in captured.data.chunks(captured.stride).take(h) {
        rgb.extend(row[..row_bytes].chunks_exact(4).flat_map(|p| [p[2], p[1], p[0]]));
    }

    RgbImage::from_raw(captured.width, captured.height, rgb)
        .ok_or_else(|| RecordError::Capture("converted frame has unexpected length".into()))
}

/// Color-converts a snapshot and stretches it to `target`.
pub fn transform(captured: &CapturedFrame, target: Resolution) -> Result<Frame, RecordError> {
    let rgb = bgra_to_rgb(captured)?;
    let scaled = if rgb.width() == target.width && rgb.height() == target.height {
        rgb
    } else {
        imageops::resize(&rgb, target.width, target.height, FilterType::Triangle)
    };

    Ok(Frame {
        resolution: target,
        data: scaled.into_raw(),
    })
}
