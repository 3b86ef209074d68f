use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{SeeClickError, SeeClickResult};
use crate::perception::traits::ScreenCapturer;
use crate::perception::types::{Frame, FrameSize};

/// Captures the primary monitor with `xcap`.
pub struct XcapCapturer {
    max_width: u32,
}

impl XcapCapturer {
    pub fn new(max_width: u32) -> Self {
        Self { max_width }
    }
}

#[async_trait]
impl ScreenCapturer for XcapCapturer {
    async fn capture(&self) -> SeeClickResult<Frame> {
        let max_width = self.max_width;
        tokio::task::spawn_blocking(move || capture_primary(max_width))
            .await
            .map_err(|e| SeeClickError::Perception(format!("capture task failed: {e}")))?
    }
}

fn capture_primary(max_width: u32) -> SeeClickResult<Frame> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| SeeClickError::Perception(format!("list monitors: {e}")))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary())
        .or_else(|| monitors.first())
        .ok_or_else(|| SeeClickError::Perception("no monitor found".into()))?;

    let screen = FrameSize::new(monitor.width(), monitor.height());
    let captured = monitor
        .capture_image()
        .map_err(|e| SeeClickError::Perception(format!("capture: {e}")))?;

    tracing::debug!(
        screen = %screen,
        image = %format!("{}x{}", captured.width(), captured.height()),
        "screen captured"
    );

    encode_frame(image::DynamicImage::ImageRgba8(captured), screen, max_width)
}

/// Downscale `img` to at most `max_width` pixels wide (aspect ratio kept,
/// never upscaled) and encode it as base64 PNG.
pub fn encode_frame(
    img: image::DynamicImage,
    screen: FrameSize,
    max_width: u32,
) -> SeeClickResult<Frame> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(SeeClickError::Perception("empty screenshot".into()));
    }

    let resized = if w > max_width {
        let new_h = ((h as f64 * (max_width as f64 / w as f64)) as u32).max(1);
        img.resize_exact(max_width, new_h, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut png_bytes = Vec::new();
    resized
        .write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| SeeClickError::Perception(format!("PNG encode: {e}")))?;

    Ok(Frame {
        image_base64: base64::engine::general_purpose::STANDARD.encode(&png_bytes),
        sent: FrameSize::new(resized.width(), resized.height()),
        screen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blank(w: u32, h: u32) -> image::DynamicImage {
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(w, h))
    }

    #[test]
    fn wide_frames_are_downscaled_proportionally() {
        let frame = encode_frame(blank(400, 300), FrameSize::new(400, 300), 200).unwrap();
        assert_eq!(frame.sent, FrameSize::new(200, 150));
        assert_eq!(frame.screen, FrameSize::new(400, 300));
    }

    #[test]
    fn small_frames_are_not_upscaled() {
        let frame = encode_frame(blank(120, 80), FrameSize::new(240, 160), 200).unwrap();
        assert_eq!(frame.sent, FrameSize::new(120, 80));
        assert_eq!(frame.screen, FrameSize::new(240, 160));
    }

    #[test]
    fn height_never_collapses_to_zero() {
        let frame = encode_frame(blank(1000, 1), FrameSize::new(1000, 1), 100).unwrap();
        assert_eq!(frame.sent, FrameSize::new(100, 1));
    }

    #[test]
    fn encoded_payload_is_a_decodable_png() {
        let frame = encode_frame(blank(64, 32), FrameSize::new(64, 32), 1280).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&frame.image_base64)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
        assert!(frame.data_url().starts_with("data:image/png;base64,"));
    }
}
