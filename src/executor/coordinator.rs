use crate::agent_engine::state::{ClickAction, ScreenPoint};
use crate::perception::types::FrameSize;

/// Map a click from the downscaled frame onto the real screen.
/// Each axis is scaled by its own ratio and truncated.
pub fn scale_to_screen(click: &ClickAction, sent: FrameSize, screen: FrameSize) -> ScreenPoint {
    let sx = screen.width as f64 / sent.width.max(1) as f64;
    let sy = screen.height as f64 / sent.height.max(1) as f64;

    let x = (click.x as f64 * sx) as u32;
    let y = (click.y as f64 * sy) as u32;

    ScreenPoint {
        x: x.min(screen.width.saturating_sub(1)),
        y: y.min(screen.height.saturating_sub(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn click(x: u32, y: u32) -> ClickAction {
        ClickAction {
            x,
            y,
            reason: String::new(),
        }
    }

    #[test]
    fn hd_frame_maps_onto_full_hd_screen() {
        let p = scale_to_screen(
            &click(640, 360),
            FrameSize::new(1280, 720),
            FrameSize::new(1920, 1080),
        );
        assert_eq!(p, ScreenPoint { x: 960, y: 540 });
    }

    #[test]
    fn identity_ratio_keeps_coordinates() {
        let size = FrameSize::new(1024, 768);
        assert_eq!(
            scale_to_screen(&click(100, 100), size, size),
            ScreenPoint { x: 100, y: 100 }
        );
    }

    #[test]
    fn axes_scale_independently_and_truncate() {
        let p = scale_to_screen(
            &click(3, 3),
            FrameSize::new(4, 4),
            FrameSize::new(10, 5),
        );
        assert_eq!(p, ScreenPoint { x: 7, y: 3 });
    }

    #[test]
    fn in_bounds_clicks_stay_on_screen() {
        let sizes = [
            (FrameSize::new(1280, 720), FrameSize::new(1920, 1080)),
            (FrameSize::new(1280, 800), FrameSize::new(1440, 900)),
            (FrameSize::new(1280, 533), FrameSize::new(3440, 1440)),
            (FrameSize::new(1280, 1024), FrameSize::new(1280, 1024)),
            (FrameSize::new(1280, 720), FrameSize::new(1366, 768)),
            (FrameSize::new(7, 3), FrameSize::new(5, 2)),
        ];
        for (sent, screen) in sizes {
            let step_x = (sent.width / 97).max(1) as usize;
            let step_y = (sent.height / 89).max(1) as usize;
            for x in (0..sent.width).step_by(step_x).chain([sent.width - 1]) {
                for y in (0..sent.height).step_by(step_y).chain([sent.height - 1]) {
                    let p = scale_to_screen(&click(x, y), sent, screen);
                    assert!(p.x < screen.width, "{x},{y} -> {p} on {screen}");
                    assert!(p.y < screen.height, "{x},{y} -> {p} on {screen}");
                }
            }
        }
    }
}
