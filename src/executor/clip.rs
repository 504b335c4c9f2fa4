//! Screenshot regions
//!
//! All rects here are CSS pixels of document space, the unit the page
//! scripts and the session's screenshot primitive work in.

use crate::geometry::{Point, Rect, Size};

/// Region to screenshot and where the content sits inside it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlan {
    pub clip: Rect,
    pub content_offset: Point,
    pub content_size: Size,
}

impl ClipPlan {
    /// Content rect padded for outpainting, clamped to the document origin
    /// and at least one pixel in each direction
    pub fn around(content: Rect, padding: f64) -> Self {
        let padded = content.inflate(padding.max(0.0));
        let x = padded.x.max(0.0);
        let y = padded.y.max(0.0);
        let right = padded.right().max(x + 1.0);
        let bottom = padded.bottom().max(y + 1.0);
        let clip = Rect::new(x, y, right - x, bottom - y);
        Self {
            clip,
            content_offset: Point {
                x: content.x - clip.x,
                y: content.y - clip.y,
            },
            content_size: Size {
                width: content.width,
                height: content.height,
            },
        }
    }

    /// The whole canvas, for root-background captures
    pub fn canvas(viewport: Size) -> Self {
        let clip = Rect::new(0.0, 0.0, viewport.width.max(1.0), viewport.height.max(1.0));
        Self {
            clip,
            content_offset: Point::default(),
            content_size: Size {
                width: clip.width,
                height: clip.height,
            },
        }
    }

    /// Viewport large enough to hold the clip, when the current one is not
    pub fn required_viewport(&self, current: Size) -> Option<Size> {
        let width = current.width.max(self.clip.right().ceil());
        let height = current.height.max(self.clip.bottom().ceil());
        (width > current.width || height > current.height).then_some(Size { width, height })
    }
}

/// Live rect of a range part
///
/// Part rects come from analysis (device pixels); the control may have moved
/// since, so the part is shifted by the control's displacement.
pub fn range_part_rect(part: &Rect, analyzed_control: &Rect, live_control: &Rect, pixel_ratio: f64) -> Rect {
    let part = part.scale(1.0 / pixel_ratio);
    let control = analyzed_control.scale(1.0 / pixel_ratio);
    part.translate(live_control.x - control.x, live_control.y - control.y)
}

/// Width and height from a PNG header
pub fn png_dimensions(png: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if png.len() < 24 || !png.starts_with(SIGNATURE) || &png[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_clamped_at_the_origin() {
        let plan = ClipPlan::around(Rect::new(4.0, 30.0, 100.0, 50.0), 10.0);
        assert_eq!(plan.clip, Rect::new(0.0, 20.0, 114.0, 70.0));
        assert_eq!(plan.content_offset, Point { x: 4.0, y: 10.0 });
        assert_eq!(plan.content_size, Size { width: 100.0, height: 50.0 });
    }

    #[test]
    fn degenerate_clips_grow_to_one_pixel() {
        let plan = ClipPlan::around(Rect::new(-5.0, -5.0, 2.0, 2.0), 0.0);
        assert_eq!(plan.clip, Rect::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn viewport_grows_only_when_needed() {
        let viewport = Size { width: 800.0, height: 600.0 };
        let inside = ClipPlan::around(Rect::new(10.0, 10.0, 100.0, 100.0), 0.0);
        assert_eq!(inside.required_viewport(viewport), None);
        let below = ClipPlan::around(Rect::new(10.0, 580.0, 100.0, 100.5), 0.0);
        assert_eq!(
            below.required_viewport(viewport),
            Some(Size { width: 800.0, height: 681.0 })
        );
    }

    #[test]
    fn range_parts_follow_their_control() {
        let part = Rect::new(40.0, 20.0, 40.0, 40.0);
        let analyzed = Rect::new(20.0, 20.0, 400.0, 40.0);
        let live = Rect::new(10.0, 110.0, 200.0, 20.0);
        assert_eq!(range_part_rect(&part, &analyzed, &live, 2.0), Rect::new(20.0, 110.0, 20.0, 20.0));
    }

    #[test]
    fn png_header_dimensions() {
        let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR".to_vec();
        png.extend_from_slice(&640u32.to_be_bytes());
        png.extend_from_slice(&360u32.to_be_bytes());
        assert_eq!(png_dimensions(&png), Some((640, 360)));
        assert_eq!(png_dimensions(b"GIF89a"), None);
    }
}
