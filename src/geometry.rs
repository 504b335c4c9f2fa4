//! Axis-aligned rectangles and corner radii

use serde::{Deserialize, Serialize};

/// Tolerance used for containment and anchoring checks, in pixels
pub const EPSILON: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// True when both dimensions are strictly positive
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        self.intersection(other).map(|r| r.area()).unwrap_or(0.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Whether `other` lies inside `self`, allowing `EPSILON` of slack
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x - EPSILON
            && other.y >= self.y - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.bottom() <= self.bottom() + EPSILON
    }

    pub fn inflate(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Fraction of `self` that is visible through `frame` (0 when `self` has no area)
    pub fn visible_fraction_in(&self, frame: &Rect) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(frame) / area
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Corner radii, clockwise from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerRadii {
    pub top_left: f64,
    pub top_right: f64,
    pub bottom_right: f64,
    pub bottom_left: f64,
}

impl CornerRadii {
    pub fn uniform(radius: f64) -> Self {
        Self {
            top_left: radius,
            top_right: radius,
            bottom_right: radius,
            bottom_left: radius,
        }
    }

    pub fn is_rounded(&self) -> bool {
        self.top_left > 0.0 || self.top_right > 0.0 || self.bottom_right > 0.0 || self.bottom_left > 0.0
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            top_left: self.top_left * factor,
            top_right: self.top_right * factor,
            bottom_right: self.bottom_right * factor,
            bottom_left: self.bottom_left * factor,
        }
    }

    /// Square regions of `frame` that the rounded corners cut into
    pub fn corner_regions(&self, frame: &Rect) -> Vec<Rect> {
        let mut regions = Vec::new();
        if self.top_left > 0.0 {
            regions.push(Rect::new(frame.x, frame.y, self.top_left, self.top_left));
        }
        if self.top_right > 0.0 {
            regions.push(Rect::new(
                frame.right() - self.top_right,
                frame.y,
                self.top_right,
                self.top_right,
            ));
        }
        if self.bottom_right > 0.0 {
            regions.push(Rect::new(
                frame.right() - self.bottom_right,
                frame.bottom() - self.bottom_right,
                self.bottom_right,
                self.bottom_right,
            ));
        }
        if self.bottom_left > 0.0 {
            regions.push(Rect::new(
                frame.x,
                frame.bottom() - self.bottom_left,
                self.bottom_left,
                self.bottom_left,
            ));
        }
        regions
    }

    /// Whether `rect` reaches into any rounded corner of `frame`
    pub fn touches_corner(&self, frame: &Rect, rect: &Rect) -> bool {
        self.corner_regions(frame)
            .iter()
            .any(|corner| corner.intersection(rect).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_and_union() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = Rect::new(80.0, 10.0, 40.0, 20.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(80.0, 10.0, 20.0, 20.0)));
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 120.0, 50.0));
        assert!(a.intersection(&Rect::new(200.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn containment_allows_half_pixel_slack() {
        let frame = Rect::new(10.0, 10.0, 100.0, 50.0);
        assert!(frame.contains(&Rect::new(9.7, 10.0, 100.0, 50.0)));
        assert!(!frame.contains(&Rect::new(90.0, 10.0, 40.0, 20.0)));
    }

    #[test]
    fn visible_fraction() {
        let frame = Rect::new(0.0, 0.0, 100.0, 100.0);
        let half_out = Rect::new(50.0, 0.0, 100.0, 100.0);
        assert!((half_out.visible_fraction_in(&frame) - 0.5).abs() < 1e-9);
        assert_eq!(Rect::default().visible_fraction_in(&frame), 0.0);
    }

    #[test]
    fn rounded_corner_regions() {
        let frame = Rect::new(10.0, 10.0, 100.0, 50.0);
        let radii = CornerRadii::uniform(12.0);
        assert_eq!(radii.corner_regions(&frame).len(), 4);
        // Reaches into the top-right corner square
        assert!(radii.touches_corner(&frame, &Rect::new(90.0, 10.0, 40.0, 20.0)));
        // Sits in the middle of the frame
        assert!(!radii.touches_corner(&frame, &Rect::new(40.0, 25.0, 20.0, 10.0)));
    }
}
