//! Screen-space pick rectangles.

use glam::Vec2;

/// Axis-aligned pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PickRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PickRect {
    /// Rectangle spanned by two corner points in either order.
    ///
    /// The origin is the floored minimum corner and the extent is the
    /// truncated absolute difference of the points.
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let extent = (a - b).abs();
        Self {
            x: min.x.floor() as i32,
            y: min.y.floor() as i32,
            width: extent.x as u32,
            height: extent.y as u32,
        }
    }

    /// True when either side is shorter than `min_extent` pixels.
    ///
    /// Degenerate rectangles are answered as point queries.
    pub fn is_degenerate(&self, min_extent: u32) -> bool {
        self.width < min_extent.max(1) || self.height < min_extent.max(1)
    }

    /// Center of the rectangle.
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.x as f32 + self.width as f32 * 0.5,
            self.y as f32 + self.height as f32 * 0.5,
        )
    }

    /// Intersection with a viewport of the given size, `None` if empty.
    pub fn clamp_to(&self, viewport: (u32, u32)) -> Option<Self> {
        let (vw, vh) = (i64::from(viewport.0), i64::from(viewport.1));
        let x0 = i64::from(self.x).clamp(0, vw);
        let y0 = i64::from(self.y).clamp(0, vh);
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(0, vw);
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(0, vh);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Origin as unsigned pixel coordinates; negative values clamp to zero.
    pub fn origin(&self) -> (u32, u32) {
        (self.x.max(0) as u32, self.y.max(0) as u32)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_any_order() {
        let a = PickRect::from_points(Vec2::new(200.0, 140.0), Vec2::new(80.0, 80.0));
        let b = PickRect::from_points(Vec2::new(80.0, 80.0), Vec2::new(200.0, 140.0));
        assert_eq!(a, b);
        assert_eq!(
            a,
            PickRect {
                x: 80,
                y: 80,
                width: 120,
                height: 60
            }
        );
        assert_eq!(a.area(), 7200);
    }

    #[test]
    fn test_degenerate() {
        let line = PickRect::from_points(Vec2::new(10.0, 10.0), Vec2::new(10.0, 50.0));
        assert!(line.is_degenerate(2));
        assert_eq!(line.center(), Vec2::new(10.0, 30.0));
        let sliver = PickRect::from_points(Vec2::new(10.0, 10.0), Vec2::new(11.5, 50.0));
        assert!(sliver.is_degenerate(2));
        assert!(!sliver.is_degenerate(1));
        // A zero threshold still treats empty rectangles as points
        assert!(line.is_degenerate(0));
    }

    #[test]
    fn test_clamp_to_viewport() {
        let rect = PickRect::from_points(Vec2::new(-20.0, 550.0), Vec2::new(30.0, 700.0));
        let clamped = rect.clamp_to((800, 600)).unwrap();
        assert_eq!(
            clamped,
            PickRect {
                x: 0,
                y: 550,
                width: 30,
                height: 50
            }
        );
        assert_eq!(clamped.origin(), (0, 550));

        let outside = PickRect::from_points(Vec2::new(900.0, 10.0), Vec2::new(950.0, 40.0));
        assert!(outside.clamp_to((800, 600)).is_none());
    }
}
