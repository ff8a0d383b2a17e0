use crate::{Point, Size};

/// An element's bounds in CSS pixels, as the DOM reports them.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    #[must_use]
    pub fn new(origin: impl Into<Point>, size: impl Into<Size>) -> Self {
        (origin.into(), size.into()).into()
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Size {
        (self.width(), self.height()).into()
    }

    pub fn origin(&self) -> Point {
        (self.left, self.top).into()
    }
}

impl From<(Point, Size)> for Rect {
    fn from((origin, size): (Point, Size)) -> Self {
        let rb = origin + size;
        (origin, rb).into()
    }
}

impl From<(Point, Point)> for Rect {
    fn from((origin, end): (Point, Point)) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: end.x,
            bottom: end.y,
        }
    }
}

impl From<(f64, f64, f64, f64)> for Rect {
    fn from((left, top, right, bottom): (f64, f64, f64, f64)) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_from_origin_and_size() {
        let r = Rect::new((50.0, 20.0), (200.0, 100.0));
        assert_eq!(r.right, 250.0);
        assert_eq!(r.bottom, 120.0);
        assert_eq!(r.size(), Size::new(200.0, 100.0));
        assert_eq!(r.origin(), Point::new(50.0, 20.0));
    }
}
