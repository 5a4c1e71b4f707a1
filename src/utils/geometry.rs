use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Type-level marker for raw coordinate space, provided by input devices
///
/// Values in this space are in device units, inside the axis ranges the
/// kernel advertises for the device.
#[derive(Debug)]
pub struct Raw;

/// Type-level marker for physical coordinate space in millimeters
///
/// Device-unit coordinates divided by the per-axis resolution land here.
#[derive(Debug)]
pub struct Mm;

/// A point in 2D space, tagged with its coordinate space
pub struct Point<Kind> {
    /// horizontal coordinate
    pub x: f64,
    /// vertical coordinate
    pub y: f64,
    _kind: PhantomData<Kind>,
}

impl<Kind> Point<Kind> {
    /// Create a point from its coordinates
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Point {
            x,
            y,
            _kind: PhantomData,
        }
    }

    /// The origin of the coordinate space
    #[inline]
    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Euclidean length of the vector from the origin to this point
    #[inline]
    pub fn hypot(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl<Kind> Default for Point<Kind> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<Kind> Clone for Point<Kind> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Kind> Copy for Point<Kind> {}

impl<Kind> PartialEq for Point<Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl<Kind> fmt::Debug for Point<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl<Kind> From<(f64, f64)> for Point<Kind> {
    #[inline]
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

impl<Kind> Add for Point<Kind> {
    type Output = Point<Kind>;
    #[inline]
    fn add(self, other: Self) -> Self {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl<Kind> AddAssign for Point<Kind> {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl<Kind> Sub for Point<Kind> {
    type Output = Point<Kind>;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl<Kind> SubAssign for Point<Kind> {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

/// A two-dimensional extent, tagged with its coordinate space
pub struct Size<Kind> {
    /// width
    pub w: f64,
    /// height
    pub h: f64,
    _kind: PhantomData<Kind>,
}

impl<Kind> Size<Kind> {
    /// Create a size from its extents
    #[inline]
    pub fn new(w: f64, h: f64) -> Self {
        Size {
            w,
            h,
            _kind: PhantomData,
        }
    }
}

impl<Kind> Clone for Size<Kind> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Kind> Copy for Size<Kind> {}

impl<Kind> PartialEq for Size<Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.w == other.w && self.h == other.h
    }
}

impl<Kind> fmt::Debug for Size<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

impl<Kind> From<(f64, f64)> for Size<Kind> {
    #[inline]
    fn from((w, h): (f64, f64)) -> Self {
        Size::new(w, h)
    }
}

/// An axis-aligned rectangle, tagged with its coordinate space
pub struct Rect<Kind> {
    /// top-left corner
    pub loc: Point<Kind>,
    /// extents
    pub size: Size<Kind>,
}

impl<Kind> Rect<Kind> {
    /// Create a rectangle from its top-left corner and extents
    #[inline]
    pub fn new(loc: Point<Kind>, size: Size<Kind>) -> Self {
        Rect { loc, size }
    }

    /// Create a rectangle from two opposing corners
    pub fn from_extents(topleft: Point<Kind>, bottomright: Point<Kind>) -> Self {
        Rect {
            loc: topleft,
            size: Size::new(bottomright.x - topleft.x, bottomright.y - topleft.y),
        }
    }

    /// Whether the point lies inside this rectangle
    ///
    /// The left and top edges are inclusive, the right and bottom edges
    /// exclusive, so adjacent rectangles partition the plane.
    pub fn contains(&self, point: Point<Kind>) -> bool {
        point.x >= self.loc.x
            && point.x < self.loc.x + self.size.w
            && point.y >= self.loc.y
            && point.y < self.loc.y + self.size.h
    }
}

impl<Kind> Clone for Rect<Kind> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Kind> Copy for Rect<Kind> {}

impl<Kind> fmt::Debug for Rect<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rect[{:?} {:?}]", self.loc, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_edges() {
        let r: Rect<Raw> = Rect::new(Point::new(10.0, 10.0), Size::new(20.0, 20.0));
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(29.9, 29.9)));
        assert!(!r.contains(Point::new(30.0, 10.0)));
        assert!(!r.contains(Point::new(9.9, 10.0)));
    }

    #[test]
    fn adjacent_rects_partition() {
        let left: Rect<Raw> = Rect::from_extents(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let right: Rect<Raw> = Rect::from_extents(Point::new(10.0, 0.0), Point::new(20.0, 10.0));
        let p = Point::new(10.0, 5.0);
        assert!(!left.contains(p));
        assert!(right.contains(p));
    }
}
