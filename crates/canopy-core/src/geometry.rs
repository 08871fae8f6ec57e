//! Geometric primitives for element placement and connection routing.
//!
//! # Overview
//!
//! - [`Point`] - A 2D coordinate in diagram space
//! - [`Size`] - Width and height dimensions
//! - [`Bounds`] - An axis-aligned rectangle given by its top-left corner and size
//!
//! # Coordinate System
//!
//! Canopy uses the same coordinate system as SVG:
//!
//! ```text
//!   (0,0) ────────► +X
//!     │
//!     │
//!     ▼
//!    +Y
//! ```

use serde::{Deserialize, Serialize};

/// A 2D point in diagram coordinate space.
///
/// Points double as translation vectors: moving elements takes a `Point` delta.
///
/// # Examples
///
/// ```
/// # use canopy_core::geometry::Point;
/// let p1 = Point::new(10.0, 20.0);
/// let p2 = Point::new(5.0, 5.0);
///
/// let sum = p1.add_point(p2);
/// assert_eq!(sum.x(), 15.0);
/// assert_eq!(sum.y(), 25.0);
///
/// let mid = p1.midpoint(p2);
/// assert_eq!(mid.x(), 7.5);
/// assert_eq!(mid.y(), 12.5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    /// Creates a new point with the specified coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate of the point
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y-coordinate of the point
    pub fn y(self) -> f32 {
        self.y
    }

    /// Returns true if both coordinates are zero
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Returns true if both coordinates are finite
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Adds another point to this point, returning a new point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point, returning a new point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Calculates the midpoint between this point and another point
    pub fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Multiplies both coordinates by the given factor.
    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

/// Width and height of an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }
}

/// A rectangle described by its top-left corner and its size.
///
/// This is the shape geometry stored on elements (`x`, `y`, `width`, `height`),
/// and its serialized form uses exactly those four keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a new bounds from a center point and a size
    pub fn new_from_center(center: Point, size: Size) -> Self {
        Self {
            x: center.x - size.width / 2.0,
            y: center.y - size.height / 2.0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn x(self) -> f32 {
        self.x
    }

    pub fn y(self) -> f32 {
        self.y
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }

    /// Returns the maximum x-coordinate of the bounds
    pub fn max_x(self) -> f32 {
        self.x + self.width
    }

    /// Returns the maximum y-coordinate of the bounds
    pub fn max_y(self) -> f32 {
        self.y + self.height
    }

    /// Returns the top-left corner as a Point
    pub fn min_point(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns true if every component is finite and the size is non-negative.
    pub fn is_valid(self) -> bool {
        self.min_point().is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// Moves the bounds by the specified offset, keeping its size.
    ///
    /// # Examples
    ///
    /// ```
    /// # use canopy_core::geometry::{Bounds, Point};
    /// let bounds = Bounds::new(10.0, 20.0, 50.0, 30.0);
    ///
    /// let moved = bounds.translate(Point::new(100.0, 50.0));
    /// assert_eq!(moved.x(), 110.0);
    /// assert_eq!(moved.y(), 70.0);
    /// assert_eq!(moved.width(), 50.0);
    /// ```
    pub fn translate(&self, offset: Point) -> Self {
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
            ..*self
        }
    }

    /// Returns the point where the ray from the center towards `toward` leaves
    /// the bounds.
    ///
    /// Connections dock at this point so their ends sit on the shape outline.
    /// A degenerate direction (target at the center) yields the center.
    ///
    /// # Examples
    ///
    /// ```
    /// # use canopy_core::geometry::{Bounds, Point};
    /// let bounds = Bounds::new(0.0, 0.0, 100.0, 80.0);
    ///
    /// let dock = bounds.border_point(Point::new(250.0, 40.0));
    /// assert_eq!(dock, Point::new(100.0, 40.0));
    /// ```
    pub fn border_point(self, toward: Point) -> Point {
        let center = self.center();
        let direction = toward.sub_point(center);
        if direction.is_zero() {
            return center;
        }

        let half_width = self.width / 2.0;
        let half_height = self.height / 2.0;
        let scale_x = if direction.x != 0.0 {
            half_width / direction.x.abs()
        } else {
            f32::INFINITY
        };
        let scale_y = if direction.y != 0.0 {
            half_height / direction.y.abs()
        } else {
            f32::INFINITY
        };

        center.add_point(direction.scale(scale_x.min(scale_y)))
    }
}
