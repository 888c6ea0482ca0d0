// MIT/Apache2 License

//! Basic geometric primitives.

/// Unit for pixels or screen area.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pixel;

/// A point on a surface, in pixels.
pub type Point = euclid::Point2D<i32, Pixel>;

/// The damaged area carried by a paint or update event.
pub type UpdateRect = euclid::Rect<i32, Pixel>;

/// Shorthand for building an [`UpdateRect`] from its origin and size.
#[inline]
pub fn update_rect(x: i32, y: i32, width: i32, height: i32) -> UpdateRect {
    euclid::rect(x, y, width, height)
}
