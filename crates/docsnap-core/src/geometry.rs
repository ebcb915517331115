// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Space-tagged 2-D points and quadrilaterals.
//
// Every point carries its coordinate space as a zero-sized type parameter so
// that detector output, preview coordinates, and image pixels can never be
// mixed up silently.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Marker trait for coordinate spaces.
pub trait Space: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Short name used in log output.
    const NAME: &'static str;
}

/// Detector space: origin bottom-left, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {}

/// Preview / render space: origin top-left, device pixels of the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preview {}

/// Still-image space: origin top-left, pixels of the captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePixels {}

impl Space for Normalized {
    const NAME: &'static str = "normalized";
}

impl Space for Preview {
    const NAME: &'static str = "preview";
}

impl Space for ImagePixels {
    const NAME: &'static str = "image";
}

/// A 2-D point in space `S`.
#[derive(Clone, Copy, PartialEq)]
pub struct Point<S: Space> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<S>,
}

impl<S: Space> Point<S> {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl<S: Space> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})@{}", self.x, self.y, S::NAME)
    }
}

/// Width and height of a surface or raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// True when both sides are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Four labelled corners in space `S`.
///
/// For quadrilaterals in [`Normalized`] space the labels are the detector's:
/// `top_*` corners lie on the edge nearest the origin row (y = 0), which is the
/// visual *bottom* of an upright image because the detector's origin is
/// bottom-left. Quadrilaterals in [`Preview`] and [`ImagePixels`] space carry
/// visual labels. The mapper performs the relabelling; nothing else reorders
/// corners.
#[derive(Clone, Copy, PartialEq)]
pub struct Quad<S: Space> {
    pub top_left: Point<S>,
    pub top_right: Point<S>,
    pub bottom_left: Point<S>,
    pub bottom_right: Point<S>,
}

impl<S: Space> Quad<S> {
    pub fn new(
        top_left: Point<S>,
        top_right: Point<S>,
        bottom_left: Point<S>,
        bottom_right: Point<S>,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }

    /// Axis-aligned rectangle covering `size` with its origin at (0, 0).
    pub fn from_bounds(size: Size) -> Self {
        Self::new(
            Point::new(0.0, 0.0),
            Point::new(size.width, 0.0),
            Point::new(0.0, size.height),
            Point::new(size.width, size.height),
        )
    }

    /// Corners in cyclic drawing order: tl, tr, br, bl.
    pub fn cyclic(&self) -> [Point<S>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.cyclic().iter().all(Point::is_finite)
    }

    /// Unsigned area via the shoelace formula over the cyclic order.
    pub fn area(&self) -> f64 {
        let pts = self.cyclic();
        let mut twice = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
        }
        twice.abs() / 2.0
    }

    /// Average of the top and bottom edge lengths.
    pub fn mean_width(&self) -> f64 {
        (self.top_left.distance(&self.top_right) + self.bottom_left.distance(&self.bottom_right))
            / 2.0
    }

    /// Average of the left and right edge lengths.
    pub fn mean_height(&self) -> f64 {
        (self.top_left.distance(&self.bottom_left) + self.top_right.distance(&self.bottom_right))
            / 2.0
    }
}

impl<S: Space> fmt::Debug for Quad<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quad")
            .field("tl", &self.top_left)
            .field("tr", &self.top_right)
            .field("bl", &self.bottom_left)
            .field("br", &self.bottom_right)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_quad_area_matches_size() {
        let quad = Quad::<ImagePixels>::from_bounds(Size::new(40.0, 25.0));
        assert!((quad.area() - 1000.0).abs() < 1e-9);
        assert!((quad.mean_width() - 40.0).abs() < 1e-9);
        assert!((quad.mean_height() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn area_of_collapsed_quad_is_zero() {
        let p = Point::<ImagePixels>::new(3.0, 3.0);
        let quad = Quad::new(p, p, p, p);
        assert_eq!(quad.area(), 0.0);
    }

    #[test]
    fn nan_corner_is_not_finite() {
        let mut quad = Quad::<Normalized>::from_bounds(Size::new(1.0, 1.0));
        quad.bottom_right = Point::new(f64::NAN, 0.5);
        assert!(!quad.is_finite());
    }

    #[test]
    fn size_validity() {
        assert!(Size::new(1.0, 2.0).is_valid());
        assert!(!Size::new(0.0, 2.0).is_valid());
        assert!(!Size::new(f64::INFINITY, 2.0).is_valid());
    }
}
