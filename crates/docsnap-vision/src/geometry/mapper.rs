// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversions between detector-normalized, preview, and image-pixel space.
//
// All functions are pure: the preview geometry (surface size, orientation,
// gravity) is an argument on every call, never cached state.
//
// ## Corner roles
//
// The detector's normalized space has its origin at the bottom-left and labels
// corners relative to that origin: its `top_*` corners sit on the edge nearest
// y = 0. Preview and image space are top-left-origin, so the vertical flip
// `y' = 1 - y` moves the detector's `bottom_*` corners to the visual top. The
// quad conversions therefore hand out
//
// | visual corner  | detector corner |
// |----------------|-----------------|
// | top-left       | bottom-left     |
// | top-right      | bottom-right    |
// | bottom-left    | top-left        |
// | bottom-right   | top-right       |
//
// Skipping this swap yields a vertically mirrored rectification.

use docsnap_core::{
    DeviceOrientation, DocsnapError, ImagePixels, Normalized, Point, Polygon, Preview,
    PreviewGeometry, Quad, Result, Size, VideoGravity,
};

/// Slack allowed outside `[0, 1]` before a normalized point is rejected.
const RANGE_EPSILON: f64 = 1e-6;

/// Smallest quad area, in square pixels, accepted as non-degenerate.
const MIN_QUAD_AREA: f64 = 1.0;

// -- Points -------------------------------------------------------------------

/// Map a detector point into preview space.
pub fn to_preview(point: Point<Normalized>, geometry: &PreviewGeometry) -> Result<Point<Preview>> {
    let (x, y) = checked_normalized(point)?;
    let rect = content_rect(geometry)?;
    let (u, v) = rotate(x, 1.0 - y, geometry.orientation);
    Ok(Point::new(rect.x + u * rect.width, rect.y + v * rect.height))
}

/// Inverse of [`to_preview`], for hit-testing. Fails for points outside the
/// camera content (e.g. in letterbox bars).
pub fn from_preview(point: Point<Preview>, geometry: &PreviewGeometry) -> Result<Point<Normalized>> {
    if !point.is_finite() {
        return Err(DocsnapError::InvalidGeometry(format!(
            "non-finite preview point {point:?}"
        )));
    }
    let rect = content_rect(geometry)?;
    let u = (point.x - rect.x) / rect.width;
    let v = (point.y - rect.y) / rect.height;
    let (x, flipped_y) = unrotate(u, v, geometry.orientation);
    checked_normalized(Point::new(x, 1.0 - flipped_y)).map(|(x, y)| Point::new(x, y))
}

/// Map a detector point into still-image pixels.
pub fn to_image_pixels(point: Point<Normalized>, image: Size) -> Result<Point<ImagePixels>> {
    checked_size(image, "image")?;
    let (x, y) = checked_normalized(point)?;
    Ok(Point::new(x * image.width, (1.0 - y) * image.height))
}

/// Inverse of [`to_image_pixels`].
pub fn from_image_pixels(point: Point<ImagePixels>, image: Size) -> Result<Point<Normalized>> {
    checked_size(image, "image")?;
    if !point.is_finite() {
        return Err(DocsnapError::InvalidGeometry(format!(
            "non-finite image point {point:?}"
        )));
    }
    Ok(Point::new(point.x / image.width, 1.0 - point.y / image.height))
}

// -- Quadrilaterals -------------------------------------------------------------

/// Map a detector quad into still-image pixels with visual corner roles.
pub fn quad_to_image_pixels(quad: &Quad<Normalized>, image: Size) -> Result<Quad<ImagePixels>> {
    let map = |p| to_image_pixels(p, image);
    let visual = Quad::new(
        map(quad.bottom_left)?,
        map(quad.bottom_right)?,
        map(quad.top_left)?,
        map(quad.top_right)?,
    );
    ensure_area(&visual)?;
    Ok(visual)
}

/// Map a detector quad to a drawable preview polygon with visual corner
/// roles, accounting for device orientation.
pub fn quad_to_preview(quad: &Quad<Normalized>, geometry: &PreviewGeometry) -> Result<Polygon> {
    let map = |p| to_preview(p, geometry);
    // Roles as seen in the upright buffer.
    let tl = map(quad.bottom_left)?;
    let tr = map(quad.bottom_right)?;
    let bl = map(quad.top_left)?;
    let br = map(quad.top_right)?;

    // Roles after rotating the buffer onto the display.
    let visual = match geometry.orientation {
        DeviceOrientation::Portrait => Quad::new(tl, tr, bl, br),
        DeviceOrientation::PortraitUpsideDown => Quad::new(br, bl, tr, tl),
        DeviceOrientation::LandscapeRight => Quad::new(bl, tl, br, tr),
        DeviceOrientation::LandscapeLeft => Quad::new(tr, br, tl, bl),
    };
    ensure_area(&visual)?;
    Ok(Polygon(visual))
}

// -- Helpers --------------------------------------------------------------------

/// Camera content placement inside the preview surface.
#[derive(Debug, Clone, Copy)]
struct ContentRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn content_rect(geometry: &PreviewGeometry) -> Result<ContentRect> {
    checked_size(geometry.surface, "preview surface")?;
    checked_size(geometry.frame, "camera frame")?;

    let surface = geometry.surface;
    let content = if geometry.orientation.is_landscape() {
        Size::new(geometry.frame.height, geometry.frame.width)
    } else {
        geometry.frame
    };

    let scale_x = surface.width / content.width;
    let scale_y = surface.height / content.height;
    let (width, height) = match geometry.gravity {
        VideoGravity::Resize => (surface.width, surface.height),
        VideoGravity::ResizeAspect => {
            let s = scale_x.min(scale_y);
            (content.width * s, content.height * s)
        }
        VideoGravity::ResizeAspectFill => {
            let s = scale_x.max(scale_y);
            (content.width * s, content.height * s)
        }
    };

    Ok(ContentRect {
        x: (surface.width - width) / 2.0,
        y: (surface.height - height) / 2.0,
        width,
        height,
    })
}

/// Rotate top-left-origin unit coordinates from buffer to display orientation.
fn rotate(u: f64, v: f64, orientation: DeviceOrientation) -> (f64, f64) {
    match orientation {
        DeviceOrientation::Portrait => (u, v),
        DeviceOrientation::PortraitUpsideDown => (1.0 - u, 1.0 - v),
        DeviceOrientation::LandscapeRight => (1.0 - v, u),
        DeviceOrientation::LandscapeLeft => (v, 1.0 - u),
    }
}

fn unrotate(a: f64, b: f64, orientation: DeviceOrientation) -> (f64, f64) {
    match orientation {
        DeviceOrientation::Portrait => (a, b),
        DeviceOrientation::PortraitUpsideDown => (1.0 - a, 1.0 - b),
        DeviceOrientation::LandscapeRight => (b, 1.0 - a),
        DeviceOrientation::LandscapeLeft => (1.0 - b, a),
    }
}

fn checked_normalized(point: Point<Normalized>) -> Result<(f64, f64)> {
    if !point.is_finite() {
        return Err(DocsnapError::InvalidGeometry(format!(
            "non-finite normalized point {point:?}"
        )));
    }
    let in_range = |c: f64| (-RANGE_EPSILON..=1.0 + RANGE_EPSILON).contains(&c);
    if !in_range(point.x) || !in_range(point.y) {
        return Err(DocsnapError::InvalidGeometry(format!(
            "normalized point {point:?} outside [0, 1]"
        )));
    }
    Ok((point.x.clamp(0.0, 1.0), point.y.clamp(0.0, 1.0)))
}

fn checked_size(size: Size, what: &str) -> Result<()> {
    if size.is_valid() {
        Ok(())
    } else {
        Err(DocsnapError::InvalidGeometry(format!(
            "{what} size {}x{} has no area",
            size.width, size.height
        )))
    }
}

fn ensure_area<S: docsnap_core::Space>(quad: &Quad<S>) -> Result<()> {
    let area = quad.area();
    if area < MIN_QUAD_AREA {
        return Err(DocsnapError::InvalidGeometry(format!(
            "quadrilateral area {area:.3} is degenerate"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn close<S: docsnap_core::Space>(p: Point<S>, x: f64, y: f64) -> bool {
        (p.x - x).abs() < 1e-6 && (p.y - y).abs() < 1e-6
    }

    fn geometry(orientation: DeviceOrientation, gravity: VideoGravity) -> PreviewGeometry {
        PreviewGeometry {
            surface: Size::new(400.0, 800.0),
            frame: Size::new(1080.0, 1920.0),
            orientation,
            gravity,
        }
    }

    /// Detector-labelled quad: `top_*` near y = 0 (the visual bottom).
    fn detector_quad() -> Quad<Normalized> {
        Quad::new(
            Point::new(0.1, 0.2),
            Point::new(0.9, 0.2),
            Point::new(0.1, 0.8),
            Point::new(0.9, 0.8),
        )
    }

    #[test]
    fn image_pixels_flips_vertical_axis() {
        let p = to_image_pixels(Point::new(0.25, 0.75), Size::new(200.0, 100.0)).expect("map");
        assert!(close(p, 50.0, 25.0), "got {p:?}");
    }

    #[test]
    fn image_pixels_round_trip_law() {
        let size = Size::new(1920.0, 1080.0);
        for i in 0..=10 {
            for j in 0..=10 {
                let p = Point::<Normalized>::new(i as f64 / 10.0, j as f64 / 10.0);
                let back = from_image_pixels(to_image_pixels(p, size).expect("map"), size)
                    .expect("inverse");
                assert!((back.x - p.x).abs() < TOL && (back.y - p.y).abs() < TOL);
            }
        }
    }

    #[test]
    fn quad_roles_swap_under_flip() {
        let quad = quad_to_image_pixels(&detector_quad(), Size::new(100.0, 100.0)).expect("map");
        // Detector bottom corners become the visual top.
        assert!(close(quad.top_left, 10.0, 20.0), "tl {:?}", quad.top_left);
        assert!(close(quad.top_right, 90.0, 20.0), "tr {:?}", quad.top_right);
        assert!(close(quad.bottom_left, 10.0, 80.0), "bl {:?}", quad.bottom_left);
        assert!(close(quad.bottom_right, 90.0, 80.0), "br {:?}", quad.bottom_right);
        assert!(quad.top_left.y < quad.bottom_left.y);
    }

    #[test]
    fn malformed_points_are_rejected() {
        let size = Size::new(100.0, 100.0);
        for p in [
            Point::<Normalized>::new(f64::NAN, 0.5),
            Point::new(0.5, f64::INFINITY),
            Point::new(1.2, 0.5),
            Point::new(0.5, -0.1),
        ] {
            assert!(matches!(
                to_image_pixels(p, size),
                Err(DocsnapError::InvalidGeometry(_))
            ));
        }
        assert!(to_image_pixels(Point::new(0.5, 0.5), Size::new(0.0, 10.0)).is_err());
    }

    #[test]
    fn zero_area_quad_is_rejected() {
        let p = Point::<Normalized>::new(0.5, 0.5);
        let quad = Quad::new(p, p, p, p);
        assert!(matches!(
            quad_to_image_pixels(&quad, Size::new(100.0, 100.0)),
            Err(DocsnapError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn resize_gravity_scales_to_surface() {
        let g = geometry(DeviceOrientation::Portrait, VideoGravity::Resize);
        let p = to_preview(Point::new(0.25, 0.75), &g).expect("map");
        assert!(close(p, 100.0, 200.0), "got {p:?}");
    }

    #[test]
    fn aspect_fill_crops_symmetrically() {
        let g = PreviewGeometry {
            surface: Size::new(390.0, 844.0),
            ..geometry(DeviceOrientation::Portrait, VideoGravity::ResizeAspectFill)
        };
        let center = to_preview(Point::new(0.5, 0.5), &g).expect("map");
        assert!(close(center, 195.0, 422.0), "got {center:?}");
        // Height fills exactly; width overflows on both sides.
        let left = to_preview(Point::new(0.0, 1.0), &g).expect("map");
        assert!(left.x < 0.0 && left.y.abs() < 1e-9, "got {left:?}");
    }

    #[test]
    fn aspect_fit_letterboxes() {
        let g = PreviewGeometry {
            surface: Size::new(1000.0, 1000.0),
            frame: Size::new(1000.0, 500.0),
            ..geometry(DeviceOrientation::Portrait, VideoGravity::ResizeAspect)
        };
        let top = to_preview(Point::new(0.0, 1.0), &g).expect("map");
        assert!(close(top, 0.0, 250.0), "got {top:?}");
        // Inside the letterbox bar there is no camera content.
        assert!(from_preview(Point::new(500.0, 100.0), &g).is_err());
    }

    #[test]
    fn landscape_right_rotates_clockwise() {
        let g = PreviewGeometry {
            surface: Size::new(1920.0, 1080.0),
            frame: Size::new(1080.0, 1920.0),
            orientation: DeviceOrientation::LandscapeRight,
            gravity: VideoGravity::Resize,
        };
        // Buffer's visual bottom-left (normalized origin) lands at display top-left.
        let p = to_preview(Point::new(0.0, 0.0), &g).expect("map");
        assert!(close(p, 0.0, 0.0), "got {p:?}");
        // Buffer's visual top-left lands at display top-right.
        let p = to_preview(Point::new(0.0, 1.0), &g).expect("map");
        assert!(close(p, 1920.0, 0.0), "got {p:?}");
    }

    #[test]
    fn preview_round_trips_in_every_orientation() {
        for orientation in [
            DeviceOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight,
        ] {
            for gravity in [
                VideoGravity::Resize,
                VideoGravity::ResizeAspect,
                VideoGravity::ResizeAspectFill,
            ] {
                let g = geometry(orientation, gravity);
                let p = Point::<Normalized>::new(0.3, 0.6);
                let back = from_preview(to_preview(p, &g).expect("map"), &g).expect("inverse");
                assert!(
                    (back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9,
                    "{orientation:?}/{gravity:?}: {back:?}"
                );
            }
        }
    }

    #[test]
    fn polygon_keeps_visual_top_left_in_every_orientation() {
        for orientation in [
            DeviceOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight,
        ] {
            let g = geometry(orientation, VideoGravity::Resize);
            let Polygon(q) = quad_to_preview(&detector_quad(), &g).expect("map");
            assert!(q.top_left.x < q.top_right.x, "{orientation:?}: {q:?}");
            assert!(q.top_left.y < q.bottom_left.y, "{orientation:?}: {q:?}");
            assert!(q.bottom_left.x < q.bottom_right.x, "{orientation:?}: {q:?}");
        }
    }
}
