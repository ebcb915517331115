// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification. Warps a quadrilateral region of a still image
// into an upright rectangle.

use docsnap_core::config::RectifierConfig;
use docsnap_core::{
    CaptureId, DocsnapError, FrameBuf, ImagePixels, Quad, RectifiedImage, Result,
};
use image::{Rgba, Rgba32FImage, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into_with};
use tracing::{debug, info, instrument, warn};

use crate::frame::rgba_from_frame;

/// Triangles smaller than this (square pixels) count as collinear corners.
const MIN_TRIANGLE_AREA: f64 = 0.5;

/// Sample coordinates this close to a whole pixel are snapped onto it.
const SNAP: f32 = 1e-2;

/// Flattens quadrilateral regions into rectangular rasters.
#[derive(Debug, Clone, Default)]
pub struct PerspectiveRectifier {
    config: RectifierConfig,
}

impl PerspectiveRectifier {
    pub fn new(config: RectifierConfig) -> Self {
        Self { config }
    }

    /// Output size for `quad`: mean top/bottom width by mean left/right
    /// height, scaled down to `max_output_dimension` if needed.
    pub fn output_size(&self, quad: &Quad<ImagePixels>) -> (u32, u32) {
        let width = quad.mean_width().round().max(1.0);
        let height = quad.mean_height().round().max(1.0);
        let longest = width.max(height);
        let cap = self.config.max_output_dimension.max(1) as f64;
        if longest <= cap {
            return (width as u32, height as u32);
        }
        let scale = cap / longest;
        (
            (width * scale).round().max(1.0) as u32,
            (height * scale).round().max(1.0) as u32,
        )
    }

    /// Rectify `quad` (visual corner roles, source pixels) out of `source`.
    ///
    /// Each output pixel centre is mapped back through the inverse transform
    /// and bilinearly sampled, so the result has no holes. Samples within half
    /// a pixel of the still clamp to its edge; anything further out gets the
    /// background colour.
    #[instrument(skip(self, source), fields(src_w = source.width(), src_h = source.height()))]
    pub fn rectify(&self, source: &RgbaImage, quad: &Quad<ImagePixels>) -> Result<RgbaImage> {
        validate_quad(quad).inspect_err(|err| warn!(error = %err, "Capture quad rejected"))?;
        if source.width() == 0 || source.height() == 0 {
            return Err(DocsnapError::ImageError("empty source image".into()));
        }

        let (out_w, out_h) = self.output_size(quad);
        let to_source = source_projection(quad, out_w, out_h).ok_or_else(|| {
            warn!(?quad, "Perspective transform is singular");
            DocsnapError::InvalidGeometry("perspective transform is singular".into())
        })?;
        debug!(out_w, out_h, "Perspective transform solved");

        // Output index -> output edge coords -> source edge coords -> padded index.
        let mapping = Projection::translate(0.5, 0.5) * to_source * Projection::translate(0.5, 0.5);
        let padded = padded_f32(source);
        let background = Rgba(self.config.background.map(f32::from));
        let mut warped = Rgba32FImage::from_pixel(out_w, out_h, background);
        warp_into_with(
            &padded,
            move |x, y| {
                let (u, v) = mapping * (x, y);
                (snap(u), snap(v))
            },
            Interpolation::Bilinear,
            background,
            &mut warped,
        );

        let output = RgbaImage::from_fn(out_w, out_h, |x, y| {
            Rgba(warped.get_pixel(x, y).0.map(|c| c.round().clamp(0.0, 255.0) as u8))
        });
        info!(out_w, out_h, "Perspective rectification applied");
        Ok(output)
    }

    /// Rectify a captured still and package the result, carrying the still's
    /// orientation through unchanged.
    pub fn rectify_still(
        &self,
        still: &FrameBuf,
        quad: &Quad<ImagePixels>,
        capture_id: CaptureId,
        used_fallback: bool,
    ) -> Result<RectifiedImage> {
        let source = rgba_from_frame(&still.as_frame())?;
        let output = self.rectify(&source, quad)?;
        let (width, height) = output.dimensions();
        Ok(RectifiedImage {
            capture_id,
            pixels: output.into_raw(),
            width,
            height,
            orientation: still.orientation,
            source_quad: *quad,
            used_fallback,
        })
    }
}

/// Reject quads that cannot define a perspective transform: non-finite
/// corners, any three corners collinear, or crossing edges.
pub fn validate_quad(quad: &Quad<ImagePixels>) -> Result<()> {
    if !quad.is_finite() {
        return Err(DocsnapError::InvalidGeometry(format!(
            "non-finite corner in {quad:?}"
        )));
    }

    let c = quad.cyclic();
    let cross = |a: usize, b: usize, d: usize| {
        (c[b].x - c[a].x) * (c[d].y - c[a].y) - (c[b].y - c[a].y) * (c[d].x - c[a].x)
    };

    // Twice the signed area of each corner triangle, in cyclic order.
    let turns = [cross(0, 1, 2), cross(1, 2, 3), cross(2, 3, 0), cross(3, 0, 1)];
    if turns.iter().any(|t| t.abs() / 2.0 < MIN_TRIANGLE_AREA) {
        return Err(DocsnapError::InvalidGeometry(format!(
            "collinear corners in {quad:?}"
        )));
    }
    if !(turns.iter().all(|&t| t > 0.0) || turns.iter().all(|&t| t < 0.0)) {
        return Err(DocsnapError::InvalidGeometry(format!(
            "crossing or concave edges in {quad:?}"
        )));
    }
    Ok(())
}

/// Projection from output rectangle edge coordinates onto the quad in source
/// edge coordinates.
///
/// Solved between the unit square and the quad scaled into unit range, which
/// keeps the control-point system well conditioned for large stills.
fn source_projection(quad: &Quad<ImagePixels>, out_w: u32, out_h: u32) -> Option<Projection> {
    let extent = [quad.top_left, quad.top_right, quad.bottom_left, quad.bottom_right]
        .iter()
        .fold(1.0f64, |m, p| m.max(p.x.abs()).max(p.y.abs()));
    let unit = |x: f64, y: f64| ((x / extent) as f32, (y / extent) as f32);
    let square = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
    let corners = [
        unit(quad.top_left.x, quad.top_left.y),
        unit(quad.top_right.x, quad.top_right.y),
        unit(quad.bottom_left.x, quad.bottom_left.y),
        unit(quad.bottom_right.x, quad.bottom_right.y),
    ];
    let unit_to_quad = Projection::from_control_points(square, corners)?;
    let extent = extent as f32;
    Some(
        Projection::scale(extent, extent)
            * unit_to_quad
            * Projection::scale(1.0 / out_w as f32, 1.0 / out_h as f32),
    )
}

/// `source` as float channels with a one-pixel replicated border, so the
/// last row and column still have a neighbour to blend with.
fn padded_f32(source: &RgbaImage) -> Rgba32FImage {
    let (w, h) = source.dimensions();
    Rgba32FImage::from_fn(w + 2, h + 2, |x, y| {
        let sx = x.saturating_sub(1).min(w - 1);
        let sy = y.saturating_sub(1).min(h - 1);
        Rgba(source.get_pixel(sx, sy).0.map(f32::from))
    })
}

fn snap(c: f32) -> f32 {
    let r = c.round();
    if (c - r).abs() < SNAP { r } else { c }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsnap_core::{ImageOrientation, PixelFormat, Point, Size};

    const CORNER_COLOURS: [[u8; 4]; 4] = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [255, 255, 0, 255],
    ];

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    fn quad(pts: [(f64, f64); 4]) -> Quad<ImagePixels> {
        Quad::new(
            Point::new(pts[0].0, pts[0].1),
            Point::new(pts[1].0, pts[1].1),
            Point::new(pts[2].0, pts[2].1),
            Point::new(pts[3].0, pts[3].1),
        )
    }

    #[test]
    fn full_bounds_is_identity() {
        let source = gradient(64, 48);
        let bounds = Quad::from_bounds(Size::new(64.0, 48.0));
        let output = PerspectiveRectifier::default()
            .rectify(&source, &bounds)
            .expect("rectify");
        assert_eq!(output.dimensions(), (64, 48));
        assert_eq!(output.as_raw(), source.as_raw());
    }

    #[test]
    fn skewed_quad_corners_sample_source_corners() {
        // tl, tr, bl, br
        let corners = [(30.0, 20.0), (170.0, 40.0), (20.0, 180.0), (180.0, 160.0)];
        // Every source pixel takes the colour of its nearest quad corner.
        let source = RgbaImage::from_fn(200, 200, |x, y| {
            let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
            let nearest = (0..4)
                .min_by(|&a, &b| {
                    let da = (corners[a].0 - px).hypot(corners[a].1 - py);
                    let db = (corners[b].0 - px).hypot(corners[b].1 - py);
                    da.total_cmp(&db)
                })
                .unwrap_or(0);
            Rgba(CORNER_COLOURS[nearest])
        });

        let output = PerspectiveRectifier::default()
            .rectify(&source, &quad(corners))
            .expect("rectify");
        let (w, h) = output.dimensions();
        // Mean edge lengths: top ≈ 141.4, bottom ≈ 161.2; left ≈ 160.3, right ≈ 120.4.
        assert_eq!((w, h), (151, 140));

        assert_eq!(output.get_pixel(0, 0).0, CORNER_COLOURS[0]);
        assert_eq!(output.get_pixel(w - 1, 0).0, CORNER_COLOURS[1]);
        assert_eq!(output.get_pixel(0, h - 1).0, CORNER_COLOURS[2]);
        assert_eq!(output.get_pixel(w - 1, h - 1).0, CORNER_COLOURS[3]);
    }

    #[test]
    fn samples_beyond_the_still_get_background() {
        let source = RgbaImage::from_pixel(40, 40, Rgba([10, 20, 30, 255]));
        let rectifier = PerspectiveRectifier::new(RectifierConfig {
            background: [1, 2, 3, 4],
            ..RectifierConfig::default()
        });
        // Left half of the quad lies off the still.
        let wide = quad([(-40.0, 0.0), (40.0, 0.0), (-40.0, 40.0), (40.0, 40.0)]);
        let output = rectifier.rectify(&source, &wide).expect("rectify");
        assert_eq!(output.dimensions(), (80, 40));
        assert_eq!(output.get_pixel(5, 20).0, [1, 2, 3, 4]);
        assert_eq!(output.get_pixel(60, 20).0, [10, 20, 30, 255]);
        assert_eq!(output.get_pixel(79, 39).0, [10, 20, 30, 255]);
    }

    #[test]
    fn collinear_corners_are_invalid_geometry() {
        let degenerate = quad([(0.0, 0.0), (50.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        let err = PerspectiveRectifier::default()
            .rectify(&gradient(120, 120), &degenerate)
            .expect_err("must fail");
        assert!(matches!(err, DocsnapError::InvalidGeometry(_)), "{err}");
    }

    #[test]
    fn crossing_edges_are_invalid_geometry() {
        // tr and br swapped: a bow-tie.
        let bowtie = quad([(0.0, 0.0), (100.0, 100.0), (0.0, 100.0), (100.0, 0.0)]);
        assert!(matches!(
            validate_quad(&bowtie),
            Err(DocsnapError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn nan_corner_is_invalid_geometry() {
        let bad = quad([(0.0, 0.0), (f64::NAN, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        assert!(matches!(
            validate_quad(&bad),
            Err(DocsnapError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn output_is_capped() {
        let rectifier = PerspectiveRectifier::new(RectifierConfig {
            max_output_dimension: 50,
            ..RectifierConfig::default()
        });
        let bounds = Quad::from_bounds(Size::new(200.0, 100.0));
        assert_eq!(rectifier.output_size(&bounds), (50, 25));
    }

    #[test]
    fn still_orientation_is_preserved() {
        let source = gradient(16, 8);
        let mut still = FrameBuf::packed(source.into_raw(), 16, 8, PixelFormat::Rgba8);
        still.orientation = ImageOrientation::Right;
        let id = CaptureId::new();
        let rectified = PerspectiveRectifier::default()
            .rectify_still(&still, &Quad::from_bounds(still.size()), id, true)
            .expect("rectify");
        assert_eq!(rectified.orientation, ImageOrientation::Right);
        assert_eq!(rectified.capture_id, id);
        assert_eq!(rectified.pixels, still.data);
        assert!(rectified.used_fallback);
    }
}
