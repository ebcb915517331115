// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-frame quadrilateral detection: edge extraction, contour tracing,
// polygon approximation, and rectangle-likeness filtering.

use docsnap_core::config::DetectorConfig;
use docsnap_core::{
    CameraIntrinsics, Detection, DocsnapError, Frame, Normalized, Point, Quad, Result,
};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, instrument, trace};

use crate::frame::luma_from_frame;

/// Vertices turning by less than this (degrees) are treated as lying on a
/// straight edge and dropped during simplification.
const STRAIGHT_TURN_DEG: f64 = 25.0;

/// Fraction of each side, at either end, left out of the edge line fit.
const CORNER_MARGIN: f64 = 0.15;

/// A side needs at least this many contour points to fit a line.
const MIN_SIDE_POINTS: usize = 5;

/// Refined corners may move at most this fraction of the shortest side.
const MAX_CORNER_SHIFT: f64 = 0.25;

/// Finds the best document-like quadrilateral in a frame.
///
/// Stateless apart from its configuration; one call processes one frame to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct QuadrilateralDetector {
    config: DetectorConfig,
}

/// A closed four-vertex contour in pixel coordinates (y down), cyclic order.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    corners: [(f64, f64); 4],
    area: f64,
}

impl QuadrilateralDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Detect the highest-ranked quadrilateral, or `None`.
    ///
    /// Internal failures (unreadable buffer, degenerate candidates) drop the
    /// frame and yield `None`; they never reach the caller.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn detect(&self, frame: &Frame<'_>) -> Option<Detection> {
        match self.try_detect(frame) {
            Ok(detection) => detection,
            Err(err) => {
                debug!(error = %err, "Frame dropped by detector");
                None
            }
        }
    }

    /// Like [`detect`](Self::detect) but reports internal failures.
    pub fn try_detect(&self, frame: &Frame<'_>) -> Result<Option<Detection>> {
        let gray = luma_from_frame(frame)?;
        let (width, height) = (frame.width as f64, frame.height as f64);

        let candidates = self.find_candidates(&gray);
        trace!(count = candidates.len(), "Quad candidates");

        let min_side = self.config.min_size as f64 * width.min(height);
        for candidate in candidates.iter().take(self.config.max_candidates) {
            if !self.accepts(candidate, min_side, frame.intrinsics) {
                continue;
            }
            let quad = label_normalized(&candidate.corners, width, height)?;
            let score = (candidate.area / (width * height)) as f32;
            debug!(score, ?quad, "Quadrilateral detected");
            return Ok(Some(Detection { quad, score }));
        }
        Ok(None)
    }

    /// Four-vertex contours, largest first.
    fn find_candidates(&self, gray: &GrayImage) -> Vec<Candidate> {
        let blurred = if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, self.config.blur_sigma)
        } else {
            gray.clone()
        };
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        // Close one-pixel gaps at corners so outlines trace as a single loop.
        let edges = dilate(&edges, Norm::LInf, 1);

        let mut candidates: Vec<Candidate> = find_contours::<i32>(&edges)
            .into_iter()
            .filter(|contour| {
                matches!(contour.border_type, BorderType::Outer) && contour.points.len() >= 4
            })
            .filter_map(|contour| {
                let perimeter = arc_length(&contour.points, true);
                if perimeter < 8.0 {
                    return None;
                }
                let epsilon = self.config.approx_epsilon * perimeter;
                let approx = approximate_polygon_dp(&contour.points, epsilon, true);
                let vertices: Vec<(f64, f64)> =
                    approx.iter().map(|p| (p.x as f64, p.y as f64)).collect();
                let rough = simplify_to_quad(vertices)?;
                let outline: Vec<(f64, f64)> =
                    contour.points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
                let corners = refine_corners(&rough, &outline, epsilon).unwrap_or(rough);
                let area = polygon_area(&corners);
                Some(Candidate { corners, area })
            })
            .collect();

        candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
        candidates
    }

    fn accepts(
        &self,
        candidate: &Candidate,
        min_side: f64,
        intrinsics: Option<CameraIntrinsics>,
    ) -> bool {
        let c = &candidate.corners;
        if !is_convex(c) {
            return false;
        }

        let sides: Vec<f64> = (0..4).map(|i| distance(c[i], c[(i + 1) % 4])).collect();
        let shortest = sides.iter().copied().fold(f64::INFINITY, f64::min);
        if shortest < min_side {
            trace!(shortest, min_side, "Candidate too small");
            return false;
        }

        let mean_a = (sides[0] + sides[2]) / 2.0;
        let mean_b = (sides[1] + sides[3]) / 2.0;
        if mean_a.min(mean_b) / mean_a.max(mean_b) < self.config.min_aspect_ratio as f64 {
            trace!(mean_a, mean_b, "Candidate too elongated");
            return false;
        }

        let deviation = match intrinsics {
            Some(k) => metric_deviation_deg(c, &k).unwrap_or_else(|err| {
                trace!(error = %err, "Metric angle unavailable");
                f64::INFINITY
            }),
            None => max_corner_deviation_deg(c),
        };
        if deviation > self.config.quadrature_tolerance_deg as f64 {
            trace!(deviation, "Candidate not rectangular enough");
            return false;
        }
        true
    }
}

/// Reduce an approximated polygon to four corners by dropping near-straight
/// vertices. Returns `None` when the shape has fewer than four real corners
/// or more than four sharp ones.
fn simplify_to_quad(mut vertices: Vec<(f64, f64)>) -> Option<[(f64, f64); 4]> {
    vertices.dedup();
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    while vertices.len() > 4 {
        let n = vertices.len();
        let (index, turn) = (0..n)
            .map(|i| (i, turn_deg(vertices[(i + n - 1) % n], vertices[i], vertices[(i + 1) % n])))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        if turn > STRAIGHT_TURN_DEG {
            return None;
        }
        vertices.remove(index);
    }

    match vertices.as_slice() {
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        _ => None,
    }
}

/// Move each corner onto the intersection of its two sides, each side a
/// least-squares line through the contour points along it.
///
/// Polygon approximation keeps contour vertices, which cut across rounded or
/// blurred corners. Points near the corners are left out of the fits. Returns
/// `None` when a side has too few points or the lines meet far from the
/// rough corners.
fn refine_corners(
    rough: &[(f64, f64); 4],
    outline: &[(f64, f64)],
    band: f64,
) -> Option<[(f64, f64); 4]> {
    let band = band.max(2.0);
    let mut sides = [((0.0, 0.0), (0.0, 0.0)); 4];
    for (i, side) in sides.iter_mut().enumerate() {
        let (a, b) = (rough[i], rough[(i + 1) % 4]);
        let len = distance(a, b);
        if len < 1.0 {
            return None;
        }
        let dir = ((b.0 - a.0) / len, (b.1 - a.1) / len);
        let along: Vec<(f64, f64)> = outline
            .iter()
            .copied()
            .filter(|p| {
                let t = (p.0 - a.0) * dir.0 + (p.1 - a.1) * dir.1;
                let off = ((p.0 - a.0) * dir.1 - (p.1 - a.1) * dir.0).abs();
                t > CORNER_MARGIN * len && t < (1.0 - CORNER_MARGIN) * len && off <= band
            })
            .collect();
        *side = fit_line(&along)?;
    }

    let shortest = (0..4)
        .map(|i| distance(rough[i], rough[(i + 1) % 4]))
        .fold(f64::INFINITY, f64::min);
    let mut refined = [(0.0, 0.0); 4];
    for i in 0..4 {
        // Corner i joins the side ending at it and the side starting at it.
        let corner = intersect_lines(sides[(i + 3) % 4], sides[i])?;
        if distance(corner, rough[i]) > MAX_CORNER_SHIFT * shortest {
            trace!(?corner, rough = ?rough[i], "Refined corner moved too far");
            return None;
        }
        refined[i] = corner;
    }
    Some(refined)
}

/// Total least-squares line through `points` as (centroid, unit direction).
fn fit_line(points: &[(f64, f64)]) -> Option<((f64, f64), (f64, f64))> {
    if points.len() < MIN_SIDE_POINTS {
        return None;
    }
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &(x, y) in points {
        let (dx, dy) = (x - cx, y - cy);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    // Principal axis of the 2x2 scatter matrix.
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(((cx, cy), (theta.cos(), theta.sin())))
}

/// Intersection of two lines given as (point, direction); `None` if parallel.
fn intersect_lines(
    (p1, d1): ((f64, f64), (f64, f64)),
    (p2, d2): ((f64, f64), (f64, f64)),
) -> Option<(f64, f64)> {
    let denom = d1.0 * d2.1 - d1.1 * d2.0;
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = ((p2.0 - p1.0) * d2.1 - (p2.1 - p1.1) * d2.0) / denom;
    Some((p1.0 + t * d1.0, p1.1 + t * d1.1))
}

/// Assign detector labels in normalized (bottom-left origin) space.
///
/// Corners are ordered counter-clockwise (y up) around their centroid,
/// starting from the corner nearest the origin, which becomes `top_left`.
fn label_normalized(corners: &[(f64, f64); 4], width: f64, height: f64) -> Result<Quad<Normalized>> {
    let pts: Vec<(f64, f64)> = corners
        .iter()
        .map(|&(x, y)| ((x / width).clamp(0.0, 1.0), (1.0 - y / height).clamp(0.0, 1.0)))
        .collect();

    let cx = pts.iter().map(|p| p.0).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / 4.0;
    let mut ordered = pts;
    ordered.sort_by(|a, b| {
        let ta = (a.1 - cy).atan2(a.0 - cx);
        let tb = (b.1 - cy).atan2(b.0 - cx);
        ta.total_cmp(&tb)
    });

    let start = ordered
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1.0 + a.1.1).total_cmp(&(b.1.0 + b.1.1)))
        .map(|(i, _)| i)
        .ok_or_else(|| DocsnapError::DetectionFailed("empty corner set".into()))?;
    let at = |k: usize| {
        let (x, y) = ordered[(start + k) % 4];
        Point::new(x, y)
    };

    // Counter-clockwise from the origin corner: tl, tr, br, bl.
    Ok(Quad::new(at(0), at(1), at(3), at(2)))
}

/// Largest deviation from 90° over the four image-space interior angles.
fn max_corner_deviation_deg(c: &[(f64, f64); 4]) -> f64 {
    (0..4)
        .map(|i| {
            let angle = 180.0 - turn_deg(c[(i + 3) % 4], c[i], c[(i + 1) % 4]);
            (angle - 90.0).abs()
        })
        .fold(0.0, f64::max)
}

/// Deviation from 90° of the angle between the two vanishing directions,
/// back-projected through the camera matrix. This is the corner angle of the
/// physical planar shape, independent of viewing tilt.
fn metric_deviation_deg(c: &[(f64, f64); 4], k: &CameraIntrinsics) -> Result<f64> {
    let camera = Matrix3::new(k.fx, 0.0, k.cx, 0.0, k.fy, k.cy, 0.0, 0.0, 1.0);
    let inverse = camera
        .try_inverse()
        .ok_or_else(|| DocsnapError::DetectionFailed("singular camera intrinsics".into()))?;

    let h = |i: usize| Vector3::new(c[i].0, c[i].1, 1.0);
    let v1 = h(0).cross(&h(1)).cross(&h(3).cross(&h(2)));
    let v2 = h(0).cross(&h(3)).cross(&h(1).cross(&h(2)));

    let d1 = inverse * v1;
    let d2 = inverse * v2;
    let norms = d1.norm() * d2.norm();
    if norms < f64::EPSILON {
        return Err(DocsnapError::DetectionFailed(
            "coincident quadrilateral edges".into(),
        ));
    }
    let angle = (d1.dot(&d2).abs() / norms).clamp(0.0, 1.0).acos().to_degrees();
    Ok(90.0 - angle)
}

/// Turning angle at `b` in degrees: 0 for a straight continuation, 90 for a
/// right-angle corner.
fn turn_deg(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let (ux, uy) = (b.0 - a.0, b.1 - a.1);
    let (vx, vy) = (c.0 - b.0, c.1 - b.1);
    let norms = ux.hypot(uy) * vx.hypot(vy);
    if norms == 0.0 {
        return 0.0;
    }
    ((ux * vx + uy * vy) / norms).clamp(-1.0, 1.0).acos().to_degrees()
}

fn is_convex(c: &[(f64, f64); 4]) -> bool {
    let cross = |i: usize| {
        let (a, b, d) = (c[i], c[(i + 1) % 4], c[(i + 2) % 4]);
        (b.0 - a.0) * (d.1 - b.1) - (b.1 - a.1) * (d.0 - b.0)
    };
    let signs: Vec<f64> = (0..4).map(cross).collect();
    signs.iter().all(|&s| s > 0.0) || signs.iter().all(|&s| s < 0.0)
}

fn polygon_area(c: &[(f64, f64); 4]) -> f64 {
    let mut twice = 0.0;
    for i in 0..4 {
        let j = (i + 1) % 4;
        twice += c[i].0 * c[j].1 - c[j].0 * c[i].1;
    }
    twice.abs() / 2.0
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
