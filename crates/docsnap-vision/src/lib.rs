// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docsnap-vision: the pure image-processing half of the scanner.
//
// Maps coordinates between the detector, preview, and still-image spaces,
// finds document-like quadrilaterals in preview frames, and flattens a
// quadrilateral region of a still into an upright rectangle.

pub mod detect;
pub mod frame;
pub mod geometry;
pub mod rectify;

// Re-export the primary entry points so callers can use `docsnap_vision::QuadrilateralDetector` etc.
pub use detect::QuadrilateralDetector;
pub use frame::{frame_from_image, frame_from_rgba, luma_from_frame, rgba_from_frame};
pub use geometry::mapper;
pub use rectify::PerspectiveRectifier;
