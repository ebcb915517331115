// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral detection on individual camera frames.

pub mod quad_detector;

pub use quad_detector::QuadrilateralDetector;
