// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docsnap: core types, coordinate spaces, configuration, and error
// definitions shared across all crates.

pub mod config;
pub mod error;
pub mod geometry;
pub mod types;

pub use config::ScannerConfig;
pub use error::{DocsnapError, Result};
pub use geometry::{ImagePixels, Normalized, Point, Preview, Quad, Size, Space};
pub use types::*;
