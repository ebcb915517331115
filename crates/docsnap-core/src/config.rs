// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session configuration. Fixed for the lifetime of a scan session.

use serde::{Deserialize, Serialize};

use crate::error::{DocsnapError, Result};
use crate::types::VideoGravity;

/// Top-level scanner settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub detector: DetectorConfig,
    pub rectifier: RectifierConfig,
    pub capture: CaptureConfig,
    pub preview: PreviewConfig,
}

/// Quadrilateral search tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum length of the quad's shorter side, as a fraction of the
    /// frame's shorter side.
    pub min_size: f32,
    /// Maximum deviation from a right angle, in degrees.
    pub quadrature_tolerance_deg: f32,
    /// Minimum ratio of shorter to longer side.
    pub min_aspect_ratio: f32,
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of contour perimeter.
    pub approx_epsilon: f64,
    /// Candidates examined per frame, largest first.
    pub max_candidates: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_size: 0.2,
            quadrature_tolerance_deg: 30.0,
            min_aspect_ratio: 0.3,
            blur_sigma: 1.5,
            canny_low: 30.0,
            canny_high: 90.0,
            approx_epsilon: 0.02,
            max_candidates: 8,
        }
    }
}

/// Output raster settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierConfig {
    /// Longest allowed output side; larger results are scaled down.
    pub max_output_dimension: u32,
    /// RGBA fill for samples falling outside the source.
    pub background: [u8; 4],
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            max_output_dimension: 8192,
            background: [255, 255, 255, 255],
        }
    }
}

/// What a capture does when no quadrilateral is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureFallback {
    /// Rectify the full image bounds (output equals the still).
    #[default]
    FullFrame,
    /// Fail the capture with `NoQuadrilateral`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub fallback: CaptureFallback,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub gravity: VideoGravity,
}

impl ScannerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    /// Reject values the detector or rectifier cannot work with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if !(0.0..=1.0).contains(&d.min_size) {
            return Err(DocsnapError::Config(format!(
                "detector.min_size must be in [0, 1], got {}",
                d.min_size
            )));
        }
        if !(0.0..=90.0).contains(&d.quadrature_tolerance_deg) {
            return Err(DocsnapError::Config(format!(
                "detector.quadrature_tolerance_deg must be in [0, 90], got {}",
                d.quadrature_tolerance_deg
            )));
        }
        if !(0.0..=1.0).contains(&d.min_aspect_ratio) {
            return Err(DocsnapError::Config(format!(
                "detector.min_aspect_ratio must be in [0, 1], got {}",
                d.min_aspect_ratio
            )));
        }
        if d.approx_epsilon <= 0.0 || d.canny_low > d.canny_high || d.max_candidates == 0 {
            return Err(DocsnapError::Config(
                "detector edge parameters out of range".into(),
            ));
        }
        if self.rectifier.max_output_dimension == 0 {
            return Err(DocsnapError::Config(
                "rectifier.max_output_dimension must be positive".into(),
            ));
        }
        Ok(())
    }
}
