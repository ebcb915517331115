// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docsnap.

use thiserror::Error;

/// Top-level error type for all docsnap operations.
#[derive(Debug, Error)]
pub enum DocsnapError {
    // -- Environment (surfaced by the platform collaborator) --
    #[error("no camera available")]
    NoCameraAvailable,

    #[error("camera permission denied")]
    PermissionDenied,

    // -- Detection --
    /// Per-frame detector failure. Swallowed by the detector and never
    /// surfaced past a single frame.
    #[error("detection failed: {0}")]
    DetectionFailed(String),

    // -- Geometry / frames --
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    // -- Capture --
    #[error("still capture failed: {0}")]
    CaptureDevice(String),

    #[error("a capture is already in flight")]
    CaptureBusy,

    #[error("no quadrilateral detected and fallback is disabled")]
    NoQuadrilateral,

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Storage / configuration --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    #[error("scan pipeline has shut down")]
    PipelineClosed,
}

impl DocsnapError {
    /// Failures confined to a single frame; the stream keeps running.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DetectionFailed(_) | Self::InvalidFrame(_))
    }

    /// Failures that end one capture attempt without touching the live stream.
    pub fn is_capture_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry(_)
                | Self::CaptureDevice(_)
                | Self::CaptureBusy
                | Self::NoQuadrilateral
                | Self::ImageError(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsnapError>;
