// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the capabilities a scan host
// provides.

use docsnap_core::error::Result;
use docsnap_core::{FrameBuf, OverlayUpdate, PreviewGeometry, RectifiedImage};

/// Unified bridge that groups all host capabilities.
pub trait PlatformBridge:
    NativeStillCamera + NativePreviewHost + NativeOverlayRenderer + NativeCaptureSink
{
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// Full-resolution still capture.
///
/// Called from a blocking worker thread, at most once at a time per session.
pub trait NativeStillCamera: Send + Sync {
    /// Take one still and return an owned copy of its pixels.
    ///
    /// Device failures map to `DocsnapError::CaptureDevice`.
    fn capture_still(&self) -> Result<FrameBuf>;
}

/// The on-screen preview surface.
pub trait NativePreviewHost {
    /// Current surface size, buffer size, device orientation, and gravity.
    fn preview_geometry(&self) -> Result<PreviewGeometry>;
}

/// Draws the live outline over the preview.
pub trait NativeOverlayRenderer {
    /// Apply one update. Updates arrive in production order.
    fn render_overlay(&self, update: &OverlayUpdate) -> Result<()>;
}

/// Receives finished captures (display, share, persist).
pub trait NativeCaptureSink {
    fn deliver_capture(&self, image: &RectifiedImage) -> Result<()>;
}
