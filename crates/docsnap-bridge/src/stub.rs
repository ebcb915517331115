// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds with no camera or preview surface.
//
// Every trait method returns `PlatformUnavailable`.

use docsnap_core::error::{DocsnapError, Result};
use docsnap_core::{FrameBuf, OverlayUpdate, PreviewGeometry, RectifiedImage};

use crate::traits::*;

/// No-op bridge returned on hosts without native integration.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl NativeStillCamera for StubBridge {
    fn capture_still(&self) -> Result<FrameBuf> {
        tracing::warn!("NativeStillCamera::capture_still called on stub bridge");
        Err(DocsnapError::PlatformUnavailable)
    }
}

impl NativePreviewHost for StubBridge {
    fn preview_geometry(&self) -> Result<PreviewGeometry> {
        tracing::warn!("NativePreviewHost::preview_geometry called on stub bridge");
        Err(DocsnapError::PlatformUnavailable)
    }
}

impl NativeOverlayRenderer for StubBridge {
    fn render_overlay(&self, _update: &OverlayUpdate) -> Result<()> {
        Err(DocsnapError::PlatformUnavailable)
    }
}

impl NativeCaptureSink for StubBridge {
    fn deliver_capture(&self, _image: &RectifiedImage) -> Result<()> {
        tracing::warn!("NativeCaptureSink::deliver_capture called on stub bridge");
        Err(DocsnapError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform_bridge;

    #[test]
    fn stub_reports_platform_unavailable() {
        let bridge = platform_bridge();
        assert_eq!(bridge.platform_name(), "Desktop (stub)");
        assert!(matches!(
            bridge.capture_still(),
            Err(DocsnapError::PlatformUnavailable)
        ));
        assert!(matches!(
            bridge.preview_geometry(),
            Err(DocsnapError::PlatformUnavailable)
        ));
    }
}
