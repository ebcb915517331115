// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Projection of detection results onto the preview surface.

use docsnap_core::{DetectionResult, Overlay, OverlayUpdate, PreviewGeometry};
use docsnap_vision::mapper;
use tracing::debug;

/// What the render layer should currently draw.
///
/// Each result fully replaces the previous overlay; nothing is smoothed or
/// held over between frames.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    current: Overlay,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Overlay {
        &self.current
    }

    /// Replace the overlay with the projection of `result`.
    ///
    /// A quad that cannot be mapped into the preview (degenerate or
    /// non-finite) shows as `Empty`.
    pub fn apply(&mut self, result: &DetectionResult, geometry: &PreviewGeometry) -> OverlayUpdate {
        let next = match result.quad() {
            Some(quad) => match mapper::quad_to_preview(quad, geometry) {
                Ok(polygon) => Overlay::Showing(polygon),
                Err(err) => {
                    debug!(frame_seq = result.frame_seq, error = %err, "Overlay dropped");
                    Overlay::Empty
                }
            },
            None => Overlay::Empty,
        };

        let animate = matches!(
            (&self.current, &next),
            (Overlay::Showing(_), Overlay::Showing(_))
        );
        self.current = next;

        OverlayUpdate {
            frame_seq: result.frame_seq,
            overlay: next,
            animate,
        }
    }
}
