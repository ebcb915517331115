// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan session: the entry point a host drives.

use std::sync::Arc;

use docsnap_bridge::{NativePreviewHost, NativeStillCamera};
use docsnap_core::{
    DetectionResult, DocsnapError, Frame, OverlayUpdate, PreviewGeometry, RectifiedImage, Result,
    ScannerConfig,
};
use docsnap_vision::{PerspectiveRectifier, QuadrilateralDetector};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::capture::CaptureController;
use crate::stream::DetectionStream;

/// A running scan: one detection stream plus a capture controller sharing
/// its latest-detection slot.
///
/// Configuration is fixed for the life of the session.
pub struct ScanSession {
    stream: DetectionStream,
    capture: CaptureController,
    overlays: Option<mpsc::UnboundedReceiver<OverlayUpdate>>,
}

impl ScanSession {
    /// Validate `config` and start the detection worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: ScannerConfig, camera: Arc<dyn NativeStillCamera>) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| DocsnapError::Config(format!("scan session needs a Tokio runtime: {e}")))?;

        let (stream, overlays) = DetectionStream::spawn(
            QuadrilateralDetector::new(config.detector.clone()),
            config.preview.gravity,
        );
        let capture = CaptureController::new(
            camera,
            stream.subscribe(),
            PerspectiveRectifier::new(config.rectifier.clone()),
            config.capture.fallback,
        );
        info!(fallback = ?config.capture.fallback, "Scan session started");

        Ok(Self {
            stream,
            capture,
            overlays: Some(overlays),
        })
    }

    /// Hand one camera frame to the detector. The frame's pixels are copied;
    /// the caller may release its buffer as soon as this returns.
    pub fn offer_frame(&self, frame: &Frame<'_>) -> Result<u64> {
        self.stream.offer(frame)
    }

    /// Report a new preview surface size or device orientation.
    pub fn set_preview(&self, geometry: PreviewGeometry) {
        self.stream.set_preview(geometry);
    }

    /// Ask `host` for its current preview geometry and apply it. On error the
    /// previous geometry stays in effect.
    pub fn sync_preview(&self, host: &dyn NativePreviewHost) -> Result<()> {
        let geometry = host.preview_geometry()?;
        debug!(?geometry, "Preview geometry from host");
        self.set_preview(geometry);
        Ok(())
    }

    /// Capture a still and rectify it against the latest detection.
    pub async fn capture(&self) -> Result<RectifiedImage> {
        self.capture.capture().await
    }

    pub fn latest(&self) -> DetectionResult {
        self.stream.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectionResult> {
        self.stream.subscribe()
    }

    /// Take the ordered overlay update stream. Only the first call returns it.
    ///
    /// The stream is unbounded: updates accumulate until read, so a host
    /// that takes it must keep draining it.
    pub fn take_overlay_updates(&mut self) -> Option<mpsc::UnboundedReceiver<OverlayUpdate>> {
        self.overlays.take()
    }

    /// Stop the detection worker. Pending overlay updates remain readable.
    pub async fn shutdown(self) {
        self.stream.shutdown().await;
        info!("Scan session stopped");
    }
}
