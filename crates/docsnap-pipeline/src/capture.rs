// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One-shot capture: pair a still with the latest detection and rectify it.

use std::sync::Arc;

use chrono::Utc;
use docsnap_bridge::NativeStillCamera;
use docsnap_core::config::CaptureFallback;
use docsnap_core::{
    CaptureId, CaptureRequest, DetectionResult, DocsnapError, Quad, RectifiedImage, Result,
};
use docsnap_vision::{PerspectiveRectifier, mapper};
use tokio::sync::{Mutex, watch};
use tracing::{info, instrument, warn};

/// Runs at most one capture at a time.
///
/// A trigger arriving while another capture is in flight is rejected with
/// `CaptureBusy` rather than queued.
pub struct CaptureController {
    camera: Arc<dyn NativeStillCamera>,
    detections: watch::Receiver<DetectionResult>,
    rectifier: Arc<PerspectiveRectifier>,
    fallback: CaptureFallback,
    in_flight: Mutex<()>,
}

impl CaptureController {
    pub fn new(
        camera: Arc<dyn NativeStillCamera>,
        detections: watch::Receiver<DetectionResult>,
        rectifier: PerspectiveRectifier,
        fallback: CaptureFallback,
    ) -> Self {
        Self {
            camera,
            detections,
            rectifier: Arc::new(rectifier),
            fallback,
            in_flight: Mutex::new(()),
        }
    }

    /// Capture and rectify one document.
    ///
    /// The detection used is the last one completed when the trigger fired;
    /// detections finishing while the still is being taken are not consulted.
    #[instrument(skip(self))]
    pub async fn capture(&self) -> Result<RectifiedImage> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            warn!("Capture rejected, another is in flight");
            DocsnapError::CaptureBusy
        })?;

        let id = CaptureId::new();
        let requested_at = Utc::now();
        let detection = *self.detections.borrow();

        let camera = Arc::clone(&self.camera);
        let still = tokio::task::spawn_blocking(move || camera.capture_still())
            .await
            .map_err(|e| DocsnapError::CaptureDevice(format!("still capture task failed: {e}")))??;
        still.as_frame().validate()?;

        let request = CaptureRequest {
            id,
            requested_at,
            still,
            detection,
        };
        info!(
            capture_id = %id,
            frame_seq = detection.frame_seq,
            detected = detection.detection.is_some(),
            "Still captured"
        );

        let rectifier = Arc::clone(&self.rectifier);
        let fallback = self.fallback;
        tokio::task::spawn_blocking(move || rectify_request(&rectifier, fallback, &request))
            .await
            .map_err(|e| DocsnapError::ImageError(format!("rectification task failed: {e}")))?
    }
}

/// Rectify a capture request, applying the fallback policy when the request
/// carries no detection.
pub fn rectify_request(
    rectifier: &PerspectiveRectifier,
    fallback: CaptureFallback,
    request: &CaptureRequest,
) -> Result<RectifiedImage> {
    let size = request.still.size();
    let (quad, used_fallback) = match request.detection.quad() {
        Some(quad) => (mapper::quad_to_image_pixels(quad, size)?, false),
        None => match fallback {
            CaptureFallback::FullFrame => (Quad::from_bounds(size), true),
            CaptureFallback::Reject => return Err(DocsnapError::NoQuadrilateral),
        },
    };

    let image = rectifier.rectify_still(&request.still, &quad, request.id, used_fallback)?;
    info!(
        capture_id = %request.id,
        width = image.width,
        height = image.height,
        used_fallback,
        "Capture rectified"
    );
    Ok(image)
}
