// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The continuous detection stream.
//
// Frames enter through a single-slot `watch` channel, so a frame offered
// while the worker is busy overwrites the one still waiting and the detector
// only ever sees the newest frame. The worker publishes each completed
// `DetectionResult` by replacing the whole value in a second `watch` slot and
// pushes the matching `OverlayUpdate` down an ordered channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use docsnap_core::{
    DetectionResult, DeviceOrientation, DocsnapError, Frame, FrameBuf, OverlayUpdate,
    PreviewGeometry, Result, VideoGravity,
};
use docsnap_vision::QuadrilateralDetector;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::overlay::OverlayState;

/// A copied frame tagged with its arrival sequence number.
#[derive(Debug)]
struct PendingFrame {
    seq: u64,
    frame: FrameBuf,
}

/// Handle to the running detection worker.
pub struct DetectionStream {
    frames: watch::Sender<Option<Arc<PendingFrame>>>,
    preview: watch::Sender<Option<PreviewGeometry>>,
    results: watch::Receiver<DetectionResult>,
    next_seq: AtomicU64,
    worker: JoinHandle<()>,
}

impl DetectionStream {
    /// Spawn the worker on the current Tokio runtime.
    ///
    /// Returns the stream handle and the receiving end of the overlay channel.
    /// That channel is unbounded so a stalled renderer never blocks detection;
    /// its backlog grows by one update per processed frame until the receiver
    /// drains it or is dropped.
    pub fn spawn(
        detector: QuadrilateralDetector,
        gravity: VideoGravity,
    ) -> (Self, mpsc::UnboundedReceiver<OverlayUpdate>) {
        let (frames_tx, frames_rx) = watch::channel(None);
        let (preview_tx, preview_rx) = watch::channel(None);
        let (results_tx, results_rx) = watch::channel(DetectionResult::default());
        let (overlay_tx, overlay_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(
            Arc::new(detector),
            gravity,
            frames_rx,
            preview_rx,
            results_tx,
            overlay_tx,
        ));
        info!("Detection stream started");

        let stream = Self {
            frames: frames_tx,
            preview: preview_tx,
            results: results_rx,
            next_seq: AtomicU64::new(1),
            worker,
        };
        (stream, overlay_rx)
    }

    /// Copy `frame` into the detection slot and return its sequence number.
    ///
    /// Never blocks: a frame still waiting in the slot is replaced.
    pub fn offer(&self, frame: &Frame<'_>) -> Result<u64> {
        frame.validate()?;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let pending = PendingFrame {
            seq,
            frame: frame.to_owned_buf(),
        };
        self.frames
            .send(Some(Arc::new(pending)))
            .map_err(|_| DocsnapError::PipelineClosed)?;
        Ok(seq)
    }

    /// Replace the preview geometry used for subsequent overlay updates.
    pub fn set_preview(&self, geometry: PreviewGeometry) {
        self.preview.send_replace(Some(geometry));
    }

    /// Snapshot of the last completed detection.
    pub fn latest(&self) -> DetectionResult {
        *self.results.borrow()
    }

    /// A receiver observing every published detection.
    pub fn subscribe(&self) -> watch::Receiver<DetectionResult> {
        self.results.clone()
    }

    /// Close the frame slot and wait for the worker to drain.
    pub async fn shutdown(self) {
        drop(self.frames);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "Detection worker ended abnormally");
        }
        info!("Detection stream stopped");
    }
}

#[instrument(skip_all)]
async fn run_worker(
    detector: Arc<QuadrilateralDetector>,
    gravity: VideoGravity,
    mut frames: watch::Receiver<Option<Arc<PendingFrame>>>,
    preview: watch::Receiver<Option<PreviewGeometry>>,
    results: watch::Sender<DetectionResult>,
    overlays: mpsc::UnboundedSender<OverlayUpdate>,
) {
    let mut overlay = OverlayState::new();
    let mut last_seq = 0u64;

    while frames.changed().await.is_ok() {
        let Some(pending) = frames.borrow_and_update().clone() else {
            continue;
        };
        if pending.seq > last_seq + 1 {
            debug!(skipped = pending.seq - last_seq - 1, "Frames dropped while busy");
        }
        last_seq = pending.seq;

        let job = Arc::clone(&pending);
        let det = Arc::clone(&detector);
        let detection = match tokio::task::spawn_blocking(move || det.detect(&job.frame.as_frame()))
            .await
        {
            Ok(detection) => detection,
            Err(err) => {
                warn!(frame_seq = pending.seq, error = %err, "Detection task failed");
                None
            }
        };

        let result = match detection {
            Some(detection) => DetectionResult::found(pending.seq, detection),
            None => DetectionResult::none(pending.seq),
        };
        results.send_replace(result);

        let geometry = (*preview.borrow())
            .unwrap_or_else(|| default_preview(&pending.frame, gravity));
        let update = overlay.apply(&result, &geometry);
        if overlays.send(update).is_err() {
            debug!(frame_seq = pending.seq, "Overlay receiver gone");
        }
    }
}

/// Preview geometry used until the host reports one: the surface is the
/// frame itself, upright.
fn default_preview(frame: &FrameBuf, gravity: VideoGravity) -> PreviewGeometry {
    PreviewGeometry {
        surface: frame.size(),
        frame: frame.size(),
        orientation: DeviceOrientation::Portrait,
        gravity,
    }
}
