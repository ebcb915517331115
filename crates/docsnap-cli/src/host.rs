// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File-backed stand-ins for the platform collaborators.

use std::path::PathBuf;

use docsnap_bridge::{NativeCaptureSink, NativeOverlayRenderer, NativePreviewHost, NativeStillCamera};
use docsnap_core::{
    DeviceOrientation, DocsnapError, FrameBuf, Overlay, OverlayUpdate, PreviewGeometry,
    RectifiedImage, Result, Size, VideoGravity,
};
use docsnap_vision::frame_from_image;
use tracing::info;

/// A "camera" whose still is an image file, decoded on every capture.
pub struct FileStillCamera {
    path: PathBuf,
}

impl FileStillCamera {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl NativeStillCamera for FileStillCamera {
    fn capture_still(&self) -> Result<FrameBuf> {
        let image = image::open(&self.path).map_err(|e| {
            DocsnapError::CaptureDevice(format!("cannot read {}: {e}", self.path.display()))
        })?;
        Ok(frame_from_image(&image))
    }
}

/// A preview surface of fixed size, held upright.
pub struct FixedPreview {
    surface: Size,
    frame: Size,
    gravity: VideoGravity,
}

impl FixedPreview {
    pub fn new(surface: Size, frame: Size, gravity: VideoGravity) -> Self {
        Self { surface, frame, gravity }
    }
}

impl NativePreviewHost for FixedPreview {
    fn preview_geometry(&self) -> Result<PreviewGeometry> {
        Ok(PreviewGeometry {
            surface: self.surface,
            frame: self.frame,
            orientation: DeviceOrientation::Portrait,
            gravity: self.gravity,
        })
    }
}

/// Parse a `WIDTHxHEIGHT` surface size.
pub fn parse_surface(arg: &str) -> std::result::Result<Size, String> {
    let (w, h) = arg
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {arg:?}"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("{v:?}: {e}"));
    let size = Size::new(parse(w)?, parse(h)?);
    if !size.is_valid() {
        return Err(format!("surface {arg:?} must be positive"));
    }
    Ok(size)
}

/// Renders overlay updates as log lines.
pub struct LogOverlay;

impl NativeOverlayRenderer for LogOverlay {
    fn render_overlay(&self, update: &OverlayUpdate) -> Result<()> {
        match &update.overlay {
            Overlay::Empty => info!(frame_seq = update.frame_seq, "Overlay: nothing to draw"),
            Overlay::Showing(polygon) => info!(
                frame_seq = update.frame_seq,
                animate = update.animate,
                outline = ?polygon.0,
                "Overlay: document outline"
            ),
        }
        Ok(())
    }
}

/// Writes the rectified capture as a PNG.
pub struct PngSink {
    path: PathBuf,
}

impl PngSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl NativeCaptureSink for PngSink {
    fn deliver_capture(&self, image: &RectifiedImage) -> Result<()> {
        image::save_buffer(
            &self.path,
            &image.pixels,
            image.width,
            image.height,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| DocsnapError::ImageError(format!("cannot write {}: {e}", self.path.display())))?;
        info!(
            path = %self.path.display(),
            width = image.width,
            height = image.height,
            orientation = image.orientation.exif_value(),
            "Capture written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsnap_core::{CaptureId, ImageOrientation, Quad, Size};

    #[test]
    fn png_sink_round_trips_through_file_camera() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.png");
        let pixels: Vec<u8> = (0..6 * 4 * 4).map(|i| (i * 7 % 256) as u8).collect();
        let rectified = RectifiedImage {
            capture_id: CaptureId::new(),
            pixels: pixels.clone(),
            width: 6,
            height: 4,
            orientation: ImageOrientation::Up,
            source_quad: Quad::from_bounds(Size::new(6.0, 4.0)),
            used_fallback: true,
        };
        PngSink::new(path.clone()).deliver_capture(&rectified).expect("write");

        let still = FileStillCamera::new(path).capture_still().expect("read back");
        assert_eq!((still.width, still.height), (6, 4));
        assert_eq!(still.data, pixels);
    }

    #[test]
    fn surface_sizes_parse() {
        assert_eq!(parse_surface("390x844"), Ok(Size::new(390.0, 844.0)));
        assert_eq!(parse_surface("1080X1920"), Ok(Size::new(1080.0, 1920.0)));
        assert!(parse_surface("390").is_err());
        assert!(parse_surface("0x844").is_err());
    }

    #[test]
    fn fixed_preview_reports_its_surface() {
        let host = FixedPreview::new(
            Size::new(390.0, 844.0),
            Size::new(640.0, 480.0),
            VideoGravity::ResizeAspect,
        );
        let geometry = host.preview_geometry().expect("geometry");
        assert_eq!(geometry.surface, Size::new(390.0, 844.0));
        assert_eq!(geometry.frame, Size::new(640.0, 480.0));
        assert_eq!(geometry.gravity, VideoGravity::ResizeAspect);
    }

    #[test]
    fn missing_still_is_a_capture_device_error() {
        let camera = FileStillCamera::new(PathBuf::from("/nonexistent/still.png"));
        assert!(matches!(
            camera.capture_still(),
            Err(DocsnapError::CaptureDevice(_))
        ));
    }
}
