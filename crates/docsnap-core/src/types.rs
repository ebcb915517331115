// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the docsnap capture pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocsnapError, Result};
use crate::geometry::{ImagePixels, Normalized, Preview, Quad, Size};

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
    /// Native layout of most mobile camera pipelines.
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }
}

/// Pinhole intrinsics in pixel units of the frame they accompany.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// EXIF orientation of a captured image. Carried through rectification
/// untouched; applying it is the display layer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageOrientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl ImageOrientation {
    /// EXIF `Orientation` tag value (1–8).
    pub fn exif_value(&self) -> u8 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Right => 6,
            Self::RightMirrored => 7,
            Self::Left => 8,
        }
    }

    pub fn from_exif(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Up,
            2 => Self::UpMirrored,
            3 => Self::Down,
            4 => Self::DownMirrored,
            5 => Self::LeftMirrored,
            6 => Self::Right,
            7 => Self::RightMirrored,
            8 => Self::Left,
            _ => return None,
        })
    }
}

/// A camera frame borrowed from the frame source for one callback.
///
/// The lifetime ties the pixel data to the callback; anything that must
/// outlive it goes through [`Frame::to_owned_buf`].
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: usize,
    pub format: PixelFormat,
    pub intrinsics: Option<CameraIntrinsics>,
    pub orientation: ImageOrientation,
}

impl<'a> Frame<'a> {
    /// Tightly packed frame (no row padding), upright, no intrinsics.
    pub fn packed(data: &'a [u8], width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_row: width as usize * format.bytes_per_pixel(),
            format,
            intrinsics: None,
            orientation: ImageOrientation::Up,
        }
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    pub fn with_orientation(mut self, orientation: ImageOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn size(&self) -> Size {
        Size::from_pixels(self.width, self.height)
    }

    /// Check that the buffer can hold `height` rows of `bytes_per_row`.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DocsnapError::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        let row = (self.width as usize)
            .checked_mul(self.format.bytes_per_pixel())
            .ok_or_else(|| DocsnapError::InvalidFrame(format!("row of {} pixels overflows", self.width)))?;
        if self.bytes_per_row < row {
            return Err(DocsnapError::InvalidFrame(format!(
                "row stride {} shorter than {} bytes of pixels",
                self.bytes_per_row, row
            )));
        }
        let needed = self
            .bytes_per_row
            .checked_mul(self.height as usize - 1)
            .and_then(|rows| rows.checked_add(row))
            .ok_or_else(|| {
                DocsnapError::InvalidFrame(format!(
                    "{} rows of {} bytes overflow the address space",
                    self.height, self.bytes_per_row
                ))
            })?;
        if self.data.len() < needed {
            return Err(DocsnapError::InvalidFrame(format!(
                "buffer holds {} bytes, frame needs {}",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }

    /// Copy the pixel data out of the callback.
    pub fn to_owned_buf(&self) -> FrameBuf {
        FrameBuf {
            data: self.data.to_vec(),
            width: self.width,
            height: self.height,
            bytes_per_row: self.bytes_per_row,
            format: self.format,
            intrinsics: self.intrinsics,
            orientation: self.orientation,
        }
    }
}

/// An owned frame: a still capture or a copy of a streamed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuf {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: usize,
    pub format: PixelFormat,
    pub intrinsics: Option<CameraIntrinsics>,
    pub orientation: ImageOrientation,
}

impl FrameBuf {
    pub fn packed(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_row: width as usize * format.bytes_per_pixel(),
            format,
            intrinsics: None,
            orientation: ImageOrientation::Up,
        }
    }

    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            data: &self.data,
            width: self.width,
            height: self.height,
            bytes_per_row: self.bytes_per_row,
            format: self.format,
            intrinsics: self.intrinsics,
            orientation: self.orientation,
        }
    }

    pub fn size(&self) -> Size {
        Size::from_pixels(self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// A detected quadrilateral with its size score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub quad: Quad<Normalized>,
    /// Fraction of the frame area covered by the quadrilateral.
    pub score: f32,
}

/// Outcome of one detection pass. Immutable once emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    /// Sequence number of the frame this result belongs to (0 = no frame yet).
    pub frame_seq: u64,
    pub detection: Option<Detection>,
}

impl DetectionResult {
    pub fn none(frame_seq: u64) -> Self {
        Self {
            frame_seq,
            detection: None,
        }
    }

    pub fn found(frame_seq: u64, detection: Detection) -> Self {
        Self {
            frame_seq,
            detection: Some(detection),
        }
    }

    pub fn quad(&self) -> Option<&Quad<Normalized>> {
        self.detection.as_ref().map(|d| &d.quad)
    }
}

impl Default for DetectionResult {
    fn default() -> Self {
        Self::none(0)
    }
}

// ---------------------------------------------------------------------------
// Preview / overlay
// ---------------------------------------------------------------------------

/// Current device orientation relative to the camera buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceOrientation {
    /// Buffer displayed as delivered.
    #[default]
    Portrait,
    /// Buffer rotated 180°.
    PortraitUpsideDown,
    /// Buffer rotated 90° counter-clockwise for display.
    LandscapeLeft,
    /// Buffer rotated 90° clockwise for display.
    LandscapeRight,
}

impl DeviceOrientation {
    /// Whether the displayed content swaps the buffer's width and height.
    pub fn is_landscape(&self) -> bool {
        matches!(self, Self::LandscapeLeft | Self::LandscapeRight)
    }
}

/// How the camera content is laid into the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoGravity {
    /// Stretch to fill, ignoring aspect.
    Resize,
    /// Fit inside, letterboxing.
    ResizeAspect,
    /// Fill, cropping overflow.
    #[default]
    ResizeAspectFill,
}

/// Everything needed to place detector output on the preview surface.
/// Passed explicitly on every conversion; nothing is cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewGeometry {
    /// Preview surface size in device pixels.
    pub surface: Size,
    /// Camera buffer size as delivered (before orientation).
    pub frame: Size,
    pub orientation: DeviceOrientation,
    pub gravity: VideoGravity,
}

/// Outline to draw over the preview, with each corner labelled by its visual
/// role (`top_left` is the corner the user sees at the top left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polygon(pub Quad<Preview>);

/// What the render layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Overlay {
    #[default]
    Empty,
    Showing(Polygon),
}

impl Overlay {
    pub fn polygon(&self) -> Option<&Polygon> {
        match self {
            Self::Empty => None,
            Self::Showing(polygon) => Some(polygon),
        }
    }
}

/// One overlay change, delivered to the render context in production order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayUpdate {
    pub frame_seq: u64,
    pub overlay: Overlay,
    /// Cosmetic hint: the outline moved rather than appeared or vanished.
    pub animate: bool,
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Unique identifier for a capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureId(pub Uuid);

impl CaptureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaptureId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A still frame paired with the latest completed detection at trigger time.
///
/// The two need not come from the same video frame.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub id: CaptureId,
    pub requested_at: DateTime<Utc>,
    pub still: FrameBuf,
    pub detection: DetectionResult,
}

/// The flattened document produced by one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RectifiedImage {
    pub capture_id: CaptureId,
    /// Tightly packed RGBA8 rows.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Orientation of the source still, unchanged.
    pub orientation: ImageOrientation,
    /// Corners the output was rectified from, in still-image pixels.
    pub source_quad: Quad<ImagePixels>,
    /// True when no detection was available and the full frame was used.
    pub used_fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exif_values_round_trip() {
        for value in 1..=8u8 {
            let orientation = ImageOrientation::from_exif(value).expect("valid tag");
            assert_eq!(orientation.exif_value(), value);
        }
        assert!(ImageOrientation::from_exif(0).is_none());
        assert!(ImageOrientation::from_exif(9).is_none());
    }

    #[test]
    fn padded_frame_validates() {
        // 3x2 RGB with 2 bytes of row padding; last row need not be padded.
        let data = vec![0u8; 11 + 9];
        let frame = Frame {
            bytes_per_row: 11,
            ..Frame::packed(&data, 3, 2, PixelFormat::Rgb8)
        };
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn short_buffer_is_rejected() {
        let data = vec![0u8; 10];
        let frame = Frame::packed(&data, 4, 4, PixelFormat::Gray8);
        assert!(matches!(
            frame.validate(),
            Err(DocsnapError::InvalidFrame(_))
        ));
    }

    #[test]
    fn huge_stride_is_rejected_not_overflowed() {
        let data = [0u8; 4];
        let frame = Frame {
            bytes_per_row: usize::MAX / 2 + 1,
            ..Frame::packed(&data, 1, 3, PixelFormat::Gray8)
        };
        assert!(matches!(
            frame.validate(),
            Err(DocsnapError::InvalidFrame(_))
        ));
    }

    #[test]
    fn owned_copy_matches_borrowed_frame() {
        let data: Vec<u8> = (0..16).collect();
        let frame = Frame::packed(&data, 2, 2, PixelFormat::Rgba8)
            .with_orientation(ImageOrientation::Right);
        let owned = frame.to_owned_buf();
        assert_eq!(owned.data, data);
        assert_eq!(owned.as_frame().orientation, ImageOrientation::Right);
    }
}
