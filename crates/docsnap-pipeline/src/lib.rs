// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docsnap-pipeline: the live half of the scanner.
//
// One detection worker consumes the newest camera frame, publishes the latest
// detection in a single atomically replaced slot, and streams overlay updates
// to the render layer in order. Captures read that slot, take a still, and
// rectify it off the async executor.

pub mod capture;
pub mod overlay;
pub mod session;
pub mod stream;

pub use capture::CaptureController;
pub use overlay::OverlayState;
pub use session::ScanSession;
pub use stream::DetectionStream;
