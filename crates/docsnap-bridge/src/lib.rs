// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docsnap-bridge: the seam between the scan pipeline and the host platform.
//
// The pipeline never talks to a camera SDK or a view hierarchy directly. A
// host supplies still frames, preview geometry, and an overlay sink through
// the traits in `traits`; desktop and CI builds get the stub.

pub mod stub;
pub mod traits;

pub use traits::*;

/// The bridge for the current build target.
///
/// Native hosts implement [`traits::PlatformBridge`] themselves and hand it to
/// the pipeline; everything else gets the stub, whose camera and renderer
/// report `PlatformUnavailable`.
pub fn platform_bridge() -> Box<dyn traits::PlatformBridge> {
    Box::new(stub::StubBridge)
}
