// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docsnap: drive a scan session from image files.
//
// Each FRAME is streamed through the detector as if it came from a live
// camera, overlay updates are logged, and a capture is taken from the still
// image (the last frame unless --still is given). The rectified page is
// written as a PNG.

mod host;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use docsnap_bridge::{NativeCaptureSink, NativeOverlayRenderer, platform_bridge};
use docsnap_core::config::CaptureFallback;
use docsnap_core::{DocsnapError, Result, ScannerConfig, Size};
use docsnap_pipeline::ScanSession;
use docsnap_vision::frame_from_image;
use tracing::{debug, info, warn};

use host::{FileStillCamera, FixedPreview, LogOverlay, PngSink, parse_surface};

#[derive(Parser)]
#[command(name = "docsnap")]
#[command(about = "Detect a document in camera frames and capture it flattened")]
struct Cli {
    /// Preview frames, streamed in order
    #[arg(value_name = "FRAME", required_unless_present = "dump_config")]
    frames: Vec<PathBuf>,

    /// Still image to capture from (defaults to the last frame)
    #[arg(long, value_name = "IMAGE")]
    still: Option<PathBuf>,

    /// Where to write the rectified page
    #[arg(short, long, value_name = "PNG", default_value = "docsnap.png")]
    output: PathBuf,

    /// Scanner configuration (JSON); defaults apply to missing fields
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preview surface the overlay is projected onto, as WIDTHxHEIGHT
    /// (defaults to the frame size)
    #[arg(long, value_name = "SIZE", value_parser = parse_surface)]
    preview: Option<Size>,

    /// Fail instead of capturing the full frame when no document is found
    #[arg(long)]
    reject_without_document: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => ScannerConfig::load(path)?,
        None => ScannerConfig::default(),
    };
    if args.reject_without_document {
        config.capture.fallback = CaptureFallback::Reject;
    }
    if args.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    debug!(platform = platform_bridge().platform_name(), "Native bridge unavailable, using files");

    let still_path = match args.still.clone().or_else(|| args.frames.last().cloned()) {
        Some(path) => path,
        None => return Err(DocsnapError::Config("no frames given".into())),
    };
    let camera = Arc::new(FileStillCamera::new(still_path));

    let gravity = config.preview.gravity;
    let mut session = ScanSession::start(config, camera)?;
    let mut overlays = session
        .take_overlay_updates()
        .ok_or(DocsnapError::PipelineClosed)?;
    let renderer = tokio::spawn(async move {
        let overlay = LogOverlay;
        while let Some(update) = overlays.recv().await {
            if let Err(err) = overlay.render_overlay(&update) {
                warn!(error = %err, "Overlay render failed");
            }
        }
    });

    let mut results = session.subscribe();
    for path in &args.frames {
        let image = image::open(path)
            .map_err(|e| DocsnapError::ImageError(format!("cannot read {}: {e}", path.display())))?;
        let frame = frame_from_image(&image);
        if let Some(surface) = args.preview {
            let host = FixedPreview::new(surface, frame.size(), gravity);
            session.sync_preview(&host)?;
        }
        let seq = session.offer_frame(&frame.as_frame())?;
        // Files arrive faster than a camera; wait so every frame is detected.
        results
            .wait_for(|r| r.frame_seq >= seq)
            .await
            .map_err(|_| DocsnapError::PipelineClosed)?;
        info!(frame = %path.display(), seq, found = session.latest().detection.is_some(), "Frame processed");
    }

    let outcome = session.capture().await;
    session.shutdown().await;
    if let Err(err) = renderer.await {
        warn!(error = %err, "Overlay renderer ended abnormally");
    }

    let image = outcome?;
    if image.used_fallback {
        warn!("No document detected, captured the full frame");
    }
    PngSink::new(args.output).deliver_capture(&image)
}
