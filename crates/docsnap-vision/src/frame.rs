// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame buffer → `image` raster conversion, honouring row stride and pixel
// format.

use docsnap_core::{Frame, FrameBuf, PixelFormat, Result};
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Convert a frame to 8-bit luminance (Rec. 601 weights).
pub fn luma_from_frame(frame: &Frame<'_>) -> Result<GrayImage> {
    frame.validate()?;
    let bpp = frame.format.bytes_per_pixel();
    let mut out = GrayImage::new(frame.width, frame.height);
    for (y, row) in rows(frame).enumerate() {
        for x in 0..frame.width as usize {
            let px = &row[x * bpp..x * bpp + bpp];
            let value = match frame.format {
                PixelFormat::Gray8 => px[0],
                PixelFormat::Rgb8 | PixelFormat::Rgba8 => luminance(px[0], px[1], px[2]),
                PixelFormat::Bgra8 => luminance(px[2], px[1], px[0]),
            };
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    Ok(out)
}

/// Convert a frame to RGBA8.
pub fn rgba_from_frame(frame: &Frame<'_>) -> Result<RgbaImage> {
    frame.validate()?;
    let bpp = frame.format.bytes_per_pixel();
    let mut out = RgbaImage::new(frame.width, frame.height);
    for (y, row) in rows(frame).enumerate() {
        for x in 0..frame.width as usize {
            let px = &row[x * bpp..x * bpp + bpp];
            let rgba = match frame.format {
                PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
                PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
                PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
                PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
            };
            out.put_pixel(x as u32, y as u32, Rgba(rgba));
        }
    }
    Ok(out)
}

/// Wrap a decoded image as a packed RGBA8 frame buffer.
pub fn frame_from_image(image: &image::DynamicImage) -> FrameBuf {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    FrameBuf::packed(rgba.into_raw(), width, height, PixelFormat::Rgba8)
}

/// Copy a raster into a packed RGBA8 frame buffer.
pub fn frame_from_rgba(image: &RgbaImage) -> FrameBuf {
    FrameBuf::packed(
        image.as_raw().clone(),
        image.width(),
        image.height(),
        PixelFormat::Rgba8,
    )
}

fn rows<'f>(frame: &'f Frame<'_>) -> impl Iterator<Item = &'f [u8]> {
    let row_len = frame.width as usize * frame.format.bytes_per_pixel();
    (0..frame.height as usize).map(move |y| {
        let start = y * frame.bytes_per_row;
        &frame.data[start..start + row_len]
    })
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_channels_are_swapped() {
        let data = [10u8, 20, 30, 255];
        let frame = Frame::packed(&data, 1, 1, PixelFormat::Bgra8);
        let rgba = rgba_from_frame(&frame).expect("convert");
        assert_eq!(rgba.get_pixel(0, 0).0, [30, 20, 10, 255]);
    }

    #[test]
    fn row_padding_is_skipped() {
        // 2x2 gray, stride 4: padding bytes are 99 and must not leak.
        let data = [1u8, 2, 99, 99, 3, 4];
        let frame = Frame {
            bytes_per_row: 4,
            ..Frame::packed(&data, 2, 2, PixelFormat::Gray8)
        };
        let gray = luma_from_frame(&frame).expect("convert");
        assert_eq!(gray.as_raw(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn white_rgb_is_white_luma() {
        let data = [255u8; 3];
        let frame = Frame::packed(&data, 1, 1, PixelFormat::Rgb8);
        assert_eq!(luma_from_frame(&frame).expect("convert").get_pixel(0, 0).0, [255]);
    }
}
