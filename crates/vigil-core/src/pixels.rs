//! Pixel-buffer helpers for interleaved 8-bit, 3-channel frames.

use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PixelError {
    #[error("buffer too short for {width}x{height} BGR: expected {expected} bytes, got {actual}")]
    InvalidLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("downscale factor must be at least 1")]
    ZeroFactor,
}

fn check_len(bgr: &[u8], width: u32, height: u32) -> Result<usize, PixelError> {
    let expected = width as usize * height as usize * 3;
    if bgr.len() < expected {
        return Err(PixelError::InvalidLength {
            width,
            height,
            expected,
            actual: bgr.len(),
        });
    }
    Ok(expected)
}

/// Shrink a BGR frame by an integer `factor` per axis using area averaging.
///
/// Output is `width / factor` x `height / factor`; trailing rows/columns that
/// do not fill a whole block are dropped.
pub fn downscale_bgr(bgr: &[u8], width: u32, height: u32, factor: u32) -> Result<(Vec<u8>, u32, u32), PixelError> {
    if factor == 0 {
        return Err(PixelError::ZeroFactor);
    }
    check_len(bgr, width, height)?;

    let (out_w, out_h) = (width / factor, height / factor);
    let (w, f) = (width as usize, factor as usize);
    let block = (f * f) as u32;
    let mut out = Vec::with_capacity(out_w as usize * out_h as usize * 3);

    for oy in 0..out_h as usize {
        for ox in 0..out_w as usize {
            let mut sums = [0u32; 3];
            for y in oy * f..(oy + 1) * f {
                let row = (y * w + ox * f) * 3;
                for px in bgr[row..row + f * 3].chunks_exact(3) {
                    sums[0] += px[0] as u32;
                    sums[1] += px[1] as u32;
                    sums[2] += px[2] as u32;
                }
            }
            out.extend(sums.map(|s| ((s + block / 2) / block) as u8));
        }
    }

    Ok((out, out_w, out_h))
}

/// Reverse the channel order of a BGR frame into an [`RgbImage`].
pub fn bgr_to_rgb(bgr: &[u8], width: u32, height: u32) -> Result<RgbImage, PixelError> {
    let len = check_len(bgr, width, height)?;
    let rgb: Vec<u8> = bgr[..len]
        .chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    RgbImage::from_raw(width, height, rgb).ok_or(PixelError::InvalidLength {
        width,
        height,
        expected: len,
        actual: bgr.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downscale_averages_blocks() {
        // 4x2 frame, factor 2 → 2x1. Left block all 100, right block 0/200 alternating.
        let mut bgr = Vec::new();
        for _row in 0..2 {
            bgr.extend([100, 100, 100, 100, 100, 100, 0, 0, 0, 200, 200, 200]);
        }
        let (out, w, h) = downscale_bgr(&bgr, 4, 2, 2).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, vec![100, 100, 100, 100, 100, 100]);
    }

    #[test]
    fn test_downscale_by_four_drops_partial_blocks() {
        let bgr = vec![50u8; 10 * 9 * 3];
        let (out, w, h) = downscale_bgr(&bgr, 10, 9, 4).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(out.len(), 2 * 2 * 3);
        assert!(out.iter().all(|&v| v == 50));
    }

    #[test]
    fn test_downscale_keeps_channels_apart() {
        let bgr: Vec<u8> = (0..16).flat_map(|_| [10u8, 20, 30]).collect();
        let (out, _, _) = downscale_bgr(&bgr, 4, 4, 4).unwrap();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[test]
    fn test_downscale_rejects_zero_factor() {
        assert_eq!(downscale_bgr(&[0; 3], 1, 1, 0), Err(PixelError::ZeroFactor));
    }

    #[test]
    fn test_bgr_to_rgb_swaps_channels() {
        let bgr = vec![1, 2, 3, 4, 5, 6];
        let rgb = bgr_to_rgb(&bgr, 2, 1).unwrap();
        assert_eq!(rgb.as_raw(), &vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_bgr_to_rgb_short_buffer() {
        let err = bgr_to_rgb(&[1, 2, 3], 2, 1).unwrap_err();
        assert!(matches!(err, PixelError::InvalidLength { expected: 6, actual: 3, .. }));
    }
}
