//! Frame type and pixel-format conversion to packed BGR.

/// A captured color camera frame, packed BGR (3 bytes per pixel).
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Average pixel brightness (0.0–255.0) across all channels.
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }
}

/// Pixel layout delivered by the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Packed 24-bit B, G, R.
    Bgr3,
    /// Packed 24-bit R, G, B.
    Rgb3,
    /// Motion-JPEG, one JPEG image per buffer.
    Mjpg,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format:?} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
    #[error("MJPG decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("MJPG frame is {actual_w}x{actual_h}, expected {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual_w: u32,
        actual_h: u32,
    },
}

/// Convert a raw capture buffer in `format` to packed BGR.
pub fn to_bgr(format: PixelFormat, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    let need = |expected: usize| {
        if buf.len() < expected {
            Err(FrameError::InvalidLength {
                format,
                expected,
                actual: buf.len(),
            })
        } else {
            Ok(&buf[..expected])
        }
    };

    match format {
        PixelFormat::Bgr3 => Ok(need(pixels * 3)?.to_vec()),
        PixelFormat::Rgb3 => Ok(swap_rb(need(pixels * 3)?)),
        PixelFormat::Yuyv => Ok(yuyv_to_bgr(need(pixels * 2)?)),
        PixelFormat::Mjpg => {
            let rgb = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)?.to_rgb8();
            if rgb.dimensions() != (width, height) {
                return Err(FrameError::SizeMismatch {
                    width,
                    height,
                    actual_w: rgb.width(),
                    actual_h: rgb.height(),
                });
            }
            Ok(swap_rb(rgb.as_raw()))
        }
    }
}

/// Swap the first and third channel of every packed 3-byte pixel.
fn swap_rb(packed: &[u8]) -> Vec<u8> {
    packed.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect()
}

/// Convert packed YUYV (4:2:2) to BGR with the BT.601 limited-range matrix.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V], sharing U and V.
fn yuyv_to_bgr(yuyv: &[u8]) -> Vec<u8> {
    let mut bgr = Vec::with_capacity(yuyv.len() / 2 * 3);
    for quad in yuyv.chunks_exact(4) {
        let (u, v) = (quad[1] as i32 - 128, quad[3] as i32 - 128);
        for y in [quad[0], quad[2]] {
            let c = 298 * (y as i32 - 16);
            let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
            bgr.push(clamp(c + 516 * u));
            bgr.push(clamp(c - 100 * u - 208 * v));
            bgr.push(clamp(c + 409 * v));
        }
    }
    bgr
}
