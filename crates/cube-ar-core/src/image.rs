use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Resize the buffer to `width × height`.
    ///
    /// Returns `true` when the dimensions changed. Pixel contents are
    /// unspecified afterwards; callers overwrite every pixel.
    pub fn ensure_size(&mut self, width: usize, height: usize) -> bool {
        if self.width == width && self.height == height && self.data.len() == width * height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width * height, 0);
        true
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }
}

/// Byte order of the three color channels in a packed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    /// OpenCV / video-capture order.
    #[default]
    Bgr,
    Rgb,
}

/// Reasons a color frame cannot be processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is empty (width={width}, height={height})")]
    Empty { width: usize, height: usize },
    #[error("unsupported channel count {channels} (expected 3)")]
    ChannelCount { channels: usize },
    #[error("frame buffer length mismatch (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
}

/// Borrowed, packed, interleaved color frame (row-major, no padding).
#[derive(Clone, Copy, Debug)]
pub struct ColorFrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub order: ChannelOrder,
    pub data: &'a [u8],
}

impl<'a> ColorFrameView<'a> {
    /// Packed 3-channel BGR frame.
    pub fn bgr(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            channels: 3,
            order: ChannelOrder::Bgr,
            data,
        }
    }

    /// Packed 3-channel RGB frame.
    pub fn rgb(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            channels: 3,
            order: ChannelOrder::Rgb,
            data,
        }
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Empty {
                width: self.width,
                height: self.height,
            });
        }
        if self.channels != 3 {
            return Err(FrameError::ChannelCount {
                channels: self.channels,
            });
        }
        let expected = self
            .width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(3))
            .ok_or(FrameError::Empty {
                width: self.width,
                height: self.height,
            })?;
        if self.data.len() != expected {
            return Err(FrameError::BufferLength {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Convert into `out` using ITU-R BT.601 luma weights, reallocating only
    /// when the frame size changed. The frame must already be validated.
    pub fn to_gray_into(&self, out: &mut GrayImage) {
        out.ensure_size(self.width, self.height);
        let (ri, bi) = match self.order {
            ChannelOrder::Bgr => (2, 0),
            ChannelOrder::Rgb => (0, 2),
        };
        for (dst, px) in out.data.iter_mut().zip(self.data.chunks_exact(3)) {
            *dst = luma_u8(px[ri], px[1], px[bi]);
        }
    }
}

/// Fixed-point `0.299 R + 0.587 G + 0.114 B`, rounded.
#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Same as [`sample_bilinear`] but clamps out-of-bounds reads to the nearest
/// edge pixel instead of treating them as black.
#[inline]
pub fn sample_bilinear_clamped(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let max_x = (src.width.max(1) - 1) as f32;
    let max_y = (src.height.max(1) - 1) as f32;
    sample_bilinear(src, x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}
