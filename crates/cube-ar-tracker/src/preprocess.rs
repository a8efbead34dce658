//! Color frame to grayscale to binary mask.

use cube_ar_core::{ColorFrameView, FrameError, GrayImage, GrayImageView};
use cube_ar_marker::Polarity;
use image::Luma;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Mask value for ink pixels. Contour search treats non-zero as foreground.
pub const INK: u8 = 255;

/// Scratch-owning preprocessor. Buffers are resized only when the frame size
/// changes and carry no meaning between frames.
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    gray: GrayImage,
    binary: image::GrayImage,
}

/// Borrowed outputs of one [`Preprocessor::preprocess`] call.
#[derive(Clone, Copy, Debug)]
pub struct PreprocessedFrame<'a> {
    pub gray: GrayImageView<'a>,
    pub binary: &'a image::GrayImage,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `frame`, convert it to luma and threshold it at
    /// `gray_threshold` so that marker ink becomes [`INK`].
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, frame),
            fields(width = frame.width, height = frame.height)
        )
    )]
    pub fn preprocess(
        &mut self,
        frame: &ColorFrameView<'_>,
        gray_threshold: u8,
        polarity: Polarity,
    ) -> Result<PreprocessedFrame<'_>, FrameError> {
        frame.validate()?;
        frame.to_gray_into(&mut self.gray);
        if binarize_into(&self.gray.view(), gray_threshold, polarity, &mut self.binary) {
            log::debug!("preprocess scratch resized to {}x{}", frame.width, frame.height);
        }
        Ok(PreprocessedFrame {
            gray: self.gray.view(),
            binary: &self.binary,
        })
    }
}

/// Threshold `gray` into `out`. Returns `true` when `out` had to be
/// reallocated.
pub fn binarize_into(
    gray: &GrayImageView<'_>,
    threshold: u8,
    polarity: Polarity,
    out: &mut image::GrayImage,
) -> bool {
    let resized = out.width() as usize != gray.width || out.height() as usize != gray.height;
    if resized {
        *out = image::GrayImage::new(gray.width as u32, gray.height as u32);
    }
    for (dst, &v) in out.pixels_mut().zip(gray.data.iter()) {
        *dst = Luma([if polarity.is_ink(v, threshold) { INK } else { 0 }]);
    }
    resized
}
