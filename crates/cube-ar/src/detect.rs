//! Tracking helpers for `image` crate buffers.

use crate::core::{ColorFrameView, FrameError, GrayImage};
use crate::tracker::{MarkerTracker, TrackError, TrackResult};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Borrow an `image::RgbImage` as a tracker input frame.
pub fn frame_view(img: &::image::RgbImage) -> ColorFrameView<'_> {
    ColorFrameView::rgb(img.width() as usize, img.height() as usize, img.as_raw())
}

/// Wrap a packed BGR buffer (the usual capture layout) after checking its
/// size and length.
pub fn bgr_frame_from_slice(
    width: usize,
    height: usize,
    data: &[u8],
) -> Result<ColorFrameView<'_>, TrackError> {
    let frame = ColorFrameView::bgr(width, height, data);
    frame.validate()?;
    Ok(frame)
}

/// Run `tracker` on an RGB image.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(tracker, img),
        fields(width = img.width(), height = img.height())
    )
)]
pub fn track_rgb_image(
    tracker: &mut MarkerTracker,
    img: &::image::RgbImage,
) -> Result<TrackResult, TrackError> {
    tracker.track(&frame_view(img))
}

/// Run `tracker` on any decoded image, converting it to RGB8 first.
pub fn track_dynamic_image(
    tracker: &mut MarkerTracker,
    img: &::image::DynamicImage,
) -> Result<TrackResult, TrackError> {
    track_rgb_image(tracker, &img.to_rgb8())
}

/// Copy a workspace grayscale image into an `image::GrayImage`.
pub fn to_image_gray(gray: &GrayImage) -> Result<::image::GrayImage, FrameError> {
    let expected = gray.width * gray.height;
    ::image::GrayImage::from_raw(gray.width as u32, gray.height as u32, gray.data.clone()).ok_or(
        FrameError::BufferLength {
            expected,
            got: gray.data.len(),
        },
    )
}
