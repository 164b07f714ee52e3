//! Sources de frames pour vidscii : vidéo via ffmpeg, image fixe via `image`.
pub mod image;
pub mod process;
pub mod video;

use std::path::Path;

use vs_core::error::ConvertError;
use vs_core::media::MediaKind;
use vs_core::traits::FrameSource;

/// Open the right source for `path`, chosen by extension.
///
/// `image_fps` is the rate announced by a still-image source.
///
/// # Errors
/// `ConvertError::Config` for an unsupported extension,
/// `ConvertError::SourceRead` if the file cannot be opened or probed.
pub fn open_source(path: &Path, image_fps: f64) -> Result<Box<dyn FrameSource>, ConvertError> {
    match MediaKind::from_path(path)? {
        MediaKind::Video => Ok(Box::new(crate::video::VideoSource::open(path)?)),
        MediaKind::Image => Ok(Box::new(crate::image::ImageSource::open(path, image_fps)?)),
    }
}
