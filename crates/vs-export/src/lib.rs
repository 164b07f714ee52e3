//! Sorties de vidscii : rasterisation des glyphes et sinks de frames composées.
pub mod muxer;
pub mod png;
pub mod rasterizer;

use std::path::Path;

use vs_core::config::{ColourMode, ConvertConfig};
use vs_core::error::ConvertError;
use vs_core::frame::FrameProperties;
use vs_core::media::MediaKind;
use vs_core::traits::FrameSink;

pub use muxer::Mp4Muxer;
pub use png::ImageSink;
pub use rasterizer::FontRasterizer;

/// Open the sink matching the output extension: an encoder for video
/// outputs, a PNG writer for image outputs.
///
/// # Errors
/// `ConvertError::Config` for an unsupported extension,
/// `ConvertError::SinkWrite` if the encoder cannot be started.
pub fn open_sink(
    path: &Path,
    properties: &FrameProperties,
    colour_mode: ColourMode,
    config: &ConvertConfig,
) -> Result<Box<dyn FrameSink>, ConvertError> {
    match MediaKind::from_path(path)? {
        MediaKind::Video => Ok(Box::new(Mp4Muxer::new(
            path,
            properties,
            colour_mode,
            config.encoder_crf,
            &config.encoder_preset,
        )?)),
        MediaKind::Image => Ok(Box::new(ImageSink::new(path, properties)?)),
    }
}

/// `out/clip.mp4` → `out/clip.part.mp4`: same directory and same extension,
/// so encoders still pick the right container.
pub(crate) fn part_path(path: &Path) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy().into_owned());
    let name = match path.extension() {
        Some(ext) => format!("{stem}.part.{}", ext.to_string_lossy()),
        None => format!("{stem}.part"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_keeps_directory_and_extension() {
        assert_eq!(
            part_path(Path::new("out/clip.mp4")),
            Path::new("out/clip.part.mp4")
        );
        assert_eq!(part_path(Path::new("still.png")), Path::new("still.part.png"));
    }
}
