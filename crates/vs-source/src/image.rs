use std::path::Path;

use vs_core::error::ConvertError;
use vs_core::frame::{FrameBuffer, SourceInfo};
use vs_core::traits::FrameSource;

/// Source d'image statique : une seule frame, puis fin de flux.
///
/// # Example
/// ```no_run
/// use vs_source::image::ImageSource;
/// use std::path::Path;
/// let source = ImageSource::open(Path::new("still.png"), 1.0).unwrap();
/// ```
pub struct ImageSource {
    info: SourceInfo,
    frame: Option<FrameBuffer>,
}

impl ImageSource {
    /// Load an image from disk and create a one-frame source.
    ///
    /// # Errors
    /// `ConvertError::SourceRead` if the image cannot be decoded.
    pub fn open(path: &Path, fps: f64) -> Result<Self, ConvertError> {
        let frame = load_image(path)?;
        let info = SourceInfo {
            width: frame.width,
            height: frame.height,
            fps,
            frame_count: Some(1),
        };
        log::info!(
            "Image chargée : {}×{} — {}",
            frame.width,
            frame.height,
            path.display()
        );
        Ok(Self {
            info,
            frame: Some(frame),
        })
    }
}

impl FrameSource for ImageSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, ConvertError> {
        Ok(self.frame.take())
    }
}

/// Décode une image en RGBA.
///
/// # Errors
/// `ConvertError::SourceRead` if the file is missing or not a decodable image.
pub fn load_image(path: &Path) -> Result<FrameBuffer, ConvertError> {
    let img = image::open(path).map_err(|e| {
        ConvertError::SourceRead(format!("impossible de charger {} : {e}", path.display()))
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(ConvertError::SourceRead(format!(
            "image vide : {}",
            path.display()
        )));
    }
    Ok(FrameBuffer {
        data: rgba.into_raw(),
        width,
        height,
    })
}
