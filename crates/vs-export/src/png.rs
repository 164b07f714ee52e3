use std::path::{Path, PathBuf};

use image::ExtendedColorType;
use vs_core::error::ConvertError;
use vs_core::frame::{ComposedFrame, FrameProperties};
use vs_core::traits::FrameSink;

use crate::part_path;

/// Sink d'image fixe : une seule frame, encodée selon l'extension (PNG, JPEG…).
///
/// L'image est écrite au `finalize`, d'abord en `.part` puis renommée.
pub struct ImageSink {
    final_path: PathBuf,
    expected: (u32, u32),
    frame: Option<ComposedFrame>,
}

impl ImageSink {
    /// # Errors
    /// `ConvertError::SinkWrite` if the destination directory does not exist.
    pub fn new(path: &Path, properties: &FrameProperties) -> Result<Self, ConvertError> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.is_dir()
        {
            return Err(ConvertError::SinkWrite(format!(
                "répertoire de sortie absent : {}",
                dir.display()
            )));
        }
        Ok(Self {
            final_path: path.to_path_buf(),
            expected: properties.output_dimensions(),
            frame: None,
        })
    }
}

impl FrameSink for ImageSink {
    fn write(&mut self, frame: &ComposedFrame) -> Result<(), ConvertError> {
        if (frame.width, frame.height) != self.expected {
            return Err(ConvertError::SinkWrite(format!(
                "frame {}x{} pour une image {}x{}",
                frame.width, frame.height, self.expected.0, self.expected.1
            )));
        }
        if self.frame.is_some() {
            return Err(ConvertError::SinkWrite(
                "une sortie image n'accepte qu'une seule frame".into(),
            ));
        }
        self.frame = Some(frame.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ConvertError> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| ConvertError::SinkWrite("aucune frame à écrire".into()))?;
        let colour = match frame.channels {
            1 => ExtendedColorType::L8,
            _ => ExtendedColorType::Rgb8,
        };

        let part = part_path(&self.final_path);
        image::save_buffer(&part, &frame.data, frame.width, frame.height, colour).map_err(|e| {
            let _ = std::fs::remove_file(&part);
            ConvertError::SinkWrite(format!("encodage de {} : {e}", self.final_path.display()))
        })?;
        std::fs::rename(&part, &self.final_path).map_err(|e| {
            let _ = std::fs::remove_file(&part);
            ConvertError::SinkWrite(format!(
                "renommage vers {} : {e}",
                self.final_path.display()
            ))
        })?;
        log::info!(
            "Image écrite : {}x{} → {}",
            frame.width,
            frame.height,
            self.final_path.display()
        );
        Ok(())
    }

    fn abort(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vs_core::config::ColourMode;

    fn props() -> FrameProperties {
        FrameProperties::new(3, 2, 1.0, Some(1), 3, 2, 2, 6, 4).unwrap()
    }

    #[test]
    fn writes_png_on_finalize_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("still.png");
        let mut sink = ImageSink::new(&out, &props()).unwrap();

        let mut frame = ComposedFrame::new(6, 4, ColourMode::Grayscale);
        frame.data[0] = 255;
        sink.write(&frame).unwrap();
        assert!(!out.exists());

        sink.finalize().unwrap();
        let img = image::open(&out).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (6, 4));
        assert_eq!(img.get_pixel(0, 0).0, [255]);
        assert_eq!(img.get_pixel(1, 0).0, [0]);
        assert!(!part_path(&out).exists());
    }

    #[test]
    fn colour_frames_are_saved_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("still.png");
        let mut sink = ImageSink::new(&out, &props()).unwrap();
        let mut frame = ComposedFrame::new(6, 4, ColourMode::Colour);
        frame.data[..3].copy_from_slice(&[10, 20, 30]);
        sink.write(&frame).unwrap();
        sink.finalize().unwrap();
        let img = image::open(&out).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn second_frame_and_wrong_size_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSink::new(&dir.path().join("x.png"), &props()).unwrap();
        assert!(sink.write(&ComposedFrame::new(5, 4, ColourMode::Grayscale)).is_err());
        sink.write(&ComposedFrame::new(6, 4, ColourMode::Grayscale)).unwrap();
        assert!(sink.write(&ComposedFrame::new(6, 4, ColourMode::Grayscale)).is_err());
    }

    #[test]
    fn abort_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("still.png");
        let mut sink = ImageSink::new(&out, &props()).unwrap();
        sink.write(&ComposedFrame::new(6, 4, ColourMode::Grayscale)).unwrap();
        sink.abort();
        assert!(sink.finalize().is_err());
        assert!(!out.exists());
    }

    #[test]
    fn missing_directory_is_sink_error() {
        let err = ImageSink::new(Path::new("/nonexistent/dir/out.png"), &props())
            .err()
            .unwrap();
        assert!(matches!(err, ConvertError::SinkWrite(_)));
    }
}
