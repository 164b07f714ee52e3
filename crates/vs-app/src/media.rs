use std::path::{Path, PathBuf};

use vs_core::config::ConvertConfig;
use vs_core::error::ConvertError;
use vs_core::frame::FrameProperties;
use vs_core::media::MediaKind;
use vs_core::traits::{FrameSink, FrameSource, GlyphRasterizer};
use vs_export::rasterizer::{FontRasterizer, find_system_font};

use crate::pipeline::MediaIo;

/// FPS annoncé par une source image fixe.
const STILL_IMAGE_FPS: f64 = 1.0;

/// Collaborateurs réels : fichiers d'entrée/sortie, police sur disque.
pub struct FileIo {
    input: PathBuf,
    output: PathBuf,
}

impl FileIo {
    #[must_use]
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self { input, output }
    }
}

fn font_path(config: &ConvertConfig) -> Result<PathBuf, ConvertError> {
    match &config.font_path {
        Some(path) if path.is_file() => Ok(path.clone()),
        Some(path) => Err(ConvertError::Config(format!(
            "police introuvable : {}",
            path.display()
        ))),
        None => find_system_font().ok_or_else(|| {
            ConvertError::Config(
                "aucune police monospace trouvée sur le système, utilisez --font".into(),
            )
        }),
    }
}

fn output_dir_exists(output: &Path) -> bool {
    output
        .parent()
        .is_none_or(|dir| dir.as_os_str().is_empty() || dir.is_dir())
}

impl MediaIo for FileIo {
    fn preflight(&self, config: &ConvertConfig) -> Result<(), ConvertError> {
        if !self.input.is_file() {
            return Err(ConvertError::Config(format!(
                "entrée introuvable : {}",
                self.input.display()
            )));
        }
        let input_kind = MediaKind::from_path(&self.input)?;
        let output_kind = MediaKind::from_path(&self.output)?;
        if input_kind == MediaKind::Video && output_kind == MediaKind::Image {
            return Err(ConvertError::Config(format!(
                "une vidéo ne peut pas être convertie en image fixe : {}",
                self.output.display()
            )));
        }
        if !output_dir_exists(&self.output) {
            return Err(ConvertError::Config(format!(
                "répertoire de sortie absent : {}",
                self.output.display()
            )));
        }
        font_path(config)?;
        Ok(())
    }

    fn open_source(&mut self, _config: &ConvertConfig) -> Result<Box<dyn FrameSource>, ConvertError> {
        vs_source::open_source(&self.input, STILL_IMAGE_FPS)
    }

    fn rasterizer(
        &mut self,
        config: &ConvertConfig,
    ) -> Result<Box<dyn GlyphRasterizer>, ConvertError> {
        let path = font_path(config)?;
        Ok(Box::new(FontRasterizer::from_file(&path, config.glyph_placement)?))
    }

    fn open_sink(
        &mut self,
        properties: &FrameProperties,
        config: &ConvertConfig,
    ) -> Result<Box<dyn FrameSink>, ConvertError> {
        vs_export::open_sink(&self.output, properties, config.colour_mode, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, RunRequest};
    use std::sync::Arc;
    use vs_core::progress::{PipelineProgress, PipelineState};

    #[test]
    fn missing_input_is_config_error() {
        let io = FileIo::new("/nonexistent/in.mp4".into(), "out.mp4".into());
        let err = io.preflight(&ConvertConfig::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn bad_extensions_and_combinations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("in.txt");
        std::fs::write(&text, b"x").unwrap();
        let io = FileIo::new(text, dir.path().join("out.mp4"));
        assert!(matches!(
            io.preflight(&ConvertConfig::default()),
            Err(ConvertError::Config(_))
        ));

        let video = dir.path().join("in.mp4");
        std::fs::write(&video, b"x").unwrap();
        let io = FileIo::new(video, dir.path().join("out.png"));
        assert!(io.preflight(&ConvertConfig::default()).is_err());
    }

    #[test]
    fn missing_font_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        image::RgbImage::new(4, 4).save(&input).unwrap();
        let config = ConvertConfig {
            font_path: Some(dir.path().join("nope.ttf")),
            ..ConvertConfig::default()
        };
        let io = FileIo::new(input, dir.path().join("out.png"));
        assert!(matches!(io.preflight(&config), Err(ConvertError::Config(_))));
    }

    #[test]
    fn still_image_converts_end_to_end() {
        let Some(font) = find_system_font() else {
            eprintln!("aucune police système, test ignoré");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        image::RgbImage::from_fn(40, 20, |x, _| image::Rgb([(x * 6) as u8; 3]))
            .save(&input)
            .unwrap();

        let config = ConvertConfig {
            charset: " .:#".into(),
            cell_size: Some(8),
            font_path: Some(font),
            ..ConvertConfig::default()
        };
        let progress = Arc::new(PipelineProgress::new());
        let report = Pipeline::new(Arc::clone(&progress))
            .run(RunRequest {
                config,
                io: FileIo::new(input, output.clone()),
            })
            .unwrap();

        assert_eq!(report.frames_written, 1);
        assert_eq!(progress.state(), PipelineState::Done);
        // 40×20 at scale 0.1 → 4×2 cells of 8px.
        let img = image::open(&output).unwrap();
        assert_eq!((img.width(), img.height()), (32, 16));
    }
}
