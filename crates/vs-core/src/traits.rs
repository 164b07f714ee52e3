use crate::error::ConvertError;
use crate::frame::{ComposedFrame, FrameBuffer, GlyphRaster, SourceInfo};

/// Fournit les frames décodées, dans l'ordre, exactement une fois chacune.
///
/// Implémenté par : `VideoSource`, `ImageSource`.
///
/// # Example
/// ```
/// use vs_core::traits::FrameSource;
/// use vs_core::frame::{FrameBuffer, SourceInfo};
/// use vs_core::error::ConvertError;
///
/// struct DummySource;
/// impl FrameSource for DummySource {
///     fn info(&self) -> SourceInfo {
///         SourceInfo { width: 1, height: 1, fps: 1.0, frame_count: Some(0) }
///     }
///     fn next_frame(&mut self) -> Result<Option<FrameBuffer>, ConvertError> { Ok(None) }
/// }
/// ```
pub trait FrameSource: Send {
    /// Métadonnées connues avant la première frame.
    fn info(&self) -> SourceInfo;

    /// Prochaine frame, ou `None` en fin de flux.
    ///
    /// # Errors
    /// `ConvertError::SourceRead` if a frame cannot be decoded.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, ConvertError>;
}

/// Consomme les frames composées, dans l'ordre.
///
/// `finalize` est appelé exactement une fois en fin de run réussi, `abort`
/// à la place en cas d'échec ; après `abort`, aucune sortie partielle ne
/// doit rester à l'emplacement final.
pub trait FrameSink: Send {
    /// Écrit une frame.
    ///
    /// # Errors
    /// `ConvertError::SinkWrite` if the output cannot be written.
    fn write(&mut self, frame: &ComposedFrame) -> Result<(), ConvertError>;

    /// Ferme le flux et rend la sortie visible.
    ///
    /// # Errors
    /// `ConvertError::SinkWrite` if the encoder reports a failure.
    fn finalize(&mut self) -> Result<(), ConvertError>;

    /// Abandonne la sortie et libère les ressources.
    fn abort(&mut self);
}

/// Rend un caractère en raster carré de `cell_size` pixels.
///
/// Seul le cache de glyphes l'appelle, une fois par symbole et par run.
pub trait GlyphRasterizer {
    /// # Errors
    /// `ConvertError::Raster` if the font has no glyph for `symbol`.
    fn rasterize(&self, symbol: char, cell_size: u32) -> Result<GlyphRaster, ConvertError>;
}
