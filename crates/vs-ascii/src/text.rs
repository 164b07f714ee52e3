use vs_core::charset::{GlyphSet, LuminanceQuantizer};
use vs_core::error::ConvertError;
use vs_core::frame::FrameBuffer;

use crate::downsample::Downsampler;

/// Largeur par défaut du rendu texte, en colonnes.
pub const DEFAULT_TEXT_COLUMNS: u32 = 80;

/// Correction du rapport hauteur/largeur d'un caractère de terminal.
pub const DEFAULT_ASPECT_BIAS: f32 = 2.5;

/// Rend une image en art ASCII textuel, une ligne par rangée de cellules.
///
/// `rows = round(columns / (aspect_bias × width / height))`, au moins 1 :
/// les caractères de terminal étant plus hauts que larges, la grille est
/// écrasée verticalement pour garder les proportions à l'écran.
///
/// # Errors
/// `ConvertError::Config` for zero columns or a non-positive bias;
/// `ConvertError::SourceRead` for a malformed frame.
///
/// # Example
/// ```
/// use vs_ascii::text::render_text;
/// use vs_core::{FrameBuffer, GlyphSet};
/// let set = GlyphSet::new(" #").unwrap();
/// let frame = FrameBuffer::from_gray(4, 2, &[255; 8]);
/// let text = render_text(&frame, &set, 4, 1.0).unwrap();
/// assert_eq!(text, "####\n####\n");
/// ```
pub fn render_text(
    frame: &FrameBuffer,
    set: &GlyphSet,
    columns: u32,
    aspect_bias: f32,
) -> Result<String, ConvertError> {
    if columns == 0 {
        return Err(ConvertError::Config("largeur texte nulle".into()));
    }
    if !(aspect_bias.is_finite() && aspect_bias > 0.0) {
        return Err(ConvertError::Config(format!(
            "correction d'aspect invalide : {aspect_bias}"
        )));
    }
    if frame.width == 0 || frame.height == 0 || !frame.is_well_formed() {
        return Err(ConvertError::SourceRead(format!(
            "image {}×{} inutilisable",
            frame.width, frame.height
        )));
    }

    let ratio = f64::from(aspect_bias) * f64::from(frame.width) / f64::from(frame.height);
    let rows = (f64::from(columns) / ratio).round().max(1.0) as u32;

    let mut gray = Vec::new();
    frame.gray_into(&mut gray);
    let mut coarse = vec![0u8; columns as usize * rows as usize];
    Downsampler::new().downsample_gray(
        &gray,
        frame.width,
        frame.height,
        &mut coarse,
        columns,
        rows,
    )?;

    let quantizer = LuminanceQuantizer::new(set);
    let mut out = String::with_capacity((columns as usize + 1) * rows as usize);
    for line in coarse.chunks_exact(columns as usize) {
        out.extend(line.iter().map(|&v| set.symbol(quantizer.quantize(v))));
        out.push('\n');
    }
    log::debug!("Rendu texte : {columns}×{rows} caractères");
    Ok(out)
}
