use std::sync::Arc;

use rayon::prelude::*;
use vs_core::charset::LuminanceQuantizer;
use vs_core::config::ColourMode;
use vs_core::error::ConvertError;
use vs_core::frame::{ComposedFrame, FrameBuffer, FrameProperties};

use crate::downsample::Downsampler;
use crate::glyph_cache::GlyphCache;

/// Transforme une frame source en frame composée de glyphes.
///
/// Pour chaque frame :
/// 1. luminance BT.709 du plan complet,
/// 2. réduction moyennée vers la grille `coarse_columns × coarse_rows`,
/// 3. quantification de chaque échantillon en index de glyphe,
/// 4. tuilage des rasters du cache, bloc `(r, c)` → pixels `[r·S, (r+1)·S) × [c·S, (c+1)·S)`.
///
/// Les buffers intermédiaires sont réutilisés d'une frame à l'autre.
/// Aucun état visible ne survit entre deux appels : même entrée, même sortie.
pub struct FrameComposer {
    properties: FrameProperties,
    cache: Arc<GlyphCache>,
    quantizer: LuminanceQuantizer,
    colour_mode: ColourMode,
    downsampler: Downsampler,
    gray: Vec<u8>,
    rgb: Vec<u8>,
    coarse_gray: Vec<u8>,
    coarse_rgb: Vec<u8>,
}

impl FrameComposer {
    /// # Errors
    /// `ConvertError::Config` if the cache does not match the geometry or the
    /// quantizer (different cell size or glyph count).
    pub fn new(
        properties: FrameProperties,
        cache: Arc<GlyphCache>,
        quantizer: LuminanceQuantizer,
        colour_mode: ColourMode,
    ) -> Result<Self, ConvertError> {
        check_cache(&properties, &cache, &quantizer)?;
        let cells = properties.coarse_columns as usize * properties.coarse_rows as usize;
        Ok(Self {
            properties,
            cache,
            quantizer,
            colour_mode,
            downsampler: Downsampler::new(),
            gray: Vec::new(),
            rgb: Vec::new(),
            coarse_gray: vec![0u8; cells],
            coarse_rgb: match colour_mode {
                ColourMode::Grayscale => Vec::new(),
                ColourMode::Colour => vec![0u8; cells * 3],
            },
        })
    }

    #[must_use]
    pub fn properties(&self) -> &FrameProperties {
        &self.properties
    }

    /// Compose une frame. Sortie toujours aux dimensions `output_dimensions()`.
    ///
    /// # Errors
    /// `ConvertError::SourceRead` if the frame does not have the source
    /// dimensions announced at open time.
    pub fn compose(&mut self, raw: &FrameBuffer) -> Result<ComposedFrame, ConvertError> {
        check_input(raw, &self.properties)?;
        let p = &self.properties;

        raw.gray_into(&mut self.gray);
        self.downsampler.downsample_gray(
            &self.gray,
            p.source_width,
            p.source_height,
            &mut self.coarse_gray,
            p.coarse_columns,
            p.coarse_rows,
        )?;

        let tint = match self.colour_mode {
            ColourMode::Grayscale => None,
            ColourMode::Colour => {
                raw.rgb_into(&mut self.rgb);
                self.downsampler.downsample_rgb(
                    &self.rgb,
                    p.source_width,
                    p.source_height,
                    &mut self.coarse_rgb,
                    p.coarse_columns,
                    p.coarse_rows,
                )?;
                Some(self.coarse_rgb.as_slice())
            }
        };

        let (w, h) = p.output_dimensions();
        let mut out = ComposedFrame::new(w, h, self.colour_mode);
        tile(
            &self.coarse_gray,
            tint,
            p,
            &self.cache,
            &self.quantizer,
            &mut out,
        );
        Ok(out)
    }
}

/// One-shot composition through a temporary [`FrameComposer`].
///
/// Copies the cache; prefer a long-lived composer for a stream of frames.
///
/// # Errors
/// Same as [`FrameComposer::new`] and [`FrameComposer::compose`].
///
/// # Example
/// ```
/// use vs_ascii::{GlyphCache, compose_frame};
/// use vs_core::{ColourMode, ConvertError, FrameBuffer, FrameProperties, GlyphRaster, GlyphRasterizer, GlyphSet, LuminanceQuantizer};
///
/// struct Solid;
/// impl GlyphRasterizer for Solid {
///     fn rasterize(&self, symbol: char, size: u32) -> Result<GlyphRaster, ConvertError> {
///         let v = if symbol == ' ' { 0 } else { 255 };
///         GlyphRaster::from_coverage(size, vec![v; (size * size) as usize])
///     }
/// }
///
/// let set = GlyphSet::new(" #").unwrap();
/// let cache = GlyphCache::build(&set, &Solid, 2).unwrap();
/// let props = FrameProperties::new(1, 1, 1.0, Some(1), 1, 1, 2, 2, 2).unwrap();
/// let raw = FrameBuffer::from_gray(1, 1, &[255]);
/// let out = compose_frame(&raw, &props, &cache, &LuminanceQuantizer::new(&set), ColourMode::Grayscale).unwrap();
/// assert_eq!(out.data, vec![255; 4]);
/// ```
pub fn compose_frame(
    raw: &FrameBuffer,
    properties: &FrameProperties,
    cache: &GlyphCache,
    quantizer: &LuminanceQuantizer,
    colour_mode: ColourMode,
) -> Result<ComposedFrame, ConvertError> {
    FrameComposer::new(
        *properties,
        Arc::new(cache.clone()),
        quantizer.clone(),
        colour_mode,
    )?
    .compose(raw)
}

fn check_cache(
    properties: &FrameProperties,
    cache: &GlyphCache,
    quantizer: &LuminanceQuantizer,
) -> Result<(), ConvertError> {
    if cache.cell_size() != properties.cell_size {
        return Err(ConvertError::Config(format!(
            "cache de glyphes en {}px pour des cellules de {}px",
            cache.cell_size(),
            properties.cell_size
        )));
    }
    if cache.len() != quantizer.levels() {
        return Err(ConvertError::Config(format!(
            "{} glyphes en cache pour {} niveaux de quantification",
            cache.len(),
            quantizer.levels()
        )));
    }
    Ok(())
}

fn check_input(raw: &FrameBuffer, properties: &FrameProperties) -> Result<(), ConvertError> {
    if raw.width != properties.source_width
        || raw.height != properties.source_height
        || !raw.is_well_formed()
    {
        return Err(ConvertError::SourceRead(format!(
            "frame {}×{} ({} octets), source annoncée {}×{}",
            raw.width,
            raw.height,
            raw.data.len(),
            properties.source_width,
            properties.source_height
        )));
    }
    Ok(())
}

/// Copie les rasters du cache dans `out`, une bande de cellules par tâche rayon.
fn tile(
    coarse_gray: &[u8],
    tint: Option<&[u8]>,
    properties: &FrameProperties,
    cache: &GlyphCache,
    quantizer: &LuminanceQuantizer,
    out: &mut ComposedFrame,
) {
    let cols = properties.coarse_columns as usize;
    let s = properties.cell_size as usize;
    let channels = usize::from(out.channels);
    let stride = out.stride();
    let band_len = stride * s;
    if band_len == 0 {
        return;
    }

    out.data
        .par_chunks_exact_mut(band_len)
        .enumerate()
        .for_each(|(row, band)| {
            let samples = &coarse_gray[row * cols..(row + 1) * cols];
            for (col, &sample) in samples.iter().enumerate() {
                let raster = cache.lookup(quantizer.quantize(sample));
                let x0 = col * s * channels;
                match tint {
                    None => {
                        for cy in 0..s {
                            let dst = cy * stride + x0;
                            band[dst..dst + s].copy_from_slice(raster.row(cy as u32));
                        }
                    }
                    Some(rgb) => {
                        let k = (row * cols + col) * 3;
                        let colour = [rgb[k], rgb[k + 1], rgb[k + 2]];
                        for cy in 0..s {
                            let dst = cy * stride + x0;
                            let line = &mut band[dst..dst + s * 3];
                            for (px, &cov) in line.chunks_exact_mut(3).zip(raster.row(cy as u32)) {
                                for (c, &base) in px.iter_mut().zip(&colour) {
                                    *c = tinted(cov, base);
                                }
                            }
                        }
                    }
                }
            }
        });
}

#[inline(always)]
fn tinted(coverage: u8, colour: u8) -> u8 {
    ((u32::from(coverage) * u32::from(colour) + 127) / 255) as u8
}
