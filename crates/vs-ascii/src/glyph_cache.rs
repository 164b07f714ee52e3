use vs_core::charset::GlyphSet;
use vs_core::error::ConvertError;
use vs_core::frame::GlyphRaster;
use vs_core::traits::GlyphRasterizer;

/// Un raster par symbole du jeu, indexé par bucket de quantification.
///
/// Construit entièrement avant la première frame, immuable ensuite : le
/// rasterizer n'est jamais appelé dans la boucle de composition.
#[derive(Clone, Debug)]
pub struct GlyphCache {
    cell_size: u32,
    rasters: Vec<GlyphRaster>,
}

impl GlyphCache {
    /// Rasterise chaque symbole du jeu, dans l'ordre, une seule fois.
    ///
    /// # Errors
    /// `ConvertError::Config` for a zero cell size; `ConvertError::Raster`
    /// if any symbol fails or comes back at the wrong size. No partial cache
    /// is ever returned.
    pub fn build<R: GlyphRasterizer + ?Sized>(
        set: &GlyphSet,
        rasterizer: &R,
        cell_size: u32,
    ) -> Result<Self, ConvertError> {
        if cell_size == 0 {
            return Err(ConvertError::Config(
                "la taille de cellule doit être strictement positive".into(),
            ));
        }

        let mut rasters = Vec::with_capacity(set.len());
        for &symbol in set.symbols() {
            let raster = rasterizer.rasterize(symbol, cell_size)?;
            if raster.size() != cell_size {
                return Err(ConvertError::Raster {
                    symbol,
                    reason: format!(
                        "raster de {}px pour une cellule de {cell_size}px",
                        raster.size()
                    ),
                });
            }
            rasters.push(raster);
        }

        log::info!(
            "Cache de glyphes prêt : {} rasters de {cell_size}×{cell_size}px",
            rasters.len()
        );
        Ok(Self { cell_size, rasters })
    }

    /// Raster for quantization index `index`.
    ///
    /// An index outside `0..len()` is a programming error and panics.
    #[inline(always)]
    #[must_use]
    pub fn lookup(&self, index: usize) -> &GlyphRaster {
        &self.rasters[index]
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    #[must_use]
    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }
}
