use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use vs_core::config::GlyphPlacement;
use vs_core::error::ConvertError;
use vs_core::frame::GlyphRaster;
use vs_core::traits::GlyphRasterizer;

/// Polices monospace cherchées quand aucune n'est donnée explicitement.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/ubuntu/UbuntuMono-R.ttf",
    "/usr/share/fonts/truetype/ubuntu/Ubuntu-M.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/Library/Fonts/Menlo.ttc",
    "/System/Library/Fonts/Menlo.ttc",
    "C:\\Windows\\Fonts\\consola.ttf",
];

/// First installed font among [`FONT_CANDIDATES`].
#[must_use]
pub fn find_system_font() -> Option<PathBuf> {
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

/// Rasterizer logiciel ab_glyph : un caractère → un raster de couverture S×S.
///
/// La police est mise à l'échelle pour que sa boîte de ligne
/// (ascent − descent) fasse exactement S pixels.
pub struct FontRasterizer {
    font: FontVec,
    placement: GlyphPlacement,
}

impl FontRasterizer {
    /// # Errors
    /// `ConvertError::Config` if the file cannot be read or is not a font.
    pub fn from_file(path: &Path, placement: GlyphPlacement) -> Result<Self, ConvertError> {
        let data = std::fs::read(path).map_err(|e| {
            ConvertError::Config(format!("police illisible {} : {e}", path.display()))
        })?;
        let rasterizer = Self::from_bytes(data, placement).map_err(|e| match e {
            ConvertError::Config(reason) => {
                ConvertError::Config(format!("{} : {reason}", path.display()))
            }
            other => other,
        })?;
        log::info!("Police chargée : {}", path.display());
        Ok(rasterizer)
    }

    /// # Errors
    /// `ConvertError::Config` if the bytes are not a TrueType/OpenType font.
    pub fn from_bytes(data: Vec<u8>, placement: GlyphPlacement) -> Result<Self, ConvertError> {
        let font = FontVec::try_from_vec(data)
            .map_err(|e| ConvertError::Config(format!("police invalide : {e}")))?;
        Ok(Self { font, placement })
    }
}

impl GlyphRasterizer for FontRasterizer {
    fn rasterize(&self, symbol: char, cell_size: u32) -> Result<GlyphRaster, ConvertError> {
        let mut raster = GlyphRaster::blank(cell_size);

        // glyph_id 0 = .notdef : la police n'a pas ce caractère.
        let gid = self.font.glyph_id(symbol);
        if gid.0 == 0 {
            if symbol.is_whitespace() {
                return Ok(raster);
            }
            return Err(ConvertError::Raster {
                symbol,
                reason: "glyphe absent de la police".into(),
            });
        }

        let size = cell_size as f32;
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);

        // Baseline : centré sur l'avance, boîte de ligne calée en bas
        // (ligne de base à S + descent, descent étant négatif).
        let origin_x = (size - scaled.h_advance(gid)) / 2.0;
        let baseline = size + scaled.descent();
        let glyph = gid.with_scale_and_position(scale, point(origin_x, baseline));

        let Some(outline) = self.font.outline_glyph(glyph) else {
            return Ok(raster);
        };
        let bounds = outline.px_bounds();

        let (offset_x, offset_y) = match self.placement {
            GlyphPlacement::Baseline => (bounds.min.x as i32, bounds.min.y as i32),
            GlyphPlacement::Centered => (
                ((size - bounds.width()) / 2.0).floor() as i32,
                ((size - bounds.height()) / 2.0).floor() as i32,
            ),
        };

        let side = cell_size as i32;
        let coverage = raster.coverage_mut();
        #[allow(clippy::cast_possible_wrap)]
        outline.draw(|x, y, v| {
            let px = x as i32 + offset_x;
            let py = y as i32 + offset_y;
            if (0..side).contains(&px) && (0..side).contains(&py) {
                let idx = (py * side + px) as usize;
                let value = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                coverage[idx] = coverage[idx].max(value);
            }
        });

        Ok(raster)
    }
}
