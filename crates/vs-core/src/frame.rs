use crate::config::{ColourMode, ConvertConfig};
use crate::error::ConvertError;

/// Frame décodée telle que livrée par la source (RawFrame).
///
/// Stocke les pixels en RGBA row-major, 4 bytes par pixel.
///
/// # Example
/// ```
/// use vs_core::frame::FrameBuffer;
/// let fb = FrameBuffer::new(10, 10);
/// assert_eq!(fb.data.len(), 400);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixels RGBA, row-major, 4 bytes par pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Crée un buffer pré-alloué aux dimensions données.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    /// Build an opaque RGBA frame from one gray byte per pixel.
    ///
    /// # Example
    /// ```
    /// use vs_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::from_gray(2, 1, &[0, 200]);
    /// assert_eq!(fb.pixel(1, 0), (200, 200, 200, 255));
    /// ```
    #[must_use]
    pub fn from_gray(width: u32, height: u32, gray: &[u8]) -> Self {
        debug_assert_eq!(gray.len(), width as usize * height as usize);
        let data = gray.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Self {
            data,
            width,
            height,
        }
    }

    /// Accès au pixel (x, y) → (r, g, b, a).
    #[inline(always)]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        (
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    /// Luminance BT.709, integer arithmetic. A gray pixel maps to itself.
    ///
    /// # Example
    /// ```
    /// use vs_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::from_gray(1, 1, &[77]);
    /// assert_eq!(fb.luminance(0, 0), 77);
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn luminance(&self, x: u32, y: u32) -> u8 {
        let (r, g, b, _) = self.pixel(x, y);
        luma(r, g, b)
    }

    /// Write the luma plane of the whole frame into `out` (resized to w×h).
    pub fn gray_into(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(self.data.chunks_exact(4).map(|px| luma(px[0], px[1], px[2])));
    }

    /// Write the RGB plane (alpha dropped) into `out`.
    pub fn rgb_into(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.width as usize * self.height as usize * 3);
        for px in self.data.chunks_exact(4) {
            out.extend_from_slice(&px[..3]);
        }
    }

    /// `true` if the byte buffer matches the declared dimensions.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * 4
    }
}

/// BT.709 luma, the same weights for every frame of every run.
#[inline(always)]
#[must_use]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 2126 + u32::from(g) * 7152 + u32::from(b) * 722) / 10000) as u8
}

/// Métadonnées annoncées par la source avant la première frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Images par seconde (ex: 23.976, 24.0, 30.0).
    pub fps: f64,
    /// Nombre de frames annoncé, `None` si le conteneur ne le déclare pas.
    pub frame_count: Option<u64>,
}

/// Per-run geometry, fixed before the glyph cache is built.
///
/// Invariant: `coarse_columns * cell_size == output_width` and
/// `coarse_rows * cell_size == output_height`.
///
/// # Example
/// ```
/// use vs_core::frame::FrameProperties;
/// let props = FrameProperties::new(1280, 720, 24.0, Some(48), 128, 72, 10, 1280, 720).unwrap();
/// assert_eq!(props.output_dimensions(), (1280, 720));
/// assert!(FrameProperties::new(1280, 720, 24.0, None, 128, 72, 10, 1280, 721).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameProperties {
    pub source_width: u32,
    pub source_height: u32,
    pub fps: f64,
    pub frame_count: Option<u64>,
    pub coarse_columns: u32,
    pub coarse_rows: u32,
    /// S, côté d'une cellule glyphe en pixels.
    pub cell_size: u32,
    output_width: u32,
    output_height: u32,
}

/// Côté maximal d'une cellule glyphe, en pixels.
pub const MAX_CELL_SIZE: u32 = 1024;

/// Côté maximal de la sortie, en pixels (limite de niveau H.264 6.2).
pub const MAX_OUTPUT_SIDE: u32 = 16384;

impl FrameProperties {
    /// Build and validate run geometry.
    ///
    /// # Errors
    /// `ConvertError::Config` on a zero dimension, a non-positive fps, a cell
    /// larger than [`MAX_CELL_SIZE`], an output side above
    /// [`MAX_OUTPUT_SIDE`], or an output resolution that the coarse grid does
    /// not tile exactly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_width: u32,
        source_height: u32,
        fps: f64,
        frame_count: Option<u64>,
        coarse_columns: u32,
        coarse_rows: u32,
        cell_size: u32,
        output_width: u32,
        output_height: u32,
    ) -> Result<Self, ConvertError> {
        if source_width == 0 || source_height == 0 {
            return Err(ConvertError::Config(format!(
                "dimensions de source invalides : {source_width}×{source_height}"
            )));
        }
        if coarse_columns == 0 || coarse_rows == 0 {
            return Err(ConvertError::Config(format!(
                "grille grossière vide : {coarse_columns}×{coarse_rows}"
            )));
        }
        if cell_size == 0 {
            return Err(ConvertError::Config(
                "la taille de cellule doit être strictement positive".into(),
            ));
        }
        if cell_size > MAX_CELL_SIZE {
            return Err(ConvertError::Config(format!(
                "taille de cellule {cell_size}px au-delà du maximum {MAX_CELL_SIZE}px"
            )));
        }
        if output_width > MAX_OUTPUT_SIDE || output_height > MAX_OUTPUT_SIDE {
            return Err(ConvertError::Config(format!(
                "sortie {output_width}×{output_height} au-delà du maximum \
                 {MAX_OUTPUT_SIDE}px par côté"
            )));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ConvertError::Config(format!("fps invalide : {fps}")));
        }
        let tiled_w = u64::from(coarse_columns) * u64::from(cell_size);
        let tiled_h = u64::from(coarse_rows) * u64::from(cell_size);
        if tiled_w != u64::from(output_width) || tiled_h != u64::from(output_height) {
            return Err(ConvertError::Config(format!(
                "géométrie incohérente : {coarse_columns}×{coarse_rows} cellules de {cell_size}px \
                 couvrent {tiled_w}×{tiled_h}, sortie déclarée {output_width}×{output_height}"
            )));
        }
        Ok(Self {
            source_width,
            source_height,
            fps,
            frame_count,
            coarse_columns,
            coarse_rows,
            cell_size,
            output_width,
            output_height,
        })
    }

    /// Derive the geometry from what the source announces and the run config.
    ///
    /// Without an explicit cell size: `columns = floor(width * scale)`,
    /// `rows = floor(height * scale)`, `S = width / columns`.
    ///
    /// # Errors
    /// `ConvertError::Config` if the scale leaves an empty grid, or if
    /// `match_source_resolution` is set and the grid does not tile the source.
    ///
    /// # Example
    /// ```
    /// use vs_core::config::ConvertConfig;
    /// use vs_core::frame::{FrameProperties, SourceInfo};
    /// let info = SourceInfo { width: 1280, height: 720, fps: 24.0, frame_count: Some(10) };
    /// let props = FrameProperties::derive(&info, &ConvertConfig::default()).unwrap();
    /// assert_eq!((props.coarse_columns, props.coarse_rows, props.cell_size), (128, 72, 10));
    /// ```
    pub fn derive(info: &SourceInfo, config: &ConvertConfig) -> Result<Self, ConvertError> {
        let scale = f64::from(config.downsample_scale);
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(ConvertError::Config(format!(
                "downsample_scale doit être dans ]0, 1] (reçu {scale})"
            )));
        }
        // Small epsilon: 0.7f32 widens to 0.69999998…, which must not drop a column.
        let coarse_columns = (f64::from(info.width) * scale + 1e-4).floor() as u32;
        let coarse_rows = (f64::from(info.height) * scale + 1e-4).floor() as u32;
        if coarse_columns == 0 || coarse_rows == 0 {
            return Err(ConvertError::Config(format!(
                "échelle {scale} trop petite pour une source {}×{}",
                info.width, info.height
            )));
        }

        let cell_size = config
            .cell_size
            .unwrap_or(info.width / coarse_columns);
        let fps = config.fps.map_or(info.fps, f64::from);

        let (output_width, output_height) = if config.match_source_resolution {
            (info.width, info.height)
        } else {
            let tiled = coarse_columns
                .checked_mul(cell_size)
                .zip(coarse_rows.checked_mul(cell_size));
            tiled.ok_or_else(|| {
                ConvertError::Config(format!(
                    "{coarse_columns}×{coarse_rows} cellules de {cell_size}px dépassent \
                     la résolution représentable"
                ))
            })?
        };

        Self::new(
            info.width,
            info.height,
            fps,
            info.frame_count,
            coarse_columns,
            coarse_rows,
            cell_size,
            output_width,
            output_height,
        )
    }

    /// Output resolution `(width, height)` shared by every composed frame.
    #[must_use]
    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.output_width, self.output_height)
    }

    /// Output fps rounded for encoders that want an integer rate.
    #[must_use]
    pub fn fps_rounded(&self) -> u32 {
        self.fps.round().max(1.0) as u32
    }
}

/// Raster carré d'un glyphe : couverture 0..255, `size × size`, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphRaster {
    size: u32,
    coverage: Vec<u8>,
}

impl GlyphRaster {
    /// Blank raster of side `size`.
    #[must_use]
    pub fn blank(size: u32) -> Self {
        Self {
            size,
            coverage: vec![0u8; size as usize * size as usize],
        }
    }

    /// Wrap an existing coverage buffer.
    ///
    /// # Errors
    /// `ConvertError::Config` if the buffer is not `size × size`.
    pub fn from_coverage(size: u32, coverage: Vec<u8>) -> Result<Self, ConvertError> {
        if coverage.len() != size as usize * size as usize {
            return Err(ConvertError::Config(format!(
                "raster de {} octets pour une cellule de {size}px",
                coverage.len()
            )));
        }
        Ok(Self { size, coverage })
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// One row of coverage values.
    #[inline(always)]
    #[must_use]
    pub fn row(&self, y: u32) -> &[u8] {
        let s = self.size as usize;
        &self.coverage[y as usize * s..(y as usize + 1) * s]
    }

    #[must_use]
    pub fn coverage(&self) -> &[u8] {
        &self.coverage
    }

    /// Mutable coverage, used by rasterizers while drawing.
    pub fn coverage_mut(&mut self) -> &mut [u8] {
        &mut self.coverage
    }
}

/// Frame de sortie, à la résolution `coarse × S`.
///
/// `channels` vaut 1 (gris) ou 3 (RGB).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl ComposedFrame {
    /// Zeroed frame for a colour mode.
    #[must_use]
    pub fn new(width: u32, height: u32, mode: ColourMode) -> Self {
        let channels = mode.channels();
        Self {
            data: vec![0u8; width as usize * height as usize * usize::from(channels)],
            width,
            height,
            channels,
        }
    }

    /// Bytes per row.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * usize::from(self.channels)
    }

    /// First channel of pixel (x, y).
    #[inline]
    #[must_use]
    pub fn sample(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.stride() + x as usize * usize::from(self.channels)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32) -> SourceInfo {
        SourceInfo {
            width,
            height,
            fps: 25.0,
            frame_count: None,
        }
    }

    #[test]
    fn derive_follows_source_width() {
        let props = FrameProperties::derive(&info(1285, 723), &ConvertConfig::default()).unwrap();
        assert_eq!(props.coarse_columns, 128);
        assert_eq!(props.coarse_rows, 72);
        assert_eq!(props.cell_size, 10);
        assert_eq!(props.output_dimensions(), (1280, 720));
    }

    #[test]
    fn derive_rejects_empty_grid() {
        let err = FrameProperties::derive(&info(8, 8), &ConvertConfig::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn derive_does_not_lose_a_column_to_float_rounding() {
        let config = ConvertConfig {
            downsample_scale: 0.7,
            ..ConvertConfig::default()
        };
        let props = FrameProperties::derive(&info(1000, 100), &config).unwrap();
        assert_eq!(props.coarse_columns, 700);
        assert_eq!(props.coarse_rows, 70);
    }

    #[test]
    fn match_source_resolution_requires_exact_tiling() {
        let config = ConvertConfig {
            match_source_resolution: true,
            ..ConvertConfig::default()
        };
        assert!(FrameProperties::derive(&info(1280, 720), &config).is_ok());
        let err = FrameProperties::derive(&info(1285, 720), &config).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn explicit_cell_size_and_fps_override() {
        let config = ConvertConfig {
            cell_size: Some(4),
            fps: Some(12),
            downsample_scale: 0.5,
            ..ConvertConfig::default()
        };
        let props = FrameProperties::derive(&info(20, 10), &config).unwrap();
        assert_eq!(props.output_dimensions(), (40, 20));
        assert_eq!(props.fps_rounded(), 12);
    }

    #[test]
    fn huge_cell_size_is_config_error_not_overflow() {
        for cell in [40_000_000, 100_000, MAX_CELL_SIZE + 1] {
            let config = ConvertConfig {
                cell_size: Some(cell),
                ..ConvertConfig::default()
            };
            let err = FrameProperties::derive(&info(1280, 720), &config).unwrap_err();
            assert!(matches!(err, ConvertError::Config(_)), "cell {cell}: {err}");
        }
    }

    #[test]
    fn output_side_is_capped() {
        let config = ConvertConfig {
            cell_size: Some(16),
            downsample_scale: 1.0,
            ..ConvertConfig::default()
        };
        // 1100 columns × 16px = 17600px.
        assert!(FrameProperties::derive(&info(1100, 10), &config).is_err());
        assert!(FrameProperties::derive(&info(1024, 10), &config).is_ok());
        assert!(FrameProperties::new(8, 8, 1.0, None, 1, 1, 8, 8, 8).is_ok());
        assert!(
            FrameProperties::new(8, 8, 1.0, None, 17, 1, 1024, 17 * 1024, 1024).is_err()
        );
    }

    #[test]
    #[should_panic]
    fn pixel_out_of_range_panics() {
        let fb = FrameBuffer::from_gray(2, 2, &[0; 4]);
        let _ = fb.pixel(0, 2);
    }

    #[test]
    fn zero_cell_size_is_config_error() {
        let config = ConvertConfig {
            cell_size: Some(0),
            ..ConvertConfig::default()
        };
        assert!(FrameProperties::derive(&info(100, 100), &config).is_err());
    }

    #[test]
    fn glyph_raster_rejects_wrong_length() {
        assert!(GlyphRaster::from_coverage(2, vec![0; 3]).is_err());
        let r = GlyphRaster::from_coverage(2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(r.row(1), &[3, 4]);
    }

    #[test]
    fn gray_plane_is_identity_on_gray_pixels() {
        let fb = FrameBuffer::from_gray(3, 1, &[0, 128, 255]);
        let mut gray = Vec::new();
        fb.gray_into(&mut gray);
        assert_eq!(gray, vec![0, 128, 255]);
    }
}
