use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::charset::GlyphSet;
use crate::error::ConvertError;
use crate::frame::MAX_CELL_SIZE;

/// Configuration d'une conversion, figée au démarrage du run.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use vs_core::config::ConvertConfig;
/// let config = ConvertConfig::default();
/// assert_eq!(config.queue_capacity, 25);
/// assert!(config.cell_size.is_none());
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConvertConfig {
    /// Jeu de glyphes, du plus clair au plus dense.
    pub charset: String,
    /// Côté d'une cellule en pixels. `None` = dérivé de la largeur source.
    pub cell_size: Option<u32>,
    /// Densité de la grille grossière ]0, 1] : colonnes = largeur × scale.
    pub downsample_scale: f32,
    /// Sortie en niveaux de gris ou teintée par la couleur source.
    pub colour_mode: ColourMode,
    /// Placement du glyphe dans sa cellule.
    pub glyph_placement: GlyphPlacement,
    /// Police TrueType/OpenType utilisée pour rasteriser les glyphes.
    pub font_path: Option<PathBuf>,
    /// FPS de sortie forcé. `None` = fps de la source.
    pub fps: Option<u32>,
    /// Exiger que la sortie ait exactement la résolution source.
    pub match_source_resolution: bool,
    /// Lecture / conversion / écriture sur trois threads.
    pub pipelined: bool,
    /// Capacité des files bornées entre étages.
    pub queue_capacity: usize,
    /// CRF x264 (0 = lossless).
    pub encoder_crf: u8,
    /// Preset x264.
    pub encoder_preset: String,
}

/// Colour handling of the composed frames.
///
/// # Example
/// ```
/// use vs_core::config::ColourMode;
/// assert_eq!(ColourMode::default().channels(), 1);
/// assert_eq!(ColourMode::Colour.channels(), 3);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ColourMode {
    /// Couverture du glyphe en gris, un canal.
    #[default]
    Grayscale,
    /// Couverture × couleur moyenne de la cellule, RGB.
    Colour,
}

impl ColourMode {
    /// Bytes per output pixel.
    #[must_use]
    pub fn channels(self) -> u8 {
        match self {
            Self::Grayscale => 1,
            Self::Colour => 3,
        }
    }
}

/// Where a glyph sits inside its square cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum GlyphPlacement {
    /// Centré horizontalement sur l'avance, boîte de ligne calée en bas.
    #[default]
    Baseline,
    /// Boîte d'encre centrée sur les deux axes.
    Centered,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            charset: crate::charset::CHARSET_DEFAULT.to_string(),
            cell_size: None,
            downsample_scale: 0.1,
            colour_mode: ColourMode::Grayscale,
            glyph_placement: GlyphPlacement::Baseline,
            font_path: None,
            fps: None,
            match_source_resolution: false,
            pipelined: true,
            queue_capacity: 25,
            encoder_crf: 0,
            encoder_preset: "medium".to_string(),
        }
    }
}

impl ConvertConfig {
    /// Clamp numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        if self.downsample_scale.is_finite() {
            self.downsample_scale = self.downsample_scale.clamp(f32::MIN_POSITIVE, 1.0);
        } else {
            self.downsample_scale = 0.1;
        }
        self.queue_capacity = self.queue_capacity.clamp(1, 1024);
        self.encoder_crf = self.encoder_crf.min(51);
    }

    /// Check everything that can be checked before a source is opened.
    ///
    /// Returns the validated glyph set so callers never work with an
    /// unchecked charset.
    ///
    /// # Errors
    /// `ConvertError::Config` on a bad glyph set, a zero or oversized cell size, a scale
    /// outside ]0, 1], a zero fps or a zero queue capacity.
    ///
    /// # Example
    /// ```
    /// use vs_core::config::ConvertConfig;
    /// let mut config = ConvertConfig::default();
    /// config.charset = "@".into();
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<GlyphSet, ConvertError> {
        let set = GlyphSet::new(&self.charset)?;
        if self.cell_size == Some(0) {
            return Err(ConvertError::Config(
                "la taille de cellule doit être strictement positive".into(),
            ));
        }
        if let Some(cell) = self.cell_size
            && cell > MAX_CELL_SIZE
        {
            return Err(ConvertError::Config(format!(
                "taille de cellule {cell}px au-delà du maximum {MAX_CELL_SIZE}px"
            )));
        }
        if !(self.downsample_scale > 0.0 && self.downsample_scale <= 1.0) {
            return Err(ConvertError::Config(format!(
                "downsample_scale doit être dans ]0, 1] (reçu {})",
                self.downsample_scale
            )));
        }
        if self.fps == Some(0) {
            return Err(ConvertError::Config("fps doit être strictement positif".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConvertError::Config(
                "queue_capacity doit être strictement positive".into(),
            ));
        }
        Ok(set)
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    convert: Option<ConvertSection>,
}

/// Convert section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct ConvertSection {
    charset: Option<String>,
    charset_preset: Option<String>,
    cell_size: Option<u32>,
    downsample_scale: Option<f32>,
    colour_mode: Option<ColourMode>,
    glyph_placement: Option<GlyphPlacement>,
    font_path: Option<PathBuf>,
    fps: Option<u32>,
    match_source_resolution: Option<bool>,
    pipelined: Option<bool>,
    queue_capacity: Option<usize>,
    encoder_crf: Option<u8>,
    encoder_preset: Option<String>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// Relative `font_path` values are resolved against the file's directory.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or names an unknown
/// charset preset.
///
/// # Example
/// ```no_run
/// use vs_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("vidscii.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<ConvertConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;

    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))?;

    let mut config = ConvertConfig::default();
    let Some(c) = file.convert else {
        log::warn!("{} : pas de section [convert], défauts utilisés", path.display());
        return Ok(config);
    };

    if let Some(name) = c.charset_preset {
        let charset = crate::charset::preset(&name)
            .with_context(|| format!("Preset de glyphes inconnu : {name}"))?;
        config.charset = charset.to_string();
    }
    if let Some(v) = c.charset {
        config.charset = v;
    }
    if let Some(v) = c.cell_size {
        config.cell_size = Some(v);
    }
    if let Some(v) = c.downsample_scale {
        config.downsample_scale = v;
    }
    if let Some(v) = c.colour_mode {
        config.colour_mode = v;
    }
    if let Some(v) = c.glyph_placement {
        config.glyph_placement = v;
    }
    if let Some(v) = c.font_path {
        config.font_path = Some(if v.is_relative() {
            path.parent().map_or(v.clone(), |dir| dir.join(&v))
        } else {
            v
        });
    }
    if let Some(v) = c.fps {
        config.fps = Some(v);
    }
    if let Some(v) = c.match_source_resolution {
        config.match_source_resolution = v;
    }
    if let Some(v) = c.pipelined {
        config.pipelined = v;
    }
    if let Some(v) = c.queue_capacity {
        config.queue_capacity = v;
    }
    if let Some(v) = c.encoder_crf {
        config.encoder_crf = v;
    }
    if let Some(v) = c.encoder_preset {
        config.encoder_preset = v;
    }

    config.clamp_all();
    Ok(config)
}
