use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use vs_core::config::{ColourMode, ConvertConfig, GlyphPlacement};

/// vidscii — convertit une vidéo (ou une image) en art ASCII rendu en pixels.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier d'entrée : vidéo (mp4, m4v, avi, mkv, mov, webm) ou image (png, jpg, bmp, gif).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Fichier de sortie. Son extension choisit l'encodeur.
    #[arg(short, long, required_unless_present = "text")]
    pub output: Option<PathBuf>,

    /// Police TrueType/OpenType. Défaut : première police monospace système trouvée.
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Jeu de glyphes, du plus clair au plus dense.
    #[arg(long)]
    pub charset: Option<String>,

    /// Jeu de glyphes prédéfini : default, compact, standard, blocks.
    #[arg(long, conflicts_with = "charset")]
    pub charset_preset: Option<String>,

    /// Côté d'une cellule en pixels. Défaut : dérivé de la largeur source.
    #[arg(long)]
    pub cell_size: Option<u32>,

    /// Densité de la grille ]0, 1] : colonnes = largeur × scale.
    #[arg(long)]
    pub scale: Option<f32>,

    /// Teinter chaque glyphe avec la couleur moyenne de sa cellule.
    #[arg(long, default_value_t = false)]
    pub colour: bool,

    /// Centrer la boîte d'encre des glyphes au lieu de les poser sur la ligne de base.
    #[arg(long, default_value_t = false)]
    pub centered: bool,

    /// FPS de sortie forcé.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Lecture, conversion et écriture sur un seul thread.
    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    /// Capacité des files entre étages.
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Fichier de configuration TOML. Défaut : ./vidscii.toml s'il existe.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Afficher l'image d'entrée en texte ASCII sur stdout.
    #[arg(long, default_value_t = false)]
    pub text: bool,

    /// Largeur du rendu texte, en colonnes.
    #[arg(long, default_value_t = vs_ascii::text::DEFAULT_TEXT_COLUMNS)]
    pub text_width: u32,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Config lue quand `--config` est absent.
pub const DEFAULT_CONFIG_FILE: &str = "vidscii.toml";

impl Cli {
    /// Resolve the run configuration: TOML file first, then CLI overrides.
    ///
    /// Overrides are not clamped: an out-of-range value from the command
    /// line is reported by validation instead of being silently fixed.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the charset preset is unknown.
    pub fn resolve_config(&self) -> anyhow::Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => vs_core::config::load_config(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    log::info!("Config chargée depuis {}", default.display());
                    vs_core::config::load_config(&default)?
                } else {
                    ConvertConfig::default()
                }
            }
        };

        if let Some(name) = &self.charset_preset {
            let charset = vs_core::charset::preset(name).with_context(|| {
                format!("Preset de glyphes inconnu : {name} (default, compact, standard, blocks)")
            })?;
            config.charset = charset.to_string();
        }
        if let Some(charset) = &self.charset {
            config.charset.clone_from(charset);
        }
        if let Some(font) = &self.font {
            config.font_path = Some(font.clone());
        }
        if let Some(cell) = self.cell_size {
            config.cell_size = Some(cell);
        }
        if let Some(scale) = self.scale {
            config.downsample_scale = scale;
        }
        if self.colour {
            config.colour_mode = ColourMode::Colour;
        }
        if self.centered {
            config.glyph_placement = GlyphPlacement::Centered;
        }
        if let Some(fps) = self.fps {
            config.fps = Some(fps);
        }
        if self.sequential {
            config.pipelined = false;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vidscii").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn output_is_required_unless_text() {
        assert!(Cli::try_parse_from(["vidscii", "-i", "a.mp4"]).is_err());
        let cli = parse(&["-i", "a.png", "--text"]);
        assert!(cli.output.is_none());
        assert_eq!(cli.text_width, 80);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "-i", "a.mp4", "-o", "b.mp4", "--charset", " .#", "--cell-size", "6", "--scale",
            "0.2", "--colour", "--centered", "--fps", "12", "--sequential", "--queue-capacity",
            "4",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.charset, " .#");
        assert_eq!(config.cell_size, Some(6));
        assert!((config.downsample_scale - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.colour_mode, ColourMode::Colour);
        assert_eq!(config.glyph_placement, GlyphPlacement::Centered);
        assert_eq!(config.fps, Some(12));
        assert!(!config.pipelined);
        assert_eq!(config.queue_capacity, 4);
    }

    #[test]
    fn preset_and_explicit_charset_conflict() {
        assert!(
            Cli::try_parse_from([
                "vidscii", "-i", "a.mp4", "-o", "b.mp4", "--charset", "ab",
                "--charset-preset", "compact",
            ])
            .is_err()
        );
        let cli = parse(&["-i", "a.mp4", "-o", "b.mp4", "--charset-preset", "blocks"]);
        assert_eq!(
            cli.resolve_config().unwrap().charset,
            vs_core::charset::CHARSET_BLOCKS
        );
        let cli = parse(&["-i", "a.mp4", "-o", "b.mp4", "--charset-preset", "nope"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn config_file_then_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[convert]\ncell_size = 9\nqueue_capacity = 7\n").unwrap();
        let cli = parse(&[
            "-i",
            "a.mp4",
            "-o",
            "b.mp4",
            "-c",
            path.to_str().unwrap(),
            "--queue-capacity",
            "3",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.cell_size, Some(9));
        assert_eq!(config.queue_capacity, 3);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = parse(&["-i", "a.mp4", "-o", "b.mp4", "-c", "/nonexistent/run.toml"]);
        assert!(cli.resolve_config().is_err());
    }
}
