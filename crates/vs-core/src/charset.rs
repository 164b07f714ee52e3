use crate::error::ConvertError;

/// 64 caractères — palette historique de l'outil, sans caractères d'échappement.
pub const CHARSET_DEFAULT: &str =
    " .^,:;Il!i~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// 10 caractères — compact, bon contraste.
pub const CHARSET_COMPACT: &str = " .:-=+*#%@";

/// 69 caractères — Paul Bourke extended, bon équilibre.
pub const CHARSET_STANDARD: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// Blocs Unicode — pseudo-pixels.
pub const CHARSET_BLOCKS: &str = " ░▒▓█";

/// Resolve a preset name to its character set.
///
/// # Example
/// ```
/// use vs_core::charset::{preset, CHARSET_COMPACT};
/// assert_eq!(preset("compact"), Some(CHARSET_COMPACT));
/// assert_eq!(preset("nope"), None);
/// ```
#[must_use]
pub fn preset(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "default" => Some(CHARSET_DEFAULT),
        "compact" => Some(CHARSET_COMPACT),
        "standard" => Some(CHARSET_STANDARD),
        "blocks" => Some(CHARSET_BLOCKS),
        _ => None,
    }
}

/// Ordered palette of glyphs, sparse → dense.
///
/// The order is the luminance mapping: index 0 is drawn for black, the last
/// symbol for white. It is never re-sorted.
///
/// # Example
/// ```
/// use vs_core::charset::GlyphSet;
/// let set = GlyphSet::new(" .#").unwrap();
/// assert_eq!(set.len(), 3);
/// assert_eq!(set.symbol(2), '#');
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphSet {
    symbols: Vec<char>,
}

impl GlyphSet {
    /// Validate and build a glyph set.
    ///
    /// # Errors
    /// `ConvertError::Config` if the set has fewer than 2 symbols, repeats a
    /// symbol, or contains a control character.
    pub fn new(charset: &str) -> Result<Self, ConvertError> {
        let symbols: Vec<char> = charset.chars().collect();
        if symbols.len() < 2 {
            return Err(ConvertError::Config(format!(
                "le jeu de glyphes doit contenir au moins 2 caractères (reçu {})",
                symbols.len()
            )));
        }
        if let Some(c) = symbols.iter().find(|c| c.is_control()) {
            return Err(ConvertError::Config(format!(
                "caractère non imprimable dans le jeu de glyphes : {c:?}"
            )));
        }
        for (i, c) in symbols.iter().enumerate() {
            if symbols[..i].contains(c) {
                return Err(ConvertError::Config(format!(
                    "caractère dupliqué dans le jeu de glyphes : {c:?}"
                )));
            }
        }
        Ok(Self { symbols })
    }

    /// Number of symbols (always ≥ 2).
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Symbol at quantization index `index`.
    #[inline]
    #[must_use]
    pub fn symbol(&self, index: usize) -> char {
        self.symbols[index]
    }

    /// Symbols in mapping order.
    #[must_use]
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }
}

/// Lookup table mapping luminance [0..255] → glyph index.
///
/// `index = floor(v / 255 * (N - 1))`, clamped to `N - 1`. Linear, no gamma.
/// Pre-computed once so the per-cell cost is one array read.
///
/// # Example
/// ```
/// use vs_core::charset::{GlyphSet, LuminanceQuantizer};
/// let q = LuminanceQuantizer::new(&GlyphSet::new(" .#").unwrap());
/// assert_eq!(q.quantize(0), 0);
/// assert_eq!(q.quantize(128), 1);
/// assert_eq!(q.quantize(255), 2);
/// ```
#[derive(Clone)]
pub struct LuminanceQuantizer {
    lut: [usize; 256],
    levels: usize,
}

impl LuminanceQuantizer {
    /// Build the table for a validated glyph set.
    #[must_use]
    pub fn new(set: &GlyphSet) -> Self {
        let levels = set.len();
        let last = levels - 1;
        let mut lut = [0usize; 256];
        for (v, slot) in lut.iter_mut().enumerate() {
            // Integer floor of v * (N-1) / 255: exact, so 255 lands on N-1.
            *slot = (v * last / 255).min(last);
        }
        Self { lut, levels }
    }

    /// Map a gray value to an index in `[0, N-1]`.
    #[inline(always)]
    #[must_use]
    pub fn quantize(&self, value: u8) -> usize {
        self.lut[value as usize]
    }

    /// N, the number of buckets.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_single_symbol() {
        let err = GlyphSet::new("@").unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
        assert!(GlyphSet::new("").is_err());
    }

    #[test]
    fn rejects_duplicates_and_controls() {
        assert!(GlyphSet::new(" .. ").is_err());
        assert!(GlyphSet::new(" \t#").is_err());
    }

    #[test]
    fn keeps_insertion_order() {
        let set = GlyphSet::new("#. ").unwrap();
        assert_eq!(set.symbols(), &['#', '.', ' ']);
    }

    #[test]
    fn quantize_bounds_and_monotonic_for_all_sizes() {
        for n in 2..=CHARSET_STANDARD.chars().count() {
            let charset: String = CHARSET_STANDARD.chars().take(n).collect();
            let set = GlyphSet::new(&charset).unwrap();
            let q = LuminanceQuantizer::new(&set);
            assert_eq!(q.quantize(0), 0);
            assert_eq!(q.quantize(255), n - 1, "N = {n}");
            let mut prev = 0usize;
            for v in 0..=255u8 {
                let idx = q.quantize(v);
                assert!(idx < n);
                assert!(idx >= prev, "non monotone à {v} pour N = {n}");
                prev = idx;
            }
        }
    }

    #[test]
    fn quantize_matches_reference_scenario() {
        let q = LuminanceQuantizer::new(&GlyphSet::new(" .#").unwrap());
        assert_eq!(q.quantize(64), 0);
        assert_eq!(q.quantize(127), 0);
        assert_eq!(q.quantize(128), 1);
        assert_eq!(q.quantize(254), 1);
    }

    #[test]
    fn presets_are_valid_glyph_sets() {
        for name in ["default", "compact", "standard", "blocks"] {
            let charset = preset(name).unwrap();
            assert!(GlyphSet::new(charset).is_ok(), "preset {name}");
        }
    }
}
