//! Moteur de conversion pixel → glyphes pour vidscii.
//!
//! Glyph cache, smoothing downsample, and the frame composer that tiles
//! cached rasters into full-resolution output frames.
pub mod compositor;
pub mod downsample;
pub mod glyph_cache;
pub mod text;

pub use compositor::{FrameComposer, compose_frame};
pub use downsample::Downsampler;
pub use glyph_cache::GlyphCache;
