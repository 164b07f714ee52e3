//! Types partagés, configuration et contrats des collaborateurs pour vidscii.
//!
//! This crate holds everything the conversion stages agree on: the glyph set
//! and its quantizer, frame geometry, the collaborator traits and the error
//! type every stage reports with.

pub mod charset;
pub mod config;
pub mod error;
pub mod frame;
pub mod media;
pub mod progress;
pub mod traits;

pub use charset::{GlyphSet, LuminanceQuantizer};
pub use config::{ColourMode, ConvertConfig, GlyphPlacement};
pub use error::{ConvertError, ErrorKind};
pub use frame::{ComposedFrame, FrameBuffer, FrameProperties, GlyphRaster, SourceInfo};
pub use media::MediaKind;
pub use progress::{PipelineProgress, PipelineState};
pub use traits::{FrameSink, FrameSource, GlyphRasterizer};
