use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer as FirResizer};
use vs_core::error::ConvertError;

/// Downsampler réutilisable wrappant fast_image_resize.
///
/// Filtre Box (moyenne de zone) : chaque échantillon grossier est la
/// luminosité moyenne de sa région source, jamais un point isolé.
///
/// # Example
/// ```
/// use vs_ascii::downsample::Downsampler;
/// let mut d = Downsampler::new();
/// let src = vec![0u8, 255, 0, 255];
/// let mut dst = vec![0u8; 1];
/// d.downsample_gray(&src, 2, 2, &mut dst, 1, 1).unwrap();
/// assert!((120..=135).contains(&dst[0]));
/// ```
pub struct Downsampler {
    inner: FirResizer,
    options: ResizeOptions,
    /// Scratch copy of the source (fast_image_resize wants `&mut` on it).
    src_buf: Vec<u8>,
}

impl Downsampler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: FirResizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box)),
            src_buf: Vec::new(),
        }
    }

    /// Reduce a one-byte-per-pixel plane.
    ///
    /// # Errors
    /// `ConvertError::SourceRead` if a buffer does not match its dimensions.
    pub fn downsample_gray(
        &mut self,
        src: &[u8],
        src_w: u32,
        src_h: u32,
        dst: &mut [u8],
        dst_w: u32,
        dst_h: u32,
    ) -> Result<(), ConvertError> {
        self.resize(src, src_w, src_h, dst, dst_w, dst_h, PixelType::U8)
    }

    /// Reduce an RGB plane (3 bytes per pixel).
    ///
    /// # Errors
    /// `ConvertError::SourceRead` if a buffer does not match its dimensions.
    pub fn downsample_rgb(
        &mut self,
        src: &[u8],
        src_w: u32,
        src_h: u32,
        dst: &mut [u8],
        dst_w: u32,
        dst_h: u32,
    ) -> Result<(), ConvertError> {
        self.resize(src, src_w, src_h, dst, dst_w, dst_h, PixelType::U8x3)
    }

    #[allow(clippy::too_many_arguments)]
    fn resize(
        &mut self,
        src: &[u8],
        src_w: u32,
        src_h: u32,
        dst: &mut [u8],
        dst_w: u32,
        dst_h: u32,
        pixel_type: PixelType,
    ) -> Result<(), ConvertError> {
        if src_w == dst_w && src_h == dst_h {
            if src.len() != dst.len() {
                return Err(ConvertError::SourceRead(format!(
                    "plan de {} octets pour {} attendus",
                    src.len(),
                    dst.len()
                )));
            }
            dst.copy_from_slice(src);
            return Ok(());
        }

        self.src_buf.clear();
        self.src_buf.extend_from_slice(src);

        let src_image = Image::from_slice_u8(src_w, src_h, &mut self.src_buf, pixel_type)
            .map_err(|e| ConvertError::SourceRead(format!("dimensions source invalides : {e}")))?;
        let mut dst_image = Image::from_slice_u8(dst_w, dst_h, dst, pixel_type)
            .map_err(|e| ConvertError::SourceRead(format!("dimensions cible invalides : {e}")))?;

        self.inner
            .resize(&src_image, &mut dst_image, Some(&self.options))
            .map_err(|e| ConvertError::SourceRead(format!("réduction impossible : {e}")))?;
        Ok(())
    }
}

impl Default for Downsampler {
    fn default() -> Self {
        Self::new()
    }
}
