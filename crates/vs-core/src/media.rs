use std::path::Path;

use crate::error::ConvertError;

/// Extensions vidéo acceptées, en minuscules.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "avi", "mkv", "mov", "webm"];

/// Extensions d'image fixe acceptées, en minuscules.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Nature d'un fichier d'entrée ou de sortie, déduite de son extension.
///
/// # Example
/// ```
/// use vs_core::media::MediaKind;
/// use std::path::Path;
/// assert_eq!(MediaKind::from_path(Path::new("clip.MKV")).unwrap(), MediaKind::Video);
/// assert_eq!(MediaKind::from_path(Path::new("still.png")).unwrap(), MediaKind::Image);
/// assert!(MediaKind::from_path(Path::new("notes.txt")).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify `path` by extension, case-insensitively.
    ///
    /// # Errors
    /// `ConvertError::Config` when the extension is missing or not supported.
    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                ConvertError::Config(format!("extension manquante : {}", path.display()))
            })?;

        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Image)
        } else {
            Err(ConvertError::Config(format!(
                "extension non valide « {ext} » pour {} (vidéo : {}, image : {})",
                path.display(),
                VIDEO_EXTENSIONS.join(", "),
                IMAGE_EXTENSIONS.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_extension_is_accepted() {
        for ext in VIDEO_EXTENSIONS {
            let p = format!("a.{ext}");
            assert_eq!(MediaKind::from_path(Path::new(&p)).unwrap(), MediaKind::Video);
        }
        for ext in IMAGE_EXTENSIONS {
            let p = format!("a.{}", ext.to_uppercase());
            assert_eq!(MediaKind::from_path(Path::new(&p)).unwrap(), MediaKind::Image);
        }
    }

    #[test]
    fn unknown_or_missing_extension_is_config_error() {
        for p in ["movie", "movie.flv", "dir.d/file"] {
            let err = MediaKind::from_path(Path::new(p)).unwrap_err();
            assert!(matches!(err, ConvertError::Config(_)), "{p}");
        }
    }
}
