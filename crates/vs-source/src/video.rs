// ffmpeg est piloté en subprocess (std::process::Command) : `ffprobe` pour les
// métadonnées, `ffmpeg` pour un flux rawvideo RGBA à la résolution native.
// Prérequis : `ffmpeg` et `ffprobe` accessibles dans PATH.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use vs_core::error::ConvertError;
use vs_core::frame::{FrameBuffer, SourceInfo};
use vs_core::traits::FrameSource;

use crate::process::StderrTail;

/// Interroge `ffprobe` pour obtenir les métadonnées du flux vidéo principal.
///
/// # Errors
/// `ConvertError::SourceRead` if `ffprobe` cannot be launched, fails on the
/// file, or reports no usable video stream.
///
/// # Example
/// ```no_run
/// use vs_source::video::probe_video;
/// use std::path::Path;
/// let info = probe_video(Path::new("clip.mp4")).unwrap();
/// println!("{}x{} @ {:.3}fps", info.width, info.height, info.fps);
/// ```
pub fn probe_video(path: &Path) -> Result<SourceInfo, ConvertError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
        .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames")
        .args(["-of", "default=noprint_wrappers=1", "-i"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            ConvertError::SourceRead(format!(
                "impossible de lancer ffprobe ({e}). Vérifiez que ffprobe est dans le PATH."
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConvertError::SourceRead(format!(
            "ffprobe a échoué sur {} : {}",
            path.display(),
            stderr.trim()
        )));
    }

    let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
        ConvertError::SourceRead(format!("{} : {e}", path.display()))
    })?;

    log::info!(
        "probe_video: {}x{} @ {:.3}fps, {} frames — {}",
        info.width,
        info.height,
        info.fps,
        info.frame_count.map_or_else(|| "?".to_string(), |n| n.to_string()),
        path.display()
    );
    Ok(info)
}

/// Parse the `key=value` lines printed by `ffprobe -of default=noprint_wrappers=1`.
///
/// `avg_frame_rate` wins over `r_frame_rate` when both are usable. A missing
/// or `N/A` `nb_frames` leaves the frame count unknown.
///
/// # Errors
/// `ConvertError::SourceRead` when width, height or a frame rate is missing
/// or unusable.
///
/// # Example
/// ```
/// use vs_source::video::parse_probe_output;
/// let info = parse_probe_output("width=640\nheight=360\nr_frame_rate=30000/1001\nnb_frames=N/A\n").unwrap();
/// assert_eq!((info.width, info.height), (640, 360));
/// assert!((info.fps - 29.97).abs() < 0.01);
/// assert_eq!(info.frame_count, None);
/// ```
pub fn parse_probe_output(text: &str) -> Result<SourceInfo, ConvertError> {
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;
    let mut r_rate: Option<f64> = None;
    let mut avg_rate: Option<f64> = None;
    let mut frame_count: Option<u64> = None;

    for line in text.lines() {
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        let val = val.trim();
        match key.trim() {
            "width" => width = val.parse().ok().filter(|&w| w > 0),
            "height" => height = val.parse().ok().filter(|&h| h > 0),
            "r_frame_rate" => r_rate = parse_rate(val),
            "avg_frame_rate" => avg_rate = parse_rate(val),
            "nb_frames" => frame_count = val.parse().ok().filter(|&n| n > 0),
            _ => {}
        }
    }

    let (Some(width), Some(height)) = (width, height) else {
        return Err(ConvertError::SourceRead(
            "aucun flux vidéo décodable (dimensions absentes)".into(),
        ));
    };
    let fps = avg_rate.or(r_rate).ok_or_else(|| {
        ConvertError::SourceRead("fréquence d'images absente ou nulle".into())
    })?;

    Ok(SourceInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// `"24/1"`, `"30000/1001"`, `"25"`; `"0/0"` and garbage give `None`.
fn parse_rate(val: &str) -> Option<f64> {
    let rate = match val.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => val.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Remplit `buf` autant que possible depuis `reader`.
///
/// Retourne le nombre d'octets lus : `buf.len()` pour une frame complète,
/// 0 sur EOF propre, entre les deux pour une frame tronquée.
///
/// # Errors
/// Propagates any I/O error other than `Interrupted`.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Décodeur vidéo : un processus `ffmpeg` qui écrit des frames RGBA brutes
/// sur stdout, lues une par une à la demande.
///
/// Chaque frame = `width × height × 4` octets, sans padding.
pub struct VideoSource {
    path: PathBuf,
    info: SourceInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<StderrTail>,
    frames_read: u64,
}

impl VideoSource {
    /// Probe `path` then start the decoder.
    ///
    /// # Errors
    /// `ConvertError::SourceRead` if probing fails or ffmpeg cannot be spawned.
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let info = probe_video(path)?;
        Self::start(path, info, decoder_command(path))
    }

    /// Spawn `decoder`, which must write `info`-sized RGBA frames on stdout.
    fn start(path: &Path, info: SourceInfo, mut decoder: Command) -> Result<Self, ConvertError> {
        decoder
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        log::debug!("spawn: {decoder:?}");
        let mut child = decoder.spawn().map_err(|e| {
            ConvertError::SourceRead(format!(
                "impossible de lancer ffmpeg ({e}). Vérifiez que ffmpeg est dans le PATH."
            ))
        })?;
        let stderr = StderrTail::spawn(child.stderr.take());
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConvertError::SourceRead(
                "stdout du décodeur ffmpeg indisponible".into(),
            ));
        };
        Ok(Self {
            path: path.to_path_buf(),
            info,
            child: Some(child),
            stdout: Some(stdout),
            stderr: Some(stderr),
            frames_read: 0,
        })
    }

    /// Waits for the decoder once its stream is exhausted.
    fn finish(&mut self) -> Result<(), ConvertError> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| {
            ConvertError::SourceRead(format!("attente du décodeur ffmpeg : {e}"))
        })?;
        let stderr = self.stderr.take().map(StderrTail::finish).unwrap_or_default();
        if status.success() {
            log::debug!(
                "Décodeur terminé après {} frames — {}",
                self.frames_read,
                self.path.display()
            );
            Ok(())
        } else {
            Err(ConvertError::SourceRead(format!(
                "ffmpeg a échoué ({status}) après {} frames : {stderr}",
                self.frames_read
            )))
        }
    }
}

impl FrameSource for VideoSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, ConvertError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut frame = FrameBuffer::new(self.info.width, self.info.height);
        let n = read_exact_or_eof(stdout, &mut frame.data).map_err(|e| {
            ConvertError::SourceRead(format!("lecture du flux ffmpeg : {e}"))
        })?;

        if n == frame.data.len() {
            self.frames_read += 1;
            return Ok(Some(frame));
        }
        if n > 0 {
            let _ = self.finish();
            return Err(ConvertError::SourceRead(format!(
                "frame {} tronquée ({n}/{} octets)",
                self.frames_read,
                frame.data.len()
            )));
        }
        self.finish()?;
        Ok(None)
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// `ffmpeg` → rawvideo RGBA sur stdout, résolution et cadence natives.
fn decoder_command(path: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-an"])
        .arg("pipe:1");
    cmd
}

/// `true` si `ffmpeg` répond à `-version`.
#[must_use]
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Writes a short synthetic test clip with ffmpeg's `testsrc`.
///
/// # Errors
/// `ConvertError::SinkWrite` if ffmpeg is missing or fails.
pub fn write_test_clip(path: &Path, width: u32, height: u32, frames: u32) -> Result<(), ConvertError> {
    let src = format!("testsrc=size={width}x{height}:rate=10");
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i", &src])
        .args(["-frames:v", &frames.to_string(), "-pix_fmt", "yuv444p"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ConvertError::SinkWrite(format!("ffmpeg introuvable : {e}")))?;
    if !output.status.success() {
        return Err(ConvertError::SinkWrite(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_probe_output() {
        let text = "width=1280\nheight=720\nr_frame_rate=24/1\navg_frame_rate=24/1\nnb_frames=48\n";
        let info = parse_probe_output(text).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps - 24.0).abs() < 1e-9);
        assert_eq!(info.frame_count, Some(48));
    }

    #[test]
    fn avg_rate_wins_and_bad_rates_fall_back() {
        let info =
            parse_probe_output("width=8\nheight=8\nr_frame_rate=60/1\navg_frame_rate=0/0\n").unwrap();
        assert!((info.fps - 60.0).abs() < 1e-9);

        let info =
            parse_probe_output("width=8\nheight=8\nr_frame_rate=60/1\navg_frame_rate=25/1\n").unwrap();
        assert!((info.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn missing_fields_are_source_errors() {
        assert!(matches!(
            parse_probe_output("height=8\nr_frame_rate=24/1\n"),
            Err(ConvertError::SourceRead(_))
        ));
        assert!(parse_probe_output("width=8\nheight=8\nr_frame_rate=0/0\n").is_err());
        assert!(parse_probe_output("").is_err());
    }

    #[test]
    fn read_exact_or_eof_reports_partial_reads() {
        let mut buf = [0u8; 4];
        assert_eq!(read_exact_or_eof(&mut &[1u8, 2, 3, 4, 5][..], &mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(read_exact_or_eof(&mut &[9u8, 9][..], &mut buf).unwrap(), 2);
        assert_eq!(read_exact_or_eof(&mut &[][..], &mut buf).unwrap(), 0);
    }

    #[test]
    fn missing_file_is_source_error() {
        let err = VideoSource::open(Path::new("/nonexistent/clip.mp4")).err().unwrap();
        assert!(matches!(err, ConvertError::SourceRead(_)));
    }

    #[test]
    fn decodes_every_frame_of_a_generated_clip() {
        if !ffmpeg_available() {
            eprintln!("ffmpeg absent, test ignoré");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mkv");
        write_test_clip(&path, 32, 24, 5).unwrap();

        let mut source = VideoSource::open(&path).unwrap();
        let info = source.info();
        assert_eq!((info.width, info.height), (32, 24));

        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.data.len(), 32 * 24 * 4);
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    fn shell_decoder(script: &str) -> VideoSource {
        let info = SourceInfo {
            width: 2,
            height: 2,
            fps: 10.0,
            frame_count: None,
        };
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        VideoSource::start(Path::new("fake.mp4"), info, cmd).unwrap()
    }

    /// Reads `source` to the end on another thread; fails if it stalls.
    #[cfg(unix)]
    fn drain_with_deadline(mut source: VideoSource) -> (usize, Result<(), ConvertError>) {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let mut frames = 0;
            let result = loop {
                match source.next_frame() {
                    Ok(Some(_)) => frames += 1,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            let _ = tx.send((frames, result));
        });
        rx.recv_timeout(std::time::Duration::from_secs(30))
            .expect("le décodeur s'est bloqué")
    }

    #[cfg(unix)]
    #[test]
    fn chatty_decoder_stderr_does_not_stall_the_stream() {
        // ~256 KiB of decode errors before any frame, then two 2x2 RGBA frames.
        let source = shell_decoder(
            "i=0; while [ $i -lt 4096 ]; do \
             echo 'error while decoding MB 12 34, bytestream -5 ..................' >&2; \
             i=$((i+1)); done; head -c 32 /dev/zero",
        );
        let (frames, result) = drain_with_deadline(source);
        assert_eq!(frames, 2);
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn truncated_frame_is_source_error() {
        let source = shell_decoder("head -c 20 /dev/zero");
        let (frames, result) = drain_with_deadline(source);
        assert_eq!(frames, 1);
        let Err(ConvertError::SourceRead(msg)) = result else {
            panic!("attendu SourceRead, reçu {result:?}");
        };
        assert!(msg.contains("tronquée"), "{msg}");
    }

    #[cfg(unix)]
    #[test]
    fn failing_decoder_exit_is_source_error_with_stderr() {
        let source = shell_decoder("head -c 16 /dev/zero; echo 'moov atom not found' >&2; exit 1");
        let (frames, result) = drain_with_deadline(source);
        assert_eq!(frames, 1);
        let Err(ConvertError::SourceRead(msg)) = result else {
            panic!("attendu SourceRead, reçu {result:?}");
        };
        assert!(msg.contains("moov atom not found"), "{msg}");
    }
}
