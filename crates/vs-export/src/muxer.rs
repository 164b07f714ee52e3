use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use vs_core::config::ColourMode;
use vs_core::error::ConvertError;
use vs_core::frame::{ComposedFrame, FrameProperties};
use vs_core::traits::FrameSink;
use vs_source::process::StderrTail;

use crate::part_path;

/// Encode les frames composées avec ffmpeg (x264 RGB lossless par défaut).
///
/// L'encodeur écrit dans `<nom>.part.<ext>` ; le fichier n'est renommé vers
/// le chemin final qu'au `finalize`. `abort` (ou un drop sans finalize) tue
/// l'encodeur et supprime le fichier partiel.
pub struct Mp4Muxer {
    child: Option<Child>,
    stderr: Option<StderrTail>,
    final_path: PathBuf,
    part_path: PathBuf,
    width: u32,
    height: u32,
    channels: u8,
    frames_written: u64,
}

impl Mp4Muxer {
    /// Démarre l'encodeur pour des frames de `properties.output_dimensions()`.
    ///
    /// `crf` 0 = lossless ; `preset` est passé tel quel à x264.
    ///
    /// # Errors
    /// `ConvertError::SinkWrite` if ffmpeg is not installed or cannot start.
    pub fn new(
        output_path: &Path,
        properties: &FrameProperties,
        colour_mode: ColourMode,
        crf: u8,
        preset: &str,
    ) -> Result<Self, ConvertError> {
        let (width, height) = properties.output_dimensions();
        let part = part_path(output_path);
        let input_fmt = match colour_mode {
            ColourMode::Grayscale => "gray",
            ColourMode::Colour => "rgb24",
        };
        let webm = output_path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("webm"));

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-vcodec", "rawvideo", "-pix_fmt", input_fmt])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{:.3}", properties.fps)])
            .args(["-i", "-"]);
        if webm {
            cmd.args(["-c:v", "libvpx-vp9", "-b:v", "0", "-crf"])
                .arg(crf.max(1).to_string())
                .args(["-pix_fmt", "yuv444p"]);
        } else {
            cmd.args(["-c:v", "libx264rgb", "-crf"])
                .arg(crf.to_string())
                .args(["-preset", preset])
                .args(["-pix_fmt", "rgb24", "-color_range", "pc"]);
        }
        cmd.arg(&part);

        let muxer = Self::start(cmd, output_path, part, (width, height), colour_mode)?;
        log::info!(
            "Encodeur démarré : {width}x{height} {input_fmt} @ {:.3}fps → {}",
            properties.fps,
            output_path.display()
        );
        Ok(muxer)
    }

    /// Spawn `encoder`, which reads raw frames on stdin and writes `part`.
    fn start(
        mut encoder: Command,
        output_path: &Path,
        part: PathBuf,
        (width, height): (u32, u32),
        colour_mode: ColourMode,
    ) -> Result<Self, ConvertError> {
        encoder
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        log::debug!("spawn: {encoder:?}");
        let mut child = encoder.spawn().map_err(|e| {
            ConvertError::SinkWrite(format!(
                "échec de l'initialisation de l'encodeur ffmpeg ({e}). Est-il dans PATH ?"
            ))
        })?;
        let stderr = StderrTail::spawn(child.stderr.take());
        Ok(Self {
            child: Some(child),
            stderr: Some(stderr),
            final_path: output_path.to_path_buf(),
            part_path: part,
            width,
            height,
            channels: colour_mode.channels(),
            frames_written: 0,
        })
    }

    fn take_stderr(&mut self) -> String {
        self.stderr.take().map(StderrTail::finish).unwrap_or_default()
    }

    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Kills the encoder and returns whatever it printed on stderr.
    fn kill_encoder(&mut self) -> String {
        let Some(mut child) = self.child.take() else {
            return String::new();
        };
        drop(child.stdin.take());
        let _ = child.kill();
        let _ = child.wait();
        self.take_stderr()
    }

    fn remove_part(&self) {
        if self.part_path.exists()
            && let Err(e) = std::fs::remove_file(&self.part_path)
        {
            log::warn!(
                "Impossible de supprimer {} : {e}",
                self.part_path.display()
            );
        }
    }
}

impl FrameSink for Mp4Muxer {
    fn write(&mut self, frame: &ComposedFrame) -> Result<(), ConvertError> {
        if frame.width != self.width || frame.height != self.height || frame.channels != self.channels
        {
            return Err(ConvertError::SinkWrite(format!(
                "frame {}x{}x{} pour un encodeur {}x{}x{}",
                frame.width, frame.height, frame.channels, self.width, self.height, self.channels
            )));
        }
        let stdin = self
            .child
            .as_mut()
            .and_then(|c| c.stdin.as_mut())
            .ok_or_else(|| ConvertError::SinkWrite("encodeur déjà fermé".into()))?;

        if let Err(e) = stdin.write_all(&frame.data) {
            let stderr = self.kill_encoder();
            return Err(ConvertError::SinkWrite(format!(
                "écriture vers ffmpeg après {} frames : {e} {stderr}",
                self.frames_written
            )));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ConvertError> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ConvertError::SinkWrite("encodeur déjà fermé".into()))?;
        drop(child.stdin.take());

        let status = child
            .wait()
            .map_err(|e| ConvertError::SinkWrite(format!("attente de ffmpeg : {e}")))?;
        let stderr = self.take_stderr();
        if !status.success() {
            self.remove_part();
            return Err(ConvertError::SinkWrite(format!(
                "ffmpeg encoder error ({status}) : {stderr}"
            )));
        }

        std::fs::rename(&self.part_path, &self.final_path).map_err(|e| {
            self.remove_part();
            ConvertError::SinkWrite(format!(
                "renommage {} → {} : {e}",
                self.part_path.display(),
                self.final_path.display()
            ))
        })?;
        log::info!(
            "Export terminé : {} frames → {}",
            self.frames_written,
            self.final_path.display()
        );
        Ok(())
    }

    fn abort(&mut self) {
        if self.child.is_some() {
            let stderr = self.kill_encoder();
            if !stderr.is_empty() {
                log::debug!("ffmpeg stderr : {stderr}");
            }
        }
        self.remove_part();
    }
}

impl Drop for Mp4Muxer {
    fn drop(&mut self) {
        if self.child.is_some() {
            log::warn!("Encodeur abandonné sans finalize : sortie partielle supprimée");
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vs_core::frame::SourceInfo;
    use vs_core::traits::FrameSource;

    fn props() -> FrameProperties {
        FrameProperties::new(16, 8, 10.0, Some(3), 8, 4, 2, 16, 8).unwrap()
    }

    fn ffmpeg() -> bool {
        let ok = vs_source::video::ffmpeg_available();
        if !ok {
            eprintln!("ffmpeg absent, test ignoré");
        }
        ok
    }

    #[test]
    fn wrong_frame_size_is_sink_error() {
        if !ffmpeg() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let mut muxer = Mp4Muxer::new(&out, &props(), ColourMode::Grayscale, 0, "ultrafast").unwrap();
        let bad = ComposedFrame::new(4, 4, ColourMode::Grayscale);
        assert!(matches!(muxer.write(&bad), Err(ConvertError::SinkWrite(_))));
        let rgb = ComposedFrame::new(16, 8, ColourMode::Colour);
        assert!(muxer.write(&rgb).is_err());
        muxer.abort();
        assert!(!out.exists());
    }

    #[test]
    fn finalize_publishes_readable_video() {
        if !ffmpeg() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let mut muxer = Mp4Muxer::new(&out, &props(), ColourMode::Grayscale, 0, "ultrafast").unwrap();
        for v in [0u8, 128, 255] {
            let mut frame = ComposedFrame::new(16, 8, ColourMode::Grayscale);
            frame.data.fill(v);
            muxer.write(&frame).unwrap();
            assert!(!out.exists());
        }
        muxer.finalize().unwrap();
        assert_eq!(muxer.frames_written(), 3);
        assert!(out.exists());
        assert!(!part_path(&out).exists());

        let mut source = vs_source::video::VideoSource::open(&out).unwrap();
        let SourceInfo { width, height, .. } = source.info();
        assert_eq!((width, height), (16, 8));
        let mut count = 0;
        while source.next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn abort_leaves_nothing_behind() {
        if !ffmpeg() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mkv");
        let mut muxer = Mp4Muxer::new(&out, &props(), ColourMode::Colour, 0, "ultrafast").unwrap();
        muxer
            .write(&ComposedFrame::new(16, 8, ColourMode::Colour))
            .unwrap();
        muxer.abort();
        assert!(!out.exists());
        assert!(!part_path(&out).exists());
        assert!(muxer.finalize().is_err());
    }

    #[test]
    fn drop_without_finalize_cleans_up() {
        if !ffmpeg() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        {
            let _muxer = Mp4Muxer::new(&out, &props(), ColourMode::Grayscale, 0, "ultrafast").unwrap();
        }
        assert!(!out.exists());
        assert!(!part_path(&out).exists());
    }

    #[cfg(unix)]
    #[test]
    fn chatty_encoder_stderr_does_not_block_writes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let part = part_path(&out);
        // Fills the stderr pipe several times over before reading stdin.
        let mut cmd = Command::new("sh");
        cmd.args([
            "-c",
            "i=0; while [ $i -lt 4096 ]; do \
             echo 'frame= 12 fps=0.0 q=-1.0 size=0kB time=00:00:00.40 dup=0 drop=0' >&2; \
             i=$((i+1)); done; cat > \"$1\"",
            "sh",
        ])
        .arg(&part);
        let mut muxer =
            Mp4Muxer::start(cmd, &out, part.clone(), (64, 64), ColourMode::Grayscale).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let frame = ComposedFrame::new(64, 64, ColourMode::Grayscale);
            let result = (0..40)
                .try_for_each(|_| muxer.write(&frame))
                .and_then(|()| muxer.finalize());
            let _ = tx.send((result, muxer.frames_written()));
        });
        let (result, written) = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("l'encodeur s'est bloqué");
        result.unwrap();
        assert_eq!(written, 40);
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 40 * 64 * 64);
        assert!(!part.exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_encoder_reports_stderr_and_removes_part() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let part = part_path(&out);
        let mut cmd = Command::new("sh");
        cmd.args([
            "-c",
            "cat > \"$1\"; echo 'Unknown encoder libx264rgb' >&2; exit 1",
            "sh",
        ])
        .arg(&part);
        let mut muxer =
            Mp4Muxer::start(cmd, &out, part.clone(), (16, 8), ColourMode::Grayscale).unwrap();
        muxer
            .write(&ComposedFrame::new(16, 8, ColourMode::Grayscale))
            .unwrap();
        let Err(ConvertError::SinkWrite(msg)) = muxer.finalize() else {
            panic!("attendu SinkWrite");
        };
        assert!(msg.contains("Unknown encoder"), "{msg}");
        assert!(!out.exists());
        assert!(!part.exists());
    }
}
