use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

/// Lignes de stderr conservées pour les messages d'erreur.
pub const STDERR_TAIL_LINES: usize = 32;

/// Vide le stderr d'un subprocess ffmpeg sur un thread dédié.
///
/// Un pipe non lu se remplit (~64 KiB) et bloque ffmpeg, donc stdout/stdin
/// avec lui. Seules les [`STDERR_TAIL_LINES`] dernières lignes sont gardées.
pub struct StderrTail {
    handle: Option<JoinHandle<VecDeque<String>>>,
}

impl StderrTail {
    /// Start draining `pipe`. Without a pipe the tail stays empty.
    #[must_use]
    pub fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let handle = pipe.and_then(|pipe| {
            thread::Builder::new()
                .name("vs-ffmpeg-stderr".into())
                .spawn(move || collect_tail(pipe, STDERR_TAIL_LINES))
                .map_err(|e| log::warn!("Thread de lecture stderr non démarré : {e}"))
                .ok()
        });
        Self { handle }
    }

    /// Waits for the pipe to close and returns the kept lines.
    ///
    /// Only call once the process has exited or been killed.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .map(|lines| Vec::from(lines).join("\n"))
            .unwrap_or_default()
    }
}

fn collect_tail<R: Read>(pipe: R, keep: usize) -> VecDeque<String> {
    let mut lines = VecDeque::with_capacity(keep);
    for line in BufReader::new(pipe).split(b'\n') {
        let Ok(line) = line else {
            break;
        };
        let line = String::from_utf8_lossy(&line).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        log::debug!("[ffmpeg] {line}");
        if lines.len() == keep {
            lines.pop_front();
        }
        lines.push_back(line);
    }
    lines
}
