use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vs_core::progress::PipelineProgress;

/// Période de log de la progression.
pub const MONITOR_PERIOD: Duration = Duration::from_millis(1000);

/// Thread observateur : lit les compteurs atomiques et loggue la progression.
///
/// S'arrête sur [`ProgressMonitor::stop`] ou au drop.
pub struct ProgressMonitor {
    stop_tx: Option<flume::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(progress: Arc<PipelineProgress>, period: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("vs-monitor".into())
            .spawn(move || {
                while let Err(flume::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(period) {
                    log::info!("{}", progress_line(&progress));
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the thread and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("Le thread de progression a paniqué");
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// `Progress: n/total (p%)`, ou `Progress: n frames` si le total est inconnu.
#[must_use]
pub fn progress_line(progress: &PipelineProgress) -> String {
    let written = progress.written();
    match progress.total() {
        Some(total) => format!(
            "Progress: {written}/{total} ({:.1}%)",
            progress.percentage()
        ),
        None => format!("Progress: {written} frames"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shows_counts_and_percentage() {
        let progress = PipelineProgress::new();
        progress.set_total(Some(4));
        progress.inc_written();
        assert_eq!(progress_line(&progress), "Progress: 1/4 (25.0%)");

        let unknown = PipelineProgress::new();
        unknown.inc_written();
        unknown.inc_written();
        assert_eq!(progress_line(&unknown), "Progress: 2 frames");
    }

    #[test]
    fn stop_returns_promptly() {
        let progress = Arc::new(PipelineProgress::new());
        let monitor = ProgressMonitor::spawn(progress, Duration::from_secs(3600)).unwrap();
        let started = std::time::Instant::now();
        monitor.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
