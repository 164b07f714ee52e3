use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Étapes d'un run de conversion.
///
/// `Failed` est atteignable depuis tout état non terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Loading = 1,
    CacheBuilding = 2,
    Converting = 3,
    Writing = 4,
    Done = 5,
    Failed = 6,
}

impl PipelineState {
    /// `true` for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Loading,
            2 => Self::CacheBuilding,
            3 => Self::Converting,
            4 => Self::Writing,
            5 => Self::Done,
            _ => Self::Failed,
        }
    }
}

/// État partagé entre les étages du pipeline et un observateur (UI, logs).
///
/// Tous les champs sont atomiques — zero-lock, `Send + Sync`. Les workers
/// écrivent, le moniteur lit.
///
/// # Example
/// ```
/// use vs_core::progress::{PipelineProgress, PipelineState};
/// let progress = PipelineProgress::new();
/// progress.set_total(Some(10));
/// progress.inc_written();
/// assert_eq!(progress.written(), 1);
/// assert_eq!(progress.state(), PipelineState::Idle);
/// assert!((progress.percentage() - 10.0).abs() < 1e-9);
/// ```
#[derive(Debug, Default)]
pub struct PipelineProgress {
    read: AtomicU64,
    converted: AtomicU64,
    written: AtomicU64,
    /// 0 = inconnu.
    total: AtomicU64,
    state: AtomicU8,
    cancelled: AtomicBool,
}

impl PipelineProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared frame count, if any.
    pub fn set_total(&self, total: Option<u64>) {
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
    }

    #[must_use]
    pub fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    #[inline]
    pub fn inc_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_converted(&self) {
        self.converted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn converted(&self) -> u64 {
        self.converted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Written / total in percent, 0.0 when the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        match self.total() {
            Some(total) => self.written() as f64 / total as f64 * 100.0,
            None => 0.0,
        }
    }

    pub fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Demande l'arrêt du run à la prochaine frontière de frame.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_are_visible_across_threads() {
        let progress = Arc::new(PipelineProgress::new());
        let worker = {
            let progress = Arc::clone(&progress);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    progress.inc_converted();
                }
            })
        };
        worker.join().unwrap();
        assert_eq!(progress.converted(), 1000);
    }

    #[test]
    fn state_round_trips_through_atomic() {
        let progress = PipelineProgress::new();
        for state in [
            PipelineState::Loading,
            PipelineState::CacheBuilding,
            PipelineState::Converting,
            PipelineState::Writing,
            PipelineState::Done,
            PipelineState::Failed,
        ] {
            progress.set_state(state);
            assert_eq!(progress.state(), state);
        }
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Writing.is_terminal());
    }

    #[test]
    fn unknown_total_reports_zero_percent() {
        let progress = PipelineProgress::new();
        progress.inc_written();
        assert_eq!(progress.total(), None);
        assert!(progress.percentage().abs() < f64::EPSILON);
    }
}
