//! Batch progress reporting

use parking_lot::Mutex;

/// Cumulative progress of one batch operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressToken {
    /// Files fully processed so far
    pub audio_files_completed: usize,
    /// Frames processed so far, across every file in flight
    pub frames_completed: u64,
}

/// Receiver of progress reports
///
/// Reports arrive from worker threads but never concurrently, and each is
/// greater than or equal to the previous one in both counters.
pub trait Progress: Send + Sync {
    fn report(&self, token: ProgressToken);
}

impl<F> Progress for F
where
    F: Fn(ProgressToken) + Send + Sync,
{
    fn report(&self, token: ProgressToken) {
        self(token)
    }
}

/// Accumulates counts from concurrent workers and forwards them in order
pub(crate) struct ProgressTracker<'a> {
    sink: Option<&'a dyn Progress>,
    state: Mutex<ProgressToken>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: Option<&'a dyn Progress>) -> Self {
        Self {
            sink,
            state: Mutex::new(ProgressToken::default()),
        }
    }

    pub(crate) fn add_frames(&self, frames: u64) {
        if frames == 0 {
            return;
        }
        self.update(|token| token.frames_completed += frames);
    }

    pub(crate) fn complete_file(&self) {
        self.update(|token| token.audio_files_completed += 1);
    }

    pub(crate) fn snapshot(&self) -> ProgressToken {
        *self.state.lock()
    }

    // The sink is called under the lock so reports cannot overtake each other.
    fn update(&self, apply: impl FnOnce(&mut ProgressToken)) {
        let mut state = self.state.lock();
        apply(&mut state);
        if let Some(sink) = self.sink {
            sink.report(*state);
        }
    }
}

/// Batches frame counts so a report is emitted every `granularity` frames
pub(crate) struct FrameReporter<'t, 'a> {
    tracker: &'t ProgressTracker<'a>,
    granularity: u64,
    pending: u64,
}

impl<'t, 'a> FrameReporter<'t, 'a> {
    pub(crate) fn new(tracker: &'t ProgressTracker<'a>, granularity: u64) -> Self {
        Self {
            tracker,
            granularity: granularity.max(1),
            pending: 0,
        }
    }

    pub(crate) fn add(&mut self, frames: u64) {
        self.pending += frames;
        if self.pending >= self.granularity {
            self.tracker.add_frames(std::mem::take(&mut self.pending));
        }
    }

    pub(crate) fn flush(&mut self) {
        self.tracker.add_frames(std::mem::take(&mut self.pending));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn test_reports_are_monotonic_across_threads() {
        let seen = Mutex::new(Vec::new());
        let record = |token: ProgressToken| seen.lock().unwrap().push(token);
        let sink: &dyn Progress = &record;
        let tracker = ProgressTracker::new(Some(sink));

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        tracker.add_frames(10);
                    }
                    tracker.complete_file();
                });
            }
        });

        assert_eq!(
            tracker.snapshot(),
            ProgressToken {
                audio_files_completed: 4,
                frames_completed: 2000
            }
        );

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 204);
        for pair in seen.windows(2) {
            assert!(pair[1].frames_completed >= pair[0].frames_completed);
            assert!(pair[1].audio_files_completed >= pair[0].audio_files_completed);
        }
    }

    #[test]
    fn test_frame_reporter_batches() {
        let count = Mutex::new(0usize);
        let record = |_: ProgressToken| *count.lock().unwrap() += 1;
        let sink: &dyn Progress = &record;
        let tracker = ProgressTracker::new(Some(sink));

        let mut reporter = FrameReporter::new(&tracker, 100);
        for _ in 0..25 {
            reporter.add(10);
        }
        reporter.flush();

        assert_eq!(*count.lock().unwrap(), 3);
        assert_eq!(tracker.snapshot().frames_completed, 250);
    }
}
