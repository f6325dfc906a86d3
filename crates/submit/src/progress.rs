use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use herbarium_core::{SubmissionPhase, SubmissionProgress};

/// Default delay before a terminal progress value resets to idle.
const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(500);

/// Maps commit steps onto the single observable progress value.
///
/// The percent is clamped to be monotonic within one commit; a new commit
/// bumps the internal epoch and starts again from zero. After a terminal
/// phase the value resets to idle once a short display delay has passed,
/// so the UI can show the finished bar briefly. The reset task checks the
/// epoch before writing and never clobbers a newer commit.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<SubmissionProgress>,
    epoch: AtomicU64,
    reset_delay: Duration,
}

impl ProgressReporter {
    /// Create a reporter with the given terminal display delay.
    #[must_use]
    pub fn new(reset_delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(SubmissionProgress::default());
        Self {
            inner: Arc::new(Inner {
                tx,
                epoch: AtomicU64::new(0),
                reset_delay,
            }),
        }
    }

    /// Hand out a receiver for the UI to observe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SubmissionProgress> {
        self.inner.tx.subscribe()
    }

    /// The progress value as of now.
    #[must_use]
    pub fn current(&self) -> SubmissionProgress {
        *self.inner.tx.borrow()
    }

    /// Start a new commit: bump the epoch and drop back to zero.
    pub(crate) fn begin(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send_replace(SubmissionProgress::default());
    }

    /// Advance to a phase at the given percent. The percent never moves
    /// backwards within a commit.
    pub(crate) fn set(&self, phase: SubmissionPhase, percent: u8) {
        self.inner.tx.send_modify(|progress| {
            progress.phase = phase;
            progress.percent = progress.percent.max(percent.min(100));
        });
    }

    /// Switch phase while keeping the current percent.
    pub(crate) fn set_phase(&self, phase: SubmissionPhase) {
        self.inner.tx.send_modify(|progress| progress.phase = phase);
    }

    /// Enter a terminal phase and schedule the idle reset.
    pub(crate) fn finish(&self, phase: SubmissionPhase) {
        let percent = if phase == SubmissionPhase::Done {
            100
        } else {
            self.current().percent
        };
        self.set(phase, percent);
        self.schedule_reset();
    }

    fn schedule_reset(&self) {
        // Without a runtime (plain sync contexts) the value simply stays
        // terminal until the next commit begins.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let epoch = inner.epoch.load(Ordering::SeqCst);
        handle.spawn(async move {
            tokio::time::sleep(inner.reset_delay).await;
            if inner.epoch.load(Ordering::SeqCst) == epoch {
                inner.tx.send_replace(SubmissionProgress::default());
            }
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_DELAY)
    }
}
