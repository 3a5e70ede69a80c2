use crate::broadcast::{ProgressBroadcaster, ProgressEvent};

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for tests and one-shot CLI runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

impl ProgressReporter for ProgressBroadcaster {
    fn report(&self, event: ProgressEvent) {
        self.send(event);
    }
}
