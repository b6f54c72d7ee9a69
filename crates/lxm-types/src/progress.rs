/// Receiver of incremental progress from long-running run phases.
pub trait ProgressSink {
    /// A new phase starts with `total` work items.
    fn phase(&mut self, name: &str, total: usize);

    /// `done` items of the current phase are complete.
    fn advance(&mut self, done: usize);
}

/// Discards all progress.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn phase(&mut self, _name: &str, _total: usize) {}

    fn advance(&mut self, _done: usize) {}
}

/// Emits progress as `tracing` events, one per `every` items.
#[derive(Debug)]
pub struct TracingProgress {
    phase: String,
    total: usize,
    every: usize,
}

impl TracingProgress {
    pub fn new(every: usize) -> Self {
        Self {
            phase: String::new(),
            total: 0,
            every: every.max(1),
        }
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressSink for TracingProgress {
    fn phase(&mut self, name: &str, total: usize) {
        self.phase = name.to_string();
        self.total = total;
        tracing::info!(phase = name, total, "phase started");
    }

    fn advance(&mut self, done: usize) {
        if done % self.every == 0 || done == self.total {
            tracing::debug!(phase = %self.phase, done, total = self.total, "progress");
        }
    }
}
