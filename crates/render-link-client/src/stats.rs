use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the service as batches move through it.
#[derive(Debug, Default)]
pub(crate) struct ServiceStats {
    batches_sent: AtomicU64,
    commands_sent: AtomicU64,
    responses_resolved: AtomicU64,
    responses_rejected: AtomicU64,
    renders_delivered: AtomicU64,
}

impl ServiceStats {
    pub(crate) fn record_batch(&self, commands: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.commands_sent
            .fetch_add(commands as u64, Ordering::Relaxed);
    }

    pub(crate) fn inc_responses_resolved(&self) {
        self.responses_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_responses_rejected(&self) {
        self.responses_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_renders_delivered(&self) {
        self.renders_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            responses_resolved: self.responses_resolved.load(Ordering::Relaxed),
            responses_rejected: self.responses_rejected.load(Ordering::Relaxed),
            renders_delivered: self.renders_delivered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub batches_sent: u64,
    pub commands_sent: u64,
    /// Command futures resolved with a value.
    pub responses_resolved: u64,
    /// Command and render futures rejected for any reason.
    pub responses_rejected: u64,
    pub renders_delivered: u64,
}
