//! Application-wide single-flight gate for generation requests.

use std::sync::atomic::{AtomicBool, Ordering};

/// At most one generation request may hold the gate. Excess requests are
/// rejected, not queued.
#[derive(Debug, Default)]
pub struct GenerationGate {
    busy: AtomicBool,
}

/// Held for the lifetime of one generation; releases the gate on drop
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a GenerationGate,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
