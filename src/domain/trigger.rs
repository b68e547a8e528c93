use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Generating,
}

/// `idle -> generating -> idle`. A second trigger while generating is refused.
#[derive(Debug, Clone, Default)]
pub struct TriggerGate {
    generating: Arc<AtomicBool>,
}

impl TriggerGate {
    pub fn state(&self) -> TriggerState {
        if self.generating.load(Ordering::SeqCst) {
            TriggerState::Generating
        } else {
            TriggerState::Idle
        }
    }

    /// Returns `None` while a generation is in flight.
    pub fn try_begin(&self) -> Option<TriggerGuard> {
        self.generating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| TriggerGuard {
                generating: Arc::clone(&self.generating),
            })
    }
}

/// Returns the gate to idle when dropped, whatever the outcome.
#[derive(Debug)]
pub struct TriggerGuard {
    generating: Arc<AtomicBool>,
}

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        self.generating.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_trigger_is_refused_until_first_completes() {
        let gate = TriggerGate::default();
        assert_eq!(gate.state(), TriggerState::Idle);

        let guard = gate.try_begin().expect("first trigger");
        assert_eq!(gate.state(), TriggerState::Generating);
        assert!(gate.try_begin().is_none());

        drop(guard);
        assert_eq!(gate.state(), TriggerState::Idle);
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn clones_share_state() {
        let gate = TriggerGate::default();
        let other = gate.clone();
        let _guard = gate.try_begin().expect("trigger");
        assert_eq!(other.state(), TriggerState::Generating);
    }
}
