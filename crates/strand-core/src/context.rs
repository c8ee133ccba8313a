//! Lock-free control block shared between a running job and its supervisor.
//!
//! # Roles
//!
//! - The worker thread owns progress: it sets `total_frames`, bumps
//!   `processed_frames` and raises `completed`.
//! - The supervising thread owns control: `pause`, `resume`, `abort`.
//!
//! Each side only writes its own fields.  Everything is an independent
//! atomic; there are no locks, condition variables or queues.  The worker
//! polls the control flags once per loop iteration.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::debug;

/// Progress counters and control flags for one processing run.
#[derive(Debug, Default)]
pub struct ProcessingContext {
    processed_frames: AtomicU64,
    total_frames: AtomicU64,
    paused: AtomicBool,
    aborted: AtomicBool,
    completed: AtomicBool,
}

impl ProcessingContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Supervisor side ──────────────────────────────────────────────

    /// Request suspension.  Returns `true` if this call changed the state.
    pub fn pause(&self) -> bool {
        let changed = !self.paused.swap(true, Ordering::AcqRel);
        if changed {
            debug!(processed = self.processed_frames(), "Pause requested");
        }
        changed
    }

    /// Lift a pause.  Returns `true` if this call changed the state.
    pub fn resume(&self) -> bool {
        let changed = self.paused.swap(false, Ordering::AcqRel);
        if changed {
            debug!(processed = self.processed_frames(), "Resume requested");
        }
        changed
    }

    /// Request termination.  Returns `true` on the first call only.
    pub fn abort(&self) -> bool {
        let changed = !self.aborted.swap(true, Ordering::AcqRel);
        if changed {
            debug!(processed = self.processed_frames(), "Abort requested");
        }
        changed
    }

    // ── Readers ──────────────────────────────────────────────────────

    pub fn processed_frames(&self) -> u64 {
        self.processed_frames.load(Ordering::Acquire)
    }

    /// Best-effort estimate; 0 means unknown.
    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    // ── Worker side ──────────────────────────────────────────────────

    pub fn set_total_frames(&self, total: u64) {
        self.total_frames.store(total, Ordering::Release);
    }

    pub fn record_processed(&self, frames: u64) {
        self.processed_frames.fetch_add(frames, Ordering::AcqRel);
    }

    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn pause_resume_abort_are_idempotent() {
        let ctx = ProcessingContext::new();
        assert!(ctx.pause());
        assert!(!ctx.pause());
        assert!(ctx.is_paused());

        assert!(ctx.resume());
        assert!(!ctx.resume());
        assert!(!ctx.is_paused());

        assert!(ctx.abort());
        assert!(!ctx.abort());
        assert!(ctx.is_aborted());
        assert!(!ctx.is_completed());
    }

    #[test]
    fn resume_without_pause_is_noop() {
        let ctx = ProcessingContext::new();
        assert!(!ctx.resume());
        assert!(!ctx.is_paused());
    }

    #[test]
    fn counters_visible_across_threads() {
        let ctx = Arc::new(ProcessingContext::new());
        let worker = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || {
                ctx.set_total_frames(8);
                for _ in 0..8 {
                    ctx.record_processed(1);
                }
                ctx.mark_completed();
            })
        };
        worker.join().expect("worker thread");
        assert_eq!(ctx.processed_frames(), 8);
        assert_eq!(ctx.total_frames(), 8);
        assert!(ctx.is_completed());
    }
}
