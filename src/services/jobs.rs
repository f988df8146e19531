//! Job mutual exclusion
//!
//! Process-wide there is at most one active scan job and at most one active
//! organize job; the two kinds may run concurrently with each other.
//! Acquisition is an atomic test-and-set, and the returned guard releases
//! the slot when dropped, so a panicking job cannot wedge the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The kinds of batch jobs the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Scan,
    Organize,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Scan => "scan",
            JobKind::Organize => "organize",
        }
    }
}

/// Per-kind run flags owned by the engine
#[derive(Debug, Default)]
pub struct JobCoordinator {
    scan_active: AtomicBool,
    organize_active: AtomicBool,
}

impl JobCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Try to claim the slot for a job kind. Returns None when a job of
    /// that kind is already running.
    pub fn try_acquire(self: &Arc<Self>, kind: JobKind) -> Option<JobGuard> {
        let flag = self.flag(kind);
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(JobGuard {
                coordinator: self.clone(),
                kind,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, kind: JobKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    fn flag(&self, kind: JobKind) -> &AtomicBool {
        match kind {
            JobKind::Scan => &self.scan_active,
            JobKind::Organize => &self.organize_active,
        }
    }
}

/// Releases the job slot on drop
#[derive(Debug)]
pub struct JobGuard {
    coordinator: Arc<JobCoordinator>,
    kind: JobKind,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.coordinator
            .flag(self.kind)
            .store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_of_same_kind_fails() {
        let coordinator = JobCoordinator::new();

        let guard = coordinator.try_acquire(JobKind::Scan);
        assert!(guard.is_some());
        assert!(coordinator.try_acquire(JobKind::Scan).is_none());

        drop(guard);
        assert!(coordinator.try_acquire(JobKind::Scan).is_some());
    }

    #[test]
    fn test_kinds_are_independent() {
        let coordinator = JobCoordinator::new();

        let _scan = coordinator.try_acquire(JobKind::Scan).unwrap();
        assert!(coordinator.try_acquire(JobKind::Organize).is_some());
    }

    #[test]
    fn test_is_active_tracks_guard_lifetime() {
        let coordinator = JobCoordinator::new();
        assert!(!coordinator.is_active(JobKind::Scan));

        let guard = coordinator.try_acquire(JobKind::Scan).unwrap();
        assert!(coordinator.is_active(JobKind::Scan));

        drop(guard);
        assert!(!coordinator.is_active(JobKind::Scan));
    }
}
