//! Cooperative cancellation.
//!
//! The executing task owns a [`CancelToken`] and hands it to the evaluator,
//! which polls [`CancelToken::is_cancelled`] at safe points. The job record
//! only keeps a [`CancelHandle`], a weak reference to the same flag: once the
//! task finishes and drops its token, the handle becomes inert.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Creates a handle that can request cancellation without keeping the
    /// token alive.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::downgrade(&self.flag),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Weak<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation. Returns false when the owning task has already
    /// finished and dropped its token.
    pub fn cancel(&self) -> bool {
        match self.flag.upgrade() {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.flag.strong_count() > 0
    }
}
