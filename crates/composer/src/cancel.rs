use crate::error::{ComposerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared between a driver and a running operation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled { stage }` once cancellation was requested
    pub fn check(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            log::info!("Cancellation observed {stage}");
            return Err(ComposerError::Cancelled { stage });
        }
        Ok(())
    }
}
