use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DermaError, Result};

/// Cooperative cancellation flag shared between the operator and a running
/// analysis. Checked between stages, never mid forward pass.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DermaError::Cancelled)
        } else {
            Ok(())
        }
    }
}
