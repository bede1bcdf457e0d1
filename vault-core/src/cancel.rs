use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::remote::RemoteError;

/// Shared abort flag handed to every remote call of one operation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), RemoteError> {
        if self.is_cancelled() {
            Err(RemoteError::Cancelled)
        } else {
            Ok(())
        }
    }
}
