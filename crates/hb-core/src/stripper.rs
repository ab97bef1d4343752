//! Credential stripping hook
//!
//! The cookie-block paths of the engine ask the host to discard stored
//! credentials for an origin. Implementations must be idempotent and accept
//! origins that have nothing stored.

use std::collections::BTreeSet;

use log::warn;
use parking_lot::Mutex;

pub trait CredentialStripper: Send + Sync {
    fn clobber(&self, origin: &str);
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStripper;

impl CredentialStripper for NoopStripper {
    fn clobber(&self, _origin: &str) {}
}

/// Remembers every origin it was asked to clobber, in call order.
#[derive(Debug, Default)]
pub struct RecordingStripper {
    calls: Mutex<Vec<String>>,
}

impl RecordingStripper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn was_clobbered(&self, origin: &str) -> bool {
        self.calls.lock().iter().any(|o| o == origin)
    }
}

impl CredentialStripper for RecordingStripper {
    fn clobber(&self, origin: &str) {
        self.calls.lock().push(origin.to_string());
    }
}

/// Most origins a [`ClobberQueue`] holds before it drops new ones.
pub const MAX_PENDING_CLOBBERS: usize = 4096;

/// Origins waiting for the host to discard their credentials.
///
/// Repeated requests to the same origin queue it once. The queue is capped at
/// [`MAX_PENDING_CLOBBERS`] for hosts that drain it rarely.
#[derive(Debug, Default)]
pub struct ClobberQueue {
    pending: Mutex<BTreeSet<String>>,
}

impl ClobberQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Drain the queue, sorted by origin.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock()).into_iter().collect()
    }
}

impl CredentialStripper for ClobberQueue {
    fn clobber(&self, origin: &str) {
        let mut pending = self.pending.lock();
        if pending.contains(origin) {
            return;
        }
        if pending.len() >= MAX_PENDING_CLOBBERS {
            warn!("Clobber queue full, dropping '{}'", origin);
            return;
        }
        pending.insert(origin.to_string());
    }
}
