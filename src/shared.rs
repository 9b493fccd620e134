use std::sync::{Arc, Mutex};

use crate::billing::BillingLedger;

/// thread-safe handle to one ledger
///
/// every operation runs under the lock for its whole duration, so a monthly
/// run and a concurrent payment can never interleave mid-reconciliation.
/// The version columns on enrollments and debts remain as a second line of
/// defense against read-modify-write races.
#[derive(Clone)]
pub struct SharedBillingLedger {
    inner: Arc<Mutex<BillingLedger>>,
}

impl SharedBillingLedger {
    pub fn new(ledger: BillingLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// run a closure against the locked ledger
    pub fn with<R>(&self, f: impl FnOnce(&mut BillingLedger) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl Default for SharedBillingLedger {
    fn default() -> Self {
        Self::new(BillingLedger::new())
    }
}
