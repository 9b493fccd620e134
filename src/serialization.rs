use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::pricing::PriceBook;
use crate::store::LedgerStore;

/// serializable snapshot of the whole ledger: every table plus the price
/// catalog the billing decisions were made against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub store: LedgerStore,
    pub prices: PriceBook,
}

impl LedgerSnapshot {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Snapshot {
            message: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LedgerError::Snapshot {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::enrollment::{EnrollmentLifecycle, NewEnrollment};
    use crate::events::EventStore;
    use crate::types::EnrollmentType;
    use chrono::Utc;
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use uuid::Uuid;

    #[test]
    fn test_snapshot_round_trip() {
        let mut store = LedgerStore::new();
        let mut events = EventStore::new();
        let prices = PriceBook::new();
        let time = SafeTimeProvider::new(TimeSource::Test(Utc::now()));

        let enrollment = EnrollmentLifecycle::new(&mut store, &mut events)
            .create(
                NewEnrollment {
                    student_id: Uuid::new_v4(),
                    campus_id: Uuid::new_v4(),
                    plan_id: Some(Uuid::new_v4()),
                    enrollment_type: EnrollmentType::Plan,
                    initial_payment: None,
                },
                &prices,
                &time,
            )
            .unwrap();

        let snapshot = LedgerSnapshot { store, prices };
        let json = snapshot.to_json_pretty().unwrap();
        let restored = LedgerSnapshot::from_json(&json).unwrap();

        let back = restored.store.enrollment(enrollment.id).unwrap();
        assert_eq!(back.saldo, Money::from_major(440));
        assert_eq!(restored.store.debts_by_enrollment(enrollment.id).len(), 3);
    }

    #[test]
    fn test_malformed_json_is_a_snapshot_error() {
        let err = LedgerSnapshot::from_json("{not json").unwrap_err();
        assert!(matches!(err, LedgerError::Snapshot { .. }));
    }
}
