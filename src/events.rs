use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::month::YearMonth;
use crate::types::{
    DebtId, DebtState, DebtType, EnrollmentId, EnrollmentType, PaymentId, PrepaymentId, StudentId,
};

/// all events emitted by ledger operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    EnrollmentCreated {
        enrollment_id: EnrollmentId,
        student_id: StudentId,
        enrollment_type: EnrollmentType,
        timestamp: DateTime<Utc>,
    },
    EnrollmentRemoved {
        enrollment_id: EnrollmentId,
        prepayments_removed: usize,
        payments_removed: usize,
        debts_removed: usize,
    },

    // debt events
    DebtCreated {
        debt_id: DebtId,
        enrollment_id: EnrollmentId,
        debt_type: DebtType,
        amount: Money,
        mes_aplicado: Option<YearMonth>,
    },
    DebtPaymentApplied {
        debt_id: DebtId,
        applied: Money,
        remaining: Money,
        new_state: DebtState,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        enrollment_id: EnrollmentId,
        amount: Money,
        linked_debt: Option<DebtId>,
        timestamp: DateTime<Utc>,
    },
    PrepaymentScheduled {
        prepayment_id: PrepaymentId,
        payment_id: PaymentId,
        target_month: YearMonth,
        amount: Money,
    },
    PrepaymentApplied {
        prepayment_id: PrepaymentId,
        target_month: YearMonth,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // monthly reconciliation events
    CreditConsumed {
        enrollment_id: EnrollmentId,
        mes: YearMonth,
        total_applied: Money,
        new_debt: Option<DebtId>,
        timestamp: DateTime<Utc>,
    },
    MonthSkipped {
        enrollment_id: EnrollmentId,
        mes: YearMonth,
    },
    MonthlyRunCompleted {
        mes: YearMonth,
        processed: usize,
        skipped: usize,
        failures: usize,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_take_events_drains_store() {
        let mut store = EventStore::new();
        store.emit(Event::MonthSkipped {
            enrollment_id: Uuid::new_v4(),
            mes: "2025-01".parse().unwrap(),
        });
        assert_eq!(store.events().len(), 1);

        let taken = store.take_events();
        assert_eq!(taken.len(), 1);
        assert!(store.events().is_empty());
    }
}
