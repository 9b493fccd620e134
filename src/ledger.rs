use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::month::YearMonth;
use crate::records::Debt;
use crate::store::LedgerStore;
use crate::types::{DebtId, DebtState, DebtType, EnrollmentId};

/// specification for a new debt
#[derive(Debug, Clone)]
pub struct NewDebt {
    pub enrollment_id: EnrollmentId,
    pub debt_type: DebtType,
    pub concept: String,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub mes_aplicado: Option<YearMonth>,
}

/// owns debt records: creation, pending queries, and the single choke point
/// through which all money application flows
pub struct DebtLedger<'a> {
    store: &'a mut LedgerStore,
    events: &'a mut EventStore,
}

impl<'a> DebtLedger<'a> {
    pub fn new(store: &'a mut LedgerStore, events: &'a mut EventStore) -> Self {
        Self { store, events }
    }

    /// insert a `Pendiente` debt; no side effects beyond the insert
    pub fn create_debt(&mut self, spec: NewDebt, now: DateTime<Utc>) -> Result<Debt> {
        if !spec.amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: spec.amount,
            });
        }
        self.store.enrollment(spec.enrollment_id)?;

        let debt = Debt {
            id: Uuid::new_v4(),
            enrollment_id: spec.enrollment_id,
            debt_type: spec.debt_type,
            concept: spec.concept,
            amount: spec.amount,
            due_date: spec.due_date,
            mes_aplicado: spec.mes_aplicado,
            state: DebtState::Pendiente,
            active: true,
            created_at: now,
            version: 0,
        };

        self.events.emit(Event::DebtCreated {
            debt_id: debt.id,
            enrollment_id: debt.enrollment_id,
            debt_type: debt.debt_type,
            amount: debt.amount,
            mes_aplicado: debt.mes_aplicado,
        });

        self.store.insert_debt(debt.clone());
        self.refresh_enrollment_saldo(debt.enrollment_id)?;
        Ok(debt)
    }

    pub fn pending_debts(&self, enrollment_id: EnrollmentId) -> Vec<Debt> {
        self.store.pending_debts(enrollment_id)
    }

    pub fn find_debt_by_enrollment_and_month(
        &self,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
    ) -> Option<Debt> {
        self.store.find_debt_by_enrollment_and_month(enrollment_id, mes)
    }

    /// subtract `amount_applied` from the debt's outstanding amount
    ///
    /// fully covered debts become `Pagado` with amount zero, anything else
    /// `PagadoParcial` with the remainder. Settled and voided debts refuse
    /// further money, which is what keeps the state machine one-directional.
    pub fn apply_to_debt(
        &mut self,
        debt_id: DebtId,
        amount_applied: Money,
        now: DateTime<Utc>,
    ) -> Result<Debt> {
        if !amount_applied.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: amount_applied,
            });
        }

        let mut debt = self.store.debt(debt_id)?.clone();
        if debt.state.is_terminal() {
            return Err(LedgerError::DebtNotPayable {
                id: debt.id,
                state: debt.state,
            });
        }

        let remainder = debt.amount - amount_applied;
        let next_state = if remainder.is_positive() {
            DebtState::PagadoParcial
        } else {
            DebtState::Pagado
        };
        debug_assert!(debt.state.can_transition_to(next_state));

        debt.amount = remainder.max(Money::ZERO);
        debt.state = next_state;
        self.store.put_debt(debt)?;
        // hand back the stored row so its version matches the table
        let debt = self.store.debt(debt_id)?.clone();

        self.events.emit(Event::DebtPaymentApplied {
            debt_id: debt.id,
            applied: amount_applied,
            remaining: debt.amount,
            new_state: debt.state,
            timestamp: now,
        });

        self.refresh_enrollment_saldo(debt.enrollment_id)?;
        Ok(debt)
    }

    /// saldo is derived, never hand-maintained: every debt mutation leaves
    /// it equal to the sum of what the open debts still carry
    fn refresh_enrollment_saldo(&mut self, enrollment_id: EnrollmentId) -> Result<()> {
        let saldo: Money = self
            .store
            .debts_by_enrollment(enrollment_id)
            .iter()
            .filter(|d| d.is_open())
            .map(|d| d.amount)
            .sum();
        let mut enrollment = self.store.enrollment(enrollment_id)?.clone();
        enrollment.saldo = saldo;
        self.store.put_enrollment(enrollment)
    }
}
