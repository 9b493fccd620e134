use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::DebtLedger;
use crate::month::YearMonth;
use crate::records::{Payment, PrepaymentDetail};
use crate::store::LedgerStore;
use crate::types::{DebtId, EnrollmentId, PaymentConcept, PaymentId, PrepaymentState};

/// one future month's share of a prepayment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthAllocation {
    pub mes: YearMonth,
    pub amount: Money,
}

/// specification for a new payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub enrollment_id: EnrollmentId,
    pub concept: PaymentConcept,
    pub method: String,
    pub amount: Money,
    pub receipt_number: Option<String>,
    /// explicit debt to settle; otherwise matched by concept
    pub debt_id: Option<DebtId>,
    pub es_adelantado: bool,
    /// required when `es_adelantado`; must sum to `amount`
    pub allocations: Vec<MonthAllocation>,
}

/// administrative correction of an already-recorded payment
#[derive(Debug, Clone, Default)]
pub struct PaymentUpdate {
    pub method: Option<String>,
    pub receipt_number: Option<String>,
}

/// owns payment records; links payments to pending debts or fans a
/// prepayment out into scheduled credit
pub struct PaymentRecorder<'a> {
    store: &'a mut LedgerStore,
    events: &'a mut EventStore,
}

impl<'a> PaymentRecorder<'a> {
    pub fn new(store: &'a mut LedgerStore, events: &'a mut EventStore) -> Self {
        Self { store, events }
    }

    /// record a payment
    ///
    /// everything fallible runs before the first write, so a rejected
    /// payment leaves no partial state behind. Prepayment allocations are
    /// strictly deferred: they become `PendienteAplicacion` details and are
    /// only netted against debts by the monthly consumption engine.
    pub fn record(&mut self, spec: NewPayment, time: &SafeTimeProvider) -> Result<Payment> {
        if !spec.amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: spec.amount,
            });
        }

        let enrollment = self.store.enrollment(spec.enrollment_id)?.clone();

        self.check_scheme_exclusivity(&spec)?;

        if spec.es_adelantado {
            if spec.allocations.is_empty() {
                return Err(LedgerError::EmptyAllocations);
            }
            for allocation in &spec.allocations {
                if !allocation.amount.is_positive() {
                    return Err(LedgerError::InvalidAmount {
                        amount: allocation.amount,
                    });
                }
            }
            let allocated: Money = spec.allocations.iter().map(|a| a.amount).sum();
            if allocated != spec.amount {
                return Err(LedgerError::AllocationMismatch {
                    expected: spec.amount,
                    allocated,
                });
            }
            if !enrollment.is_billable_plan() {
                return Err(LedgerError::PrepaymentNotAllowed {
                    enrollment_id: enrollment.id,
                });
            }
        }

        let debt_id = self.resolve_debt_link(&spec)?;

        // all validation passed; mutate
        let now = time.now();

        if let Some(debt_id) = debt_id {
            DebtLedger::new(self.store, self.events).apply_to_debt(debt_id, spec.amount, now)?;
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            enrollment_id: spec.enrollment_id,
            concept: spec.concept,
            method: spec.method,
            amount: spec.amount,
            receipt_number: spec.receipt_number,
            debt_id,
            es_adelantado: spec.es_adelantado,
            paid_at: now,
        };
        self.store.insert_payment(payment.clone());

        self.events.emit(Event::PaymentRecorded {
            payment_id: payment.id,
            enrollment_id: payment.enrollment_id,
            amount: payment.amount,
            linked_debt: debt_id,
            timestamp: now,
        });

        if spec.es_adelantado {
            let mut updated = self.store.enrollment(spec.enrollment_id)?.clone();
            updated.saldo_favor += payment.amount;
            self.store.put_enrollment(updated)?;

            for allocation in &spec.allocations {
                let detail = PrepaymentDetail {
                    id: Uuid::new_v4(),
                    payment_id: payment.id,
                    enrollment_id: payment.enrollment_id,
                    target_month: allocation.mes,
                    amount: allocation.amount,
                    state: PrepaymentState::PendienteAplicacion,
                    applied_at: None,
                    active: true,
                };
                self.events.emit(Event::PrepaymentScheduled {
                    prepayment_id: detail.id,
                    payment_id: payment.id,
                    target_month: detail.target_month,
                    amount: detail.amount,
                });
                self.store.insert_prepayment(detail);
            }

            tracing::info!(
                payment_id = %payment.id,
                enrollment_id = %payment.enrollment_id,
                months = spec.allocations.len(),
                "prepayment scheduled for future months"
            );
        }

        Ok(payment)
    }

    /// months covered by one prepayment, earliest first
    pub fn prepayment_details(&self, payment_id: PaymentId) -> Result<Vec<PrepaymentDetail>> {
        self.store.payment(payment_id)?;
        Ok(self.store.prepayments_by_payment(payment_id))
    }

    /// administrative correction; amounts and linkage are immutable
    pub fn update_payment(&mut self, id: PaymentId, changes: PaymentUpdate) -> Result<Payment> {
        let payment = self.store.payment_mut(id)?;
        if let Some(method) = changes.method {
            payment.method = method;
        }
        if let Some(receipt) = changes.receipt_number {
            payment.receipt_number = Some(receipt);
        }
        Ok(payment.clone())
    }

    /// monthly and prepaid tuition are mutually exclusive per enrollment
    fn check_scheme_exclusivity(&self, spec: &NewPayment) -> Result<()> {
        let existing = self.store.payments_by_enrollment(spec.enrollment_id);

        if spec.concept == PaymentConcept::Mensualidad
            && existing
                .iter()
                .any(|p| p.concept == PaymentConcept::MensualidadAdelantada)
        {
            return Err(LedgerError::PaymentSchemeConflict {
                enrollment_id: spec.enrollment_id,
            });
        }

        if spec.es_adelantado
            && existing
                .iter()
                .any(|p| p.concept == PaymentConcept::Mensualidad)
        {
            return Err(LedgerError::PaymentSchemeConflict {
                enrollment_id: spec.enrollment_id,
            });
        }

        Ok(())
    }

    /// explicit debt id wins; otherwise the first pending debt whose type
    /// matches the payment concept. Unknown concepts are never auto-linked.
    fn resolve_debt_link(&self, spec: &NewPayment) -> Result<Option<DebtId>> {
        if let Some(debt_id) = spec.debt_id {
            let debt = self.store.debt(debt_id)?;
            if debt.state.is_terminal() {
                return Err(LedgerError::DebtNotPayable {
                    id: debt.id,
                    state: debt.state,
                });
            }
            return Ok(Some(debt_id));
        }

        if spec.es_adelantado {
            return Ok(None);
        }

        let Some(target_type) = spec.concept.debt_type() else {
            return Ok(None);
        };

        Ok(self
            .store
            .pending_debts(spec.enrollment_id)
            .into_iter()
            .find(|d| d.debt_type == target_type)
            .map(|d| d.id))
    }
}
