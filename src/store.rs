use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{LedgerError, Result};
use crate::month::YearMonth;
use crate::records::{Consumo, Debt, Enrollment, Payment, PrepaymentDetail};
use crate::types::{DebtId, DebtState, DebtType, EnrollmentId, PaymentId, StudentId};

/// uuid-keyed table that remembers insertion order
///
/// queries feeding the "apply in listed order" rules iterate this order, so
/// reconciliation is deterministic without a database sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table<T> {
    rows: HashMap<Uuid, T>,
    order: Vec<Uuid>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    pub fn insert(&mut self, id: Uuid, row: T) {
        if self.rows.insert(id, row).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let removed = self.rows.remove(&id);
        if removed.is_some() {
            self.order.retain(|&o| o != id);
        }
        removed
    }

    /// rows in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// dependent record ids collected before removing an enrollment
///
/// deletion must run leaves-first to respect the foreign-key chain:
/// prepayment details reference payments, payments reference debts and the
/// enrollment, debts reference the enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    pub enrollment_id: EnrollmentId,
    pub prepayments: Vec<Uuid>,
    pub payments: Vec<Uuid>,
    pub debts: Vec<Uuid>,
}

/// in-memory ledger tables and their query surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStore {
    enrollments: Table<Enrollment>,
    debts: Table<Debt>,
    payments: Table<Payment>,
    prepayments: Table<PrepaymentDetail>,
    consumos: Table<Consumo>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- enrollments ---

    pub fn insert_enrollment(&mut self, enrollment: Enrollment) {
        self.enrollments.insert(enrollment.id, enrollment);
    }

    pub fn enrollment(&self, id: EnrollmentId) -> Result<&Enrollment> {
        self.enrollments
            .get(id)
            .ok_or(LedgerError::EnrollmentNotFound { id })
    }

    pub fn enrollments(&self) -> impl Iterator<Item = &Enrollment> {
        self.enrollments.iter()
    }

    /// replace an enrollment row, rejecting stale versions
    pub fn put_enrollment(&mut self, mut updated: Enrollment) -> Result<()> {
        let current = self.enrollment(updated.id)?;
        if current.version != updated.version {
            return Err(LedgerError::StaleWrite {
                entity: "enrollment",
                id: updated.id,
                expected: current.version,
                found: updated.version,
            });
        }
        updated.version += 1;
        self.enrollments.insert(updated.id, updated);
        Ok(())
    }

    pub fn active_plan_enrollment_for_student(&self, student_id: StudentId) -> Option<&Enrollment> {
        self.enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.is_billable_plan())
    }

    /// ids of enrollments eligible for monthly billing, in insertion order
    pub fn billable_plan_enrollment_ids(&self) -> Vec<EnrollmentId> {
        self.enrollments
            .iter()
            .filter(|e| e.is_billable_plan())
            .map(|e| e.id)
            .collect()
    }

    // --- debts ---

    pub fn insert_debt(&mut self, debt: Debt) {
        self.debts.insert(debt.id, debt);
    }

    pub fn debt(&self, id: DebtId) -> Result<&Debt> {
        self.debts.get(id).ok_or(LedgerError::DebtNotFound { id })
    }

    /// replace a debt row, rejecting stale versions
    pub fn put_debt(&mut self, mut updated: Debt) -> Result<()> {
        let current = self.debt(updated.id)?;
        if current.version != updated.version {
            return Err(LedgerError::StaleWrite {
                entity: "debt",
                id: updated.id,
                expected: current.version,
                found: updated.version,
            });
        }
        updated.version += 1;
        self.debts.insert(updated.id, updated);
        Ok(())
    }

    pub fn debts_by_enrollment(&self, enrollment_id: EnrollmentId) -> Vec<Debt> {
        self.debts
            .iter()
            .filter(|d| d.enrollment_id == enrollment_id)
            .cloned()
            .collect()
    }

    /// active debts still in `Pendiente`; partially paid debts are
    /// intentionally excluded so a new payment never auto-matches them
    pub fn pending_debts(&self, enrollment_id: EnrollmentId) -> Vec<Debt> {
        self.debts
            .iter()
            .filter(|d| {
                d.enrollment_id == enrollment_id && d.active && d.state == DebtState::Pendiente
            })
            .cloned()
            .collect()
    }

    /// active tuition debts tagged with the month, any state
    pub fn monthly_debts_for(&self, enrollment_id: EnrollmentId, mes: YearMonth) -> Vec<Debt> {
        self.debts
            .iter()
            .filter(|d| {
                d.enrollment_id == enrollment_id
                    && d.active
                    && d.debt_type == DebtType::Mensualidad
                    && d.mes_aplicado == Some(mes)
            })
            .cloned()
            .collect()
    }

    /// first open tuition debt for the month
    pub fn find_debt_by_enrollment_and_month(
        &self,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
    ) -> Option<Debt> {
        self.debts
            .iter()
            .find(|d| {
                d.enrollment_id == enrollment_id
                    && d.is_open()
                    && d.debt_type == DebtType::Mensualidad
                    && d.mes_aplicado == Some(mes)
            })
            .cloned()
    }

    // --- payments ---

    pub fn insert_payment(&mut self, payment: Payment) {
        self.payments.insert(payment.id, payment);
    }

    pub fn payment(&self, id: PaymentId) -> Result<&Payment> {
        self.payments
            .get(id)
            .ok_or(LedgerError::PaymentNotFound { id })
    }

    pub fn payment_mut(&mut self, id: PaymentId) -> Result<&mut Payment> {
        self.payments
            .get_mut(id)
            .ok_or(LedgerError::PaymentNotFound { id })
    }

    pub fn payments_by_enrollment(&self, enrollment_id: EnrollmentId) -> Vec<Payment> {
        self.payments
            .iter()
            .filter(|p| p.enrollment_id == enrollment_id)
            .cloned()
            .collect()
    }

    // --- prepayment details ---

    pub fn insert_prepayment(&mut self, detail: PrepaymentDetail) {
        self.prepayments.insert(detail.id, detail);
    }

    pub fn prepayment_mut(&mut self, id: Uuid) -> Option<&mut PrepaymentDetail> {
        self.prepayments.get_mut(id)
    }

    /// still-scheduled credit earmarked for the month
    pub fn scheduled_prepayments(
        &self,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
    ) -> Vec<PrepaymentDetail> {
        self.prepayments
            .iter()
            .filter(|p| {
                p.enrollment_id == enrollment_id && p.target_month == mes && p.is_scheduled()
            })
            .cloned()
            .collect()
    }

    pub fn prepayments_by_enrollment(&self, enrollment_id: EnrollmentId) -> Vec<PrepaymentDetail> {
        self.prepayments
            .iter()
            .filter(|p| p.enrollment_id == enrollment_id && p.active)
            .cloned()
            .collect()
    }

    /// details of one prepayment, earliest month first
    pub fn prepayments_by_payment(&self, payment_id: PaymentId) -> Vec<PrepaymentDetail> {
        let mut details: Vec<PrepaymentDetail> = self
            .prepayments
            .iter()
            .filter(|p| p.payment_id == payment_id)
            .cloned()
            .collect();
        details.sort_by_key(|p| p.target_month);
        details
    }

    // --- consumos ---

    pub fn insert_consumo(&mut self, consumo: Consumo) {
        self.consumos.insert(consumo.id, consumo);
    }

    pub fn consumo_for(&self, enrollment_id: EnrollmentId, mes: YearMonth) -> Option<&Consumo> {
        self.consumos
            .iter()
            .find(|c| c.enrollment_id == enrollment_id && c.mes == mes)
    }

    pub fn consumos_by_enrollment(&self, enrollment_id: EnrollmentId) -> Vec<Consumo> {
        self.consumos
            .iter()
            .filter(|c| c.enrollment_id == enrollment_id)
            .cloned()
            .collect()
    }

    // --- removal ---

    /// collect everything hanging off an enrollment before deleting any of it
    pub fn enrollment_deletion_plan(&self, enrollment_id: EnrollmentId) -> Result<DeletionPlan> {
        self.enrollment(enrollment_id)?;
        Ok(DeletionPlan {
            enrollment_id,
            prepayments: self
                .prepayments
                .iter()
                .filter(|p| p.enrollment_id == enrollment_id)
                .map(|p| p.id)
                .collect(),
            payments: self
                .payments
                .iter()
                .filter(|p| p.enrollment_id == enrollment_id)
                .map(|p| p.id)
                .collect(),
            debts: self
                .debts
                .iter()
                .filter(|d| d.enrollment_id == enrollment_id)
                .map(|d| d.id)
                .collect(),
        })
    }

    /// delete leaves-first: prepayment details, payments, debts, consumos,
    /// then the enrollment itself
    pub fn execute_deletion(&mut self, plan: &DeletionPlan) -> Result<()> {
        for id in &plan.prepayments {
            self.prepayments.remove(*id);
        }
        for id in &plan.payments {
            self.payments.remove(*id);
        }
        for id in &plan.debts {
            self.debts.remove(*id);
        }
        let consumo_ids: Vec<Uuid> = self
            .consumos
            .iter()
            .filter(|c| c.enrollment_id == plan.enrollment_id)
            .map(|c| c.id)
            .collect();
        for id in consumo_ids {
            self.consumos.remove(id);
        }
        self.enrollments
            .remove(plan.enrollment_id)
            .ok_or(LedgerError::EnrollmentNotFound {
                id: plan.enrollment_id,
            })?;
        Ok(())
    }
}
