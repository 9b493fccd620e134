use hourglass_rs::SafeTimeProvider;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::{DebtLedger, NewDebt};
use crate::month::YearMonth;
use crate::payments::{NewPayment, PaymentRecorder};
use crate::pricing::PriceBook;
use crate::records::Enrollment;
use crate::store::{DeletionPlan, LedgerStore};
use crate::types::{CampusId, DebtType, EnrollmentId, EnrollmentType, PaymentConcept, PlanId, StudentId};

/// money handed over at the desk while enrolling; settled against the
/// inscription debt
#[derive(Debug, Clone)]
pub struct InitialPayment {
    pub amount: Money,
    pub method: String,
    pub receipt_number: Option<String>,
}

/// specification for a new enrollment
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub campus_id: CampusId,
    pub plan_id: Option<PlanId>,
    pub enrollment_type: EnrollmentType,
    pub initial_payment: Option<InitialPayment>,
}

/// administrative field changes for an enrollment
#[derive(Debug, Clone, Default)]
pub struct EnrollmentUpdate {
    pub campus_id: Option<CampusId>,
    pub plan_id: Option<PlanId>,
    pub active: Option<bool>,
}

/// owns enrollment records: creation with the standard debt set, field
/// updates, activation, and cascading removal
pub struct EnrollmentLifecycle<'a> {
    store: &'a mut LedgerStore,
    events: &'a mut EventStore,
}

impl<'a> EnrollmentLifecycle<'a> {
    pub fn new(store: &'a mut LedgerStore, events: &'a mut EventStore) -> Self {
        Self { store, events }
    }

    /// create an enrollment
    ///
    /// a PLAN enrollment bills its standard debt set up front: inscription
    /// and materials due immediately, the first month's tuition due on the
    /// 20th. A student carries at most one active PLAN enrollment. PRODUCT
    /// enrollments generate no debts at all.
    pub fn create(
        &mut self,
        spec: NewEnrollment,
        prices: &PriceBook,
        time: &SafeTimeProvider,
    ) -> Result<Enrollment> {
        if spec.enrollment_type == EnrollmentType::Plan
            && self
                .store
                .active_plan_enrollment_for_student(spec.student_id)
                .is_some()
        {
            return Err(LedgerError::DuplicatePlanEnrollment {
                student_id: spec.student_id,
            });
        }

        let now = time.now();
        let enrollment = Enrollment::new(
            spec.student_id,
            spec.campus_id,
            spec.plan_id,
            spec.enrollment_type,
            now,
        );
        let enrollment_id = enrollment.id;
        self.store.insert_enrollment(enrollment);

        let mut inscription_debt = None;
        if spec.enrollment_type == EnrollmentType::Plan {
            let schedule = prices.resolve(spec.campus_id, spec.plan_id).schedule;
            let today = now.date_naive();
            let mes = YearMonth::from_datetime(now);

            let mut ledger = DebtLedger::new(self.store, self.events);
            let debt = ledger.create_debt(
                NewDebt {
                    enrollment_id,
                    debt_type: DebtType::Inscripcion,
                    concept: "Pago por Inscripción".to_string(),
                    amount: schedule.enrollment_fee,
                    due_date: today,
                    mes_aplicado: None,
                },
                now,
            )?;
            inscription_debt = Some(debt.id);
            ledger.create_debt(
                NewDebt {
                    enrollment_id,
                    debt_type: DebtType::Materiales,
                    concept: "Materiales Académicos".to_string(),
                    amount: schedule.materials_fee,
                    due_date: today,
                    mes_aplicado: None,
                },
                now,
            )?;
            ledger.create_debt(
                NewDebt {
                    enrollment_id,
                    debt_type: DebtType::Mensualidad,
                    concept: format!("Mensualidad - {mes}"),
                    amount: schedule.monthly_tuition,
                    due_date: mes.due_date(),
                    mes_aplicado: Some(mes),
                },
                now,
            )?;
        }

        self.events.emit(Event::EnrollmentCreated {
            enrollment_id,
            student_id: spec.student_id,
            enrollment_type: spec.enrollment_type,
            timestamp: now,
        });

        // the desk payment rides the normal payment path, so it settles the
        // inscription debt exactly once
        if let Some(initial) = spec.initial_payment {
            PaymentRecorder::new(self.store, self.events).record(
                NewPayment {
                    enrollment_id,
                    concept: PaymentConcept::Inscripcion,
                    method: initial.method,
                    amount: initial.amount,
                    receipt_number: initial.receipt_number,
                    debt_id: inscription_debt,
                    es_adelantado: false,
                    allocations: Vec::new(),
                },
                time,
            )?;
        }

        tracing::info!(enrollment_id = %enrollment_id, student_id = %spec.student_id, "enrollment created");
        Ok(self.store.enrollment(enrollment_id)?.clone())
    }

    /// apply field changes through the version-checked write
    pub fn update(&mut self, id: EnrollmentId, changes: EnrollmentUpdate) -> Result<Enrollment> {
        let mut enrollment = self.store.enrollment(id)?.clone();
        if let Some(campus_id) = changes.campus_id {
            enrollment.campus_id = campus_id;
        }
        if let Some(plan_id) = changes.plan_id {
            enrollment.plan_id = Some(plan_id);
        }
        if let Some(active) = changes.active {
            enrollment.active = active;
        }
        self.store.put_enrollment(enrollment)?;
        Ok(self.store.enrollment(id)?.clone())
    }

    pub fn set_active(&mut self, id: EnrollmentId, active: bool) -> Result<Enrollment> {
        self.update(
            id,
            EnrollmentUpdate {
                active: Some(active),
                ..EnrollmentUpdate::default()
            },
        )
    }

    /// remove an enrollment and everything hanging off it, leaves-first
    pub fn remove(&mut self, id: EnrollmentId) -> Result<DeletionPlan> {
        let plan = self.store.enrollment_deletion_plan(id)?;
        self.store.execute_deletion(&plan)?;
        self.events.emit(Event::EnrollmentRemoved {
            enrollment_id: id,
            prepayments_removed: plan.prepayments.len(),
            payments_removed: plan.payments.len(),
            debts_removed: plan.debts.len(),
        });
        tracing::info!(
            enrollment_id = %id,
            debts = plan.debts.len(),
            payments = plan.payments.len(),
            "enrollment removed"
        );
        Ok(plan)
    }

    /// bulk wipe, used when resetting a campus dataset
    pub fn remove_all(&mut self) -> Result<usize> {
        let ids: Vec<EnrollmentId> = self.store.enrollments().map(|e| e.id).collect();
        tracing::warn!(count = ids.len(), "removing all enrollments");
        for id in &ids {
            self.remove(*id)?;
        }
        Ok(ids.len())
    }
}
