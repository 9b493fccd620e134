use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::month::YearMonth;
use crate::types::{
    CampusId, ConsumoId, DebtId, DebtState, DebtType, EnrollmentId, EnrollmentType, PaymentConcept,
    PaymentId, PlanId, PrepaymentId, PrepaymentState, StudentId,
};

/// one student's commitment to a plan or a one-off product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub campus_id: CampusId,
    /// absent for PRODUCT enrollments
    pub plan_id: Option<PlanId>,
    pub enrollment_type: EnrollmentType,
    /// current balance owed
    pub saldo: Money,
    /// standing credit balance, always >= 0
    pub saldo_favor: Money,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// optimistic-concurrency counter, bumped by the store on every write
    pub version: u64,
}

impl Enrollment {
    pub fn new(
        student_id: StudentId,
        campus_id: CampusId,
        plan_id: Option<PlanId>,
        enrollment_type: EnrollmentType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            campus_id,
            plan_id,
            enrollment_type,
            saldo: Money::ZERO,
            saldo_favor: Money::ZERO,
            active: true,
            created_at,
            version: 0,
        }
    }

    /// eligible for monthly tuition billing
    pub fn is_billable_plan(&self) -> bool {
        self.active && self.enrollment_type == EnrollmentType::Plan
    }
}

/// one billable obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    pub enrollment_id: EnrollmentId,
    pub debt_type: DebtType,
    pub concept: String,
    /// outstanding amount, always >= 0; zero implies `Pagado`
    pub amount: Money,
    pub due_date: NaiveDate,
    /// only meaningful for `Mensualidad` debts
    pub mes_aplicado: Option<YearMonth>,
    pub state: DebtState,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Debt {
    /// not settled, not voided, not soft-deleted
    pub fn is_open(&self) -> bool {
        self.active && !self.state.is_terminal()
    }
}

/// one money-received event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub enrollment_id: EnrollmentId,
    pub concept: PaymentConcept,
    pub method: String,
    pub amount: Money,
    pub receipt_number: Option<String>,
    /// debt the payment was applied against, if any
    pub debt_id: Option<DebtId>,
    pub es_adelantado: bool,
    pub paid_at: DateTime<Utc>,
}

/// money collected today for a future month, not yet netted against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentDetail {
    pub id: PrepaymentId,
    pub payment_id: PaymentId,
    pub enrollment_id: EnrollmentId,
    pub target_month: YearMonth,
    pub amount: Money,
    pub state: PrepaymentState,
    pub applied_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl PrepaymentDetail {
    pub fn is_scheduled(&self) -> bool {
        self.active && self.state == PrepaymentState::PendienteAplicacion
    }
}

/// audit record of credit applied to a month; doubles as the per-month
/// idempotency marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumo {
    pub id: ConsumoId,
    pub enrollment_id: EnrollmentId,
    pub mes: YearMonth,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}
