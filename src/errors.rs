use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::DebtState;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("enrollment not found: {id}")]
    EnrollmentNotFound { id: Uuid },

    #[error("debt not found: {id}")]
    DebtNotFound { id: Uuid },

    #[error("payment not found: {id}")]
    PaymentNotFound { id: Uuid },

    #[error("student {student_id} already has an active PLAN enrollment")]
    DuplicatePlanEnrollment { student_id: Uuid },

    #[error("prepayment requires an active PLAN enrollment: {enrollment_id}")]
    PrepaymentNotAllowed { enrollment_id: Uuid },

    #[error("enrollment {enrollment_id} mixes monthly and prepaid tuition payments")]
    PaymentSchemeConflict { enrollment_id: Uuid },

    #[error("debt {id} cannot receive payments in state {state:?}")]
    DebtNotPayable { id: Uuid, state: DebtState },

    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Money },

    #[error("month allocations sum {allocated} does not match payment amount {expected}")]
    AllocationMismatch { expected: Money, allocated: Money },

    #[error("prepayment has no month allocations")]
    EmptyAllocations,

    #[error("invalid billing month: {input}")]
    InvalidMonth { input: String },

    #[error("stale write on {entity} {id}: expected version {expected}, found {found}")]
    StaleWrite {
        entity: &'static str,
        id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("snapshot error: {message}")]
    Snapshot { message: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
