use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for an enrollment (matrícula)
pub type EnrollmentId = Uuid;
/// unique identifier for a student
pub type StudentId = Uuid;
/// unique identifier for a campus (sede)
pub type CampusId = Uuid;
/// unique identifier for a plan
pub type PlanId = Uuid;
/// unique identifier for a debt
pub type DebtId = Uuid;
/// unique identifier for a payment
pub type PaymentId = Uuid;
/// unique identifier for a scheduled prepayment detail
pub type PrepaymentId = Uuid;
/// unique identifier for a consumo record
pub type ConsumoId = Uuid;

/// enrollment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentType {
    /// recurring plan billed monthly
    Plan,
    /// one-off product, no recurring billing
    Product,
}

/// debt type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtType {
    Mensualidad,
    Inscripcion,
    Materiales,
    Producto,
    Servicio,
    Otros,
}

/// debt state machine
///
/// transitions only move forward; a settled or voided debt never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtState {
    /// created, nothing applied yet
    Pendiente,
    /// partially covered, remainder still owed
    PagadoParcial,
    /// fully covered
    Pagado,
    /// past due date without full coverage
    Vencido,
    /// administratively voided
    Anulado,
}

impl DebtState {
    /// explicit transition table; backward moves are forbidden
    pub fn can_transition_to(self, next: DebtState) -> bool {
        use DebtState::*;
        matches!(
            (self, next),
            (Pendiente, PagadoParcial)
                | (Pendiente, Pagado)
                | (Pendiente, Vencido)
                | (Pendiente, Anulado)
                | (PagadoParcial, PagadoParcial)
                | (PagadoParcial, Pagado)
                | (PagadoParcial, Vencido)
                | (PagadoParcial, Anulado)
                | (Vencido, PagadoParcial)
                | (Vencido, Pagado)
                | (Vencido, Anulado)
        )
    }

    /// settled or voided debts accept no further money
    pub fn is_terminal(self) -> bool {
        matches!(self, DebtState::Pagado | DebtState::Anulado)
    }
}

/// scheduled prepayment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrepaymentState {
    /// collected, waiting for its target month to be processed
    PendienteAplicacion,
    /// netted against its target month by the consumption engine
    Aplicado,
    /// administratively cancelled
    Cancelado,
}

/// payment concept, the closed replacement for the free-text `tipo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentConcept {
    Inscripcion,
    Materiales,
    Mensualidad,
    MensualidadAdelantada,
    /// anything else; never auto-linked to a debt
    Otro(String),
}

impl PaymentConcept {
    /// canonical debt type this concept settles, if any
    pub fn debt_type(&self) -> Option<DebtType> {
        match self {
            PaymentConcept::Inscripcion => Some(DebtType::Inscripcion),
            PaymentConcept::Materiales => Some(DebtType::Materiales),
            PaymentConcept::Mensualidad | PaymentConcept::MensualidadAdelantada => {
                Some(DebtType::Mensualidad)
            }
            PaymentConcept::Otro(_) => None,
        }
    }
}

/// per-month settlement status in the account statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonthStatus {
    Completo,
    Parcial,
    Pendiente,
}

/// how far a netted credit goes toward a month's tuition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditCoverage {
    Total,
    Parcial,
}
