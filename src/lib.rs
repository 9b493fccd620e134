pub mod billing;
pub mod consumption;
pub mod decimal;
pub mod enrollment;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod month;
pub mod monthly;
pub mod payments;
pub mod pricing;
pub mod records;
pub mod serialization;
pub mod shared;
pub mod statement;
pub mod store;
pub mod types;

// re-export key types
pub use billing::BillingLedger;
pub use consumption::{is_month_processed, ConsumptionEngine, MonthConsumption};
pub use decimal::Money;
pub use enrollment::{EnrollmentLifecycle, EnrollmentUpdate, InitialPayment, NewEnrollment};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::{DebtLedger, NewDebt};
pub use month::YearMonth;
pub use monthly::{MonthlyDebtsDriver, MonthlyRunReport};
pub use payments::{MonthAllocation, NewPayment, PaymentRecorder, PaymentUpdate};
pub use pricing::{PriceBook, PriceQuote, PriceRow, PriceSchedule};
pub use records::{Consumo, Debt, Enrollment, Payment, PrepaymentDetail};
pub use serialization::LedgerSnapshot;
pub use shared::SharedBillingLedger;
pub use statement::{AccountStatement, MonthSummary, NettedItem, StatementBuilder};
pub use store::{DeletionPlan, LedgerStore};
pub use types::{
    CampusId, ConsumoId, CreditCoverage, DebtId, DebtState, DebtType, EnrollmentId,
    EnrollmentType, MonthStatus, PaymentConcept, PaymentId, PlanId, PrepaymentId,
    PrepaymentState, StudentId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
