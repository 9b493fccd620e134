use hourglass_rs::SafeTimeProvider;

use crate::consumption::{ConsumptionEngine, MonthConsumption};
use crate::decimal::Money;
use crate::enrollment::{EnrollmentLifecycle, EnrollmentUpdate, NewEnrollment};
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::ledger::{DebtLedger, NewDebt};
use crate::month::YearMonth;
use crate::monthly::{MonthlyDebtsDriver, MonthlyRunReport};
use crate::payments::{NewPayment, PaymentRecorder, PaymentUpdate};
use crate::pricing::PriceBook;
use crate::records::{Debt, Enrollment, Payment, PrepaymentDetail};
use crate::serialization::LedgerSnapshot;
use crate::statement::{AccountStatement, StatementBuilder};
use crate::store::{DeletionPlan, LedgerStore};
use crate::types::{DebtId, EnrollmentId, PaymentId};

/// core billing ledger
///
/// owns the tables, the price catalog, and the event store, and exposes the
/// whole operation surface behind one struct.
pub struct BillingLedger {
    pub store: LedgerStore,
    pub prices: PriceBook,
    pub events: EventStore,
}

impl Default for BillingLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingLedger {
    pub fn new() -> Self {
        Self {
            store: LedgerStore::new(),
            prices: PriceBook::new(),
            events: EventStore::new(),
        }
    }

    pub fn with_prices(prices: PriceBook) -> Self {
        Self {
            prices,
            ..Self::new()
        }
    }

    // --- enrollments ---

    pub fn create_enrollment(
        &mut self,
        spec: NewEnrollment,
        time: &SafeTimeProvider,
    ) -> Result<Enrollment> {
        EnrollmentLifecycle::new(&mut self.store, &mut self.events)
            .create(spec, &self.prices, time)
    }

    pub fn create_enrollment_now(&mut self, spec: NewEnrollment) -> Result<Enrollment> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.create_enrollment(spec, &time)
    }

    pub fn enrollment(&self, id: EnrollmentId) -> Result<&Enrollment> {
        self.store.enrollment(id)
    }

    pub fn enrollments(&self) -> Vec<&Enrollment> {
        self.store.enrollments().collect()
    }

    pub fn update_enrollment(
        &mut self,
        id: EnrollmentId,
        changes: EnrollmentUpdate,
    ) -> Result<Enrollment> {
        EnrollmentLifecycle::new(&mut self.store, &mut self.events).update(id, changes)
    }

    pub fn set_enrollment_active(&mut self, id: EnrollmentId, active: bool) -> Result<Enrollment> {
        EnrollmentLifecycle::new(&mut self.store, &mut self.events).set_active(id, active)
    }

    pub fn remove_enrollment(&mut self, id: EnrollmentId) -> Result<DeletionPlan> {
        EnrollmentLifecycle::new(&mut self.store, &mut self.events).remove(id)
    }

    pub fn remove_all_enrollments(&mut self) -> Result<usize> {
        EnrollmentLifecycle::new(&mut self.store, &mut self.events).remove_all()
    }

    // --- debts ---

    pub fn create_debt(&mut self, spec: NewDebt, time: &SafeTimeProvider) -> Result<Debt> {
        DebtLedger::new(&mut self.store, &mut self.events).create_debt(spec, time.now())
    }

    pub fn apply_to_debt(
        &mut self,
        debt_id: DebtId,
        amount: Money,
        time: &SafeTimeProvider,
    ) -> Result<Debt> {
        DebtLedger::new(&mut self.store, &mut self.events).apply_to_debt(debt_id, amount, time.now())
    }

    pub fn debt(&self, id: DebtId) -> Result<&Debt> {
        self.store.debt(id)
    }

    pub fn pending_debts(&self, enrollment_id: EnrollmentId) -> Vec<Debt> {
        self.store.pending_debts(enrollment_id)
    }

    /// first open tuition debt for the month, if any
    pub fn find_debt_by_enrollment_and_month(
        &self,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
    ) -> Option<Debt> {
        self.store.find_debt_by_enrollment_and_month(enrollment_id, mes)
    }

    // --- payments ---

    pub fn record_payment(&mut self, spec: NewPayment, time: &SafeTimeProvider) -> Result<Payment> {
        PaymentRecorder::new(&mut self.store, &mut self.events).record(spec, time)
    }

    pub fn record_payment_now(&mut self, spec: NewPayment) -> Result<Payment> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.record_payment(spec, &time)
    }

    pub fn payment(&self, id: PaymentId) -> Result<&Payment> {
        self.store.payment(id)
    }

    pub fn payments(&self, enrollment_id: EnrollmentId) -> Vec<Payment> {
        self.store.payments_by_enrollment(enrollment_id)
    }

    pub fn update_payment(&mut self, id: PaymentId, changes: PaymentUpdate) -> Result<Payment> {
        PaymentRecorder::new(&mut self.store, &mut self.events).update_payment(id, changes)
    }

    pub fn prepayment_details(&self, payment_id: PaymentId) -> Result<Vec<PrepaymentDetail>> {
        self.store.payment(payment_id)?;
        Ok(self.store.prepayments_by_payment(payment_id))
    }

    // --- monthly reconciliation ---

    pub fn process_monthly_consumption(
        &mut self,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
        time: &SafeTimeProvider,
    ) -> Result<Option<MonthConsumption>> {
        ConsumptionEngine::new(&mut self.store, &mut self.events)
            .process_month(&self.prices, enrollment_id, mes, time)
    }

    pub fn process_monthly_consumption_now(
        &mut self,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
    ) -> Result<Option<MonthConsumption>> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.process_monthly_consumption(enrollment_id, mes, &time)
    }

    pub fn generate_monthly_debts(
        &mut self,
        mes: YearMonth,
        time: &SafeTimeProvider,
    ) -> Result<MonthlyRunReport> {
        MonthlyDebtsDriver::new(&mut self.store, &mut self.events).run(&self.prices, mes, time)
    }

    pub fn generate_monthly_debts_now(&mut self, mes: YearMonth) -> Result<MonthlyRunReport> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.generate_monthly_debts(mes, &time)
    }

    // --- statements ---

    pub fn account_statement(
        &self,
        enrollment_id: EnrollmentId,
        time: &SafeTimeProvider,
    ) -> Result<AccountStatement> {
        StatementBuilder::new(&self.store).build(&self.prices, enrollment_id, time.now())
    }

    // --- events and snapshots ---

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            store: self.store.clone(),
            prices: self.prices.clone(),
        }
    }

    /// rebuild a ledger from a snapshot; the event store starts empty
    pub fn restore(snapshot: LedgerSnapshot) -> Self {
        Self {
            store: snapshot.store,
            prices: snapshot.prices,
            events: EventStore::new(),
        }
    }
}
