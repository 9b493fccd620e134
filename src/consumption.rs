use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::ledger::{DebtLedger, NewDebt};
use crate::month::YearMonth;
use crate::pricing::PriceBook;
use crate::records::Consumo;
use crate::store::LedgerStore;
use crate::types::{DebtId, DebtType, EnrollmentId, PrepaymentState};

/// outcome of reconciling one enrollment-month
///
/// `specific_covered + from_global_credit + shortfall` adds back up to the
/// monthly tuition: reconciliation moves money around, it never mints it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthConsumption {
    pub enrollment_id: EnrollmentId,
    pub mes: YearMonth,
    pub monthly_tuition: Money,
    /// credit scheduled for exactly this month
    pub specific_covered: Money,
    /// credit drawn from the standing balance
    pub from_global_credit: Money,
    /// net amount still owed after all credit was applied
    pub shortfall: Money,
    pub total_applied: Money,
    /// debt created for the shortfall, if any
    pub new_debt: Option<DebtId>,
}

/// true when the month was already billed or already consumed credit
///
/// the monthly driver checks this before invoking the engine; a consumo row
/// or a still-pending tuition debt for the month both count as processed.
pub fn is_month_processed(store: &LedgerStore, enrollment_id: EnrollmentId, mes: YearMonth) -> bool {
    if store.consumo_for(enrollment_id, mes).is_some() {
        return true;
    }
    store
        .pending_debts(enrollment_id)
        .iter()
        .any(|d| d.debt_type == DebtType::Mensualidad && d.mes_aplicado == Some(mes))
}

/// reconciles scheduled prepayments and standing credit against one month's
/// tuition for one enrollment
pub struct ConsumptionEngine<'a> {
    store: &'a mut LedgerStore,
    events: &'a mut EventStore,
}

impl<'a> ConsumptionEngine<'a> {
    pub fn new(store: &'a mut LedgerStore, events: &'a mut EventStore) -> Self {
        Self { store, events }
    }

    /// process one enrollment-month
    ///
    /// order is deliberate: credit earmarked for this month first, standing
    /// credit second, netting against already-billed debts third, and only a
    /// remaining shortfall becomes a new debt. Returns `None` for
    /// enrollments outside monthly billing.
    pub fn process_month(
        &mut self,
        prices: &PriceBook,
        enrollment_id: EnrollmentId,
        mes: YearMonth,
        time: &SafeTimeProvider,
    ) -> Result<Option<MonthConsumption>> {
        let enrollment = self.store.enrollment(enrollment_id)?.clone();
        if !enrollment.is_billable_plan() {
            return Ok(None);
        }

        // a consumo row means this month already drew its credit; a pending
        // debt alone is fine, netting against it is exactly the job here
        if self.store.consumo_for(enrollment_id, mes).is_some() {
            tracing::warn!(enrollment_id = %enrollment_id, mes = %mes, "month already consumed, skipping");
            return Ok(None);
        }

        tracing::info!(enrollment_id = %enrollment_id, mes = %mes, "processing monthly consumption");

        let now = time.now();
        let monthly_tuition = prices
            .resolve(enrollment.campus_id, enrollment.plan_id)
            .schedule
            .monthly_tuition;

        // 1. consume credit scheduled for exactly this month
        let scheduled = self.store.scheduled_prepayments(enrollment_id, mes);
        let specific_covered: Money = scheduled.iter().map(|d| d.amount).sum();
        for detail in &scheduled {
            if let Some(row) = self.store.prepayment_mut(detail.id) {
                row.state = PrepaymentState::Aplicado;
                row.applied_at = Some(now);
            }
            self.events.emit(Event::PrepaymentApplied {
                prepayment_id: detail.id,
                target_month: mes,
                amount: detail.amount,
                timestamp: now,
            });
        }

        let mut remaining = monthly_tuition.saturating_sub(specific_covered);

        // 2. draw the gap from standing credit not earmarked for this month
        let available_global = enrollment.saldo_favor.saturating_sub(specific_covered);
        let from_global_credit = available_global.min(remaining);
        remaining -= from_global_credit;

        let total_applied = specific_covered + from_global_credit;

        // 3. net the applied credit against debts already billed for this month
        let existing = self.store.monthly_debts_for(enrollment_id, mes);
        let mut unapplied = total_applied;
        for debt in &existing {
            if debt.state.is_terminal() || unapplied.is_zero() {
                continue;
            }
            let portion = unapplied.min(debt.amount);
            DebtLedger::new(self.store, self.events).apply_to_debt(debt.id, portion, now)?;
            unapplied -= portion;
        }

        // 4. only a month nobody billed yet turns its shortfall into a new debt
        let new_debt = if existing.is_empty() && remaining.is_positive() {
            let debt = DebtLedger::new(self.store, self.events).create_debt(
                NewDebt {
                    enrollment_id,
                    debt_type: DebtType::Mensualidad,
                    concept: format!("Mensualidad - {mes}"),
                    amount: remaining,
                    due_date: mes.due_date(),
                    mes_aplicado: Some(mes),
                },
                now,
            )?;
            Some(debt.id)
        } else {
            None
        };

        // 5. consumo row doubles as the month's idempotency marker
        if total_applied.is_positive() {
            self.store.insert_consumo(Consumo {
                id: Uuid::new_v4(),
                enrollment_id,
                mes,
                amount: total_applied,
                recorded_at: now,
            });
            self.events.emit(Event::CreditConsumed {
                enrollment_id,
                mes,
                total_applied,
                new_debt,
                timestamp: now,
            });
        }

        // 6. settle the standing balance, never below zero
        let mut updated = self.store.enrollment(enrollment_id)?.clone();
        updated.saldo_favor = updated.saldo_favor.saturating_sub(total_applied);
        self.store.put_enrollment(updated)?;

        tracing::info!(
            enrollment_id = %enrollment_id,
            mes = %mes,
            total_applied = %total_applied,
            shortfall = %remaining,
            "consumption finished"
        );

        Ok(Some(MonthConsumption {
            enrollment_id,
            mes,
            monthly_tuition,
            specific_covered,
            from_global_credit,
            shortfall: remaining,
            total_applied,
            new_debt,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{MonthAllocation, NewPayment, PaymentRecorder};
    use crate::records::Enrollment;
    use crate::types::{DebtState, EnrollmentType, PaymentConcept};
    use chrono::Utc;
    use hourglass_rs::TimeSource;

    struct Fixture {
        store: LedgerStore,
        events: EventStore,
        prices: PriceBook,
        enrollment_id: EnrollmentId,
        time: SafeTimeProvider,
    }

    fn fixture() -> Fixture {
        let mut store = LedgerStore::new();
        let enrollment = Enrollment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            EnrollmentType::Plan,
            Utc::now(),
        );
        let enrollment_id = enrollment.id;
        store.insert_enrollment(enrollment);
        Fixture {
            store,
            events: EventStore::new(),
            prices: PriceBook::new(), // fallback tuition of 280
            enrollment_id,
            time: SafeTimeProvider::new(TimeSource::Test(Utc::now())),
        }
    }

    fn mes() -> YearMonth {
        "2025-03".parse().unwrap()
    }

    fn schedule_prepayment(fx: &mut Fixture, months: &[(&str, i64)]) {
        let allocations: Vec<MonthAllocation> = months
            .iter()
            .map(|(m, amount)| MonthAllocation {
                mes: m.parse().unwrap(),
                amount: Money::from_major(*amount),
            })
            .collect();
        let spec = NewPayment {
            enrollment_id: fx.enrollment_id,
            concept: PaymentConcept::MensualidadAdelantada,
            method: "Efectivo".to_string(),
            amount: allocations.iter().map(|a| a.amount).sum(),
            receipt_number: None,
            debt_id: None,
            es_adelantado: true,
            allocations,
        };
        PaymentRecorder::new(&mut fx.store, &mut fx.events)
            .record(spec, &fx.time)
            .unwrap();
    }

    fn process(fx: &mut Fixture) -> Option<MonthConsumption> {
        ConsumptionEngine::new(&mut fx.store, &mut fx.events)
            .process_month(&fx.prices, fx.enrollment_id, mes(), &fx.time)
            .unwrap()
    }

    #[test]
    fn test_uncovered_month_creates_shortfall_debt() {
        // no prepayments, no credit: one new tuition debt of 280
        let mut fx = fixture();

        let result = process(&mut fx).unwrap();
        assert_eq!(result.specific_covered, Money::ZERO);
        assert_eq!(result.from_global_credit, Money::ZERO);
        assert_eq!(result.shortfall, Money::from_major(280));
        assert_eq!(result.total_applied, Money::ZERO);

        let debts = fx.store.monthly_debts_for(fx.enrollment_id, mes());
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].amount, Money::from_major(280));
        assert_eq!(debts[0].state, DebtState::Pendiente);
        assert_eq!(debts[0].due_date, mes().due_date());

        // saldo favor untouched, and no zero-amount consumo
        let enrollment = fx.store.enrollment(fx.enrollment_id).unwrap();
        assert_eq!(enrollment.saldo_favor, Money::ZERO);
        assert!(fx.store.consumo_for(fx.enrollment_id, mes()).is_none());
    }

    #[test]
    fn test_month_fully_covered_by_specific_prepayment() {
        let mut fx = fixture();
        schedule_prepayment(&mut fx, &[("2025-03", 280)]);

        let result = process(&mut fx).unwrap();
        assert_eq!(result.specific_covered, Money::from_major(280));
        assert_eq!(result.shortfall, Money::ZERO);
        assert!(result.new_debt.is_none());

        // detail moved to APLICADO
        let details = fx.store.prepayments_by_enrollment(fx.enrollment_id);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].state, PrepaymentState::Aplicado);
        assert!(details[0].applied_at.is_some());

        // consumo recorded, no debt created
        let consumo = fx.store.consumo_for(fx.enrollment_id, mes()).unwrap();
        assert_eq!(consumo.amount, Money::from_major(280));
        assert!(fx.store.monthly_debts_for(fx.enrollment_id, mes()).is_empty());
    }

    #[test]
    fn test_global_credit_nets_existing_debt() {
        // saldo favor 100 against an existing pending debt of 280
        let mut fx = fixture();

        let mut enrollment = fx.store.enrollment(fx.enrollment_id).unwrap().clone();
        enrollment.saldo_favor = Money::from_major(100);
        fx.store.put_enrollment(enrollment).unwrap();

        DebtLedger::new(&mut fx.store, &mut fx.events)
            .create_debt(
                NewDebt {
                    enrollment_id: fx.enrollment_id,
                    debt_type: DebtType::Mensualidad,
                    concept: format!("Mensualidad - {}", mes()),
                    amount: Money::from_major(280),
                    due_date: mes().due_date(),
                    mes_aplicado: Some(mes()),
                },
                fx.time.now(),
            )
            .unwrap();

        let result = process(&mut fx).unwrap();
        assert_eq!(result.from_global_credit, Money::from_major(100));
        assert_eq!(result.total_applied, Money::from_major(100));
        assert!(result.new_debt.is_none());

        let debts = fx.store.monthly_debts_for(fx.enrollment_id, mes());
        assert_eq!(debts[0].amount, Money::from_major(180));
        assert_eq!(debts[0].state, DebtState::PagadoParcial);

        let enrollment = fx.store.enrollment(fx.enrollment_id).unwrap();
        assert_eq!(enrollment.saldo_favor, Money::ZERO);

        let consumo = fx.store.consumo_for(fx.enrollment_id, mes()).unwrap();
        assert_eq!(consumo.amount, Money::from_major(100));
    }

    #[test]
    fn test_specific_credit_is_not_double_drawn_as_global() {
        // 100 scheduled for this month is the only source of saldo favor;
        // it must not be spent a second time as standing credit
        let mut fx = fixture();
        schedule_prepayment(&mut fx, &[("2025-03", 100)]);

        let result = process(&mut fx).unwrap();
        assert_eq!(result.specific_covered, Money::from_major(100));
        assert_eq!(result.from_global_credit, Money::ZERO);
        assert_eq!(result.shortfall, Money::from_major(180));

        let enrollment = fx.store.enrollment(fx.enrollment_id).unwrap();
        assert_eq!(enrollment.saldo_favor, Money::ZERO);
    }

    #[test]
    fn test_conservation() {
        let mut fx = fixture();
        schedule_prepayment(&mut fx, &[("2025-03", 120)]);

        let mut enrollment = fx.store.enrollment(fx.enrollment_id).unwrap().clone();
        enrollment.saldo_favor += Money::from_major(90); // extra standing credit
        fx.store.put_enrollment(enrollment).unwrap();

        let result = process(&mut fx).unwrap();
        assert_eq!(
            result.specific_covered + result.from_global_credit + result.shortfall,
            result.monthly_tuition
        );
        assert_eq!(result.specific_covered, Money::from_major(120));
        assert_eq!(result.from_global_credit, Money::from_major(90));
        assert_eq!(result.shortfall, Money::from_major(70));
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut fx = fixture();
        schedule_prepayment(&mut fx, &[("2025-03", 280)]);

        process(&mut fx).unwrap();
        let after_first: Vec<_> = fx.store.debts_by_enrollment(fx.enrollment_id);
        let favor_first = fx.store.enrollment(fx.enrollment_id).unwrap().saldo_favor;

        assert!(process(&mut fx).is_none());
        assert_eq!(fx.store.debts_by_enrollment(fx.enrollment_id), after_first);
        assert_eq!(
            fx.store.enrollment(fx.enrollment_id).unwrap().saldo_favor,
            favor_first
        );
    }

    #[test]
    fn test_non_plan_enrollments_are_skipped() {
        let mut fx = fixture();
        let product = Enrollment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            EnrollmentType::Product,
            Utc::now(),
        );
        let product_id = product.id;
        fx.store.insert_enrollment(product);

        let result = ConsumptionEngine::new(&mut fx.store, &mut fx.events)
            .process_month(&fx.prices, product_id, mes(), &fx.time)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_month_processed_markers() {
        let mut fx = fixture();
        assert!(!is_month_processed(&fx.store, fx.enrollment_id, mes()));

        // a pending tuition debt for the month counts as processed
        process(&mut fx).unwrap();
        assert!(is_month_processed(&fx.store, fx.enrollment_id, mes()));

        // so does a consumo row, even with the debt gone
        let mut fx = fixture();
        schedule_prepayment(&mut fx, &[("2025-03", 280)]);
        process(&mut fx).unwrap();
        assert!(is_month_processed(&fx.store, fx.enrollment_id, mes()));
    }
}
