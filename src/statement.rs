use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decimal::Money;
use crate::errors::Result;
use crate::month::YearMonth;
use crate::pricing::PriceBook;
use crate::records::{Consumo, Debt, Payment};
use crate::store::LedgerStore;
use crate::types::{CreditCoverage, DebtId, DebtType, EnrollmentId, MonthStatus};

/// one month's settlement picture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub mes: YearMonth,
    /// credit already consumed plus credit still scheduled for the month
    pub monto_pagado: Money,
    /// open tuition debt remaining for the month
    pub monto_adeudado: Money,
    pub status: MonthStatus,
    /// tuition still uncovered for the month, never negative
    pub saldo_pendiente: Money,
}

/// result of netting a month's scheduled credit against its open debt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NettedItem {
    /// credit left over after the month's debt was covered
    Prepayment {
        mes: YearMonth,
        amount: Money,
        coverage: CreditCoverage,
    },
    /// debt left over after the month's credit was drained
    Debt {
        debt_id: DebtId,
        mes: Option<YearMonth>,
        concept: String,
        amount: Money,
    },
}

/// full account statement for one enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub enrollment_id: EnrollmentId,
    pub generated_at: DateTime<Utc>,
    /// monthly tuition the statement was judged against
    pub plan_price: Money,
    pub saldo_favor: Money,
    /// newest month first
    pub months: Vec<MonthSummary>,
    /// newest month first, one-off debts after the month-keyed items
    pub netted: Vec<NettedItem>,
    /// total still owed after netting, across all months and one-off debts
    pub total_netted_saldo: Money,
    pub debts: Vec<Debt>,
    pub payments: Vec<Payment>,
    pub consumos: Vec<Consumo>,
}

/// assembles account statements from the ledger tables; read-only
pub struct StatementBuilder<'a> {
    store: &'a LedgerStore,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(store: &'a LedgerStore) -> Self {
        Self { store }
    }

    /// build the statement
    ///
    /// the month grid is seeded from tuition debts, consumos, and scheduled
    /// prepayments, so a month shows up as soon as anything touched it. The
    /// netting pass then pits each month's still-scheduled credit against
    /// its open debt; whichever side survives becomes a netted item, and an
    /// exact cancel produces none.
    pub fn build(
        &self,
        prices: &PriceBook,
        enrollment_id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<AccountStatement> {
        let enrollment = self.store.enrollment(enrollment_id)?;
        let plan_price = prices
            .resolve(enrollment.campus_id, enrollment.plan_id)
            .schedule
            .monthly_tuition;

        let debts = self.store.debts_by_enrollment(enrollment_id);
        let payments = self.store.payments_by_enrollment(enrollment_id);
        let consumos = self.store.consumos_by_enrollment(enrollment_id);
        let prepayments = self.store.prepayments_by_enrollment(enrollment_id);

        // seed the month grid from everything that references a month
        #[derive(Default)]
        struct Bucket {
            paid: Money,
            scheduled: Money,
            owed: Money,
            first_open_debt: Option<(DebtId, String)>,
        }
        let mut grid: BTreeMap<YearMonth, Bucket> = BTreeMap::new();

        for debt in &debts {
            if debt.debt_type != DebtType::Mensualidad {
                continue;
            }
            let Some(mes) = debt.mes_aplicado else { continue };
            let bucket = grid.entry(mes).or_default();
            if debt.is_open() {
                bucket.owed += debt.amount;
                if bucket.first_open_debt.is_none() {
                    bucket.first_open_debt = Some((debt.id, debt.concept.clone()));
                }
            }
        }
        for consumo in &consumos {
            grid.entry(consumo.mes).or_default().paid += consumo.amount;
        }
        for detail in &prepayments {
            if detail.is_scheduled() {
                let bucket = grid.entry(detail.target_month).or_default();
                bucket.paid += detail.amount;
                bucket.scheduled += detail.amount;
            }
        }

        let mut months = Vec::with_capacity(grid.len());
        let mut netted = Vec::new();
        let mut total_netted_saldo = Money::ZERO;

        for (mes, bucket) in &grid {
            let status = if bucket.paid >= plan_price {
                MonthStatus::Completo
            } else if bucket.paid.is_positive() {
                MonthStatus::Parcial
            } else {
                MonthStatus::Pendiente
            };
            months.push(MonthSummary {
                mes: *mes,
                monto_pagado: bucket.paid,
                monto_adeudado: bucket.owed,
                status,
                saldo_pendiente: plan_price.saturating_sub(bucket.paid),
            });

            // only credit not yet consumed nets against the open remainder
            let surplus = bucket.scheduled.saturating_sub(bucket.owed);
            let deficit = bucket.owed.saturating_sub(bucket.scheduled);
            if surplus.is_positive() {
                netted.push(NettedItem::Prepayment {
                    mes: *mes,
                    amount: surplus,
                    coverage: if surplus >= plan_price {
                        CreditCoverage::Total
                    } else {
                        CreditCoverage::Parcial
                    },
                });
            } else if deficit.is_positive() {
                // a deficit implies an open debt seeded the bucket
                if let Some((debt_id, concept)) = bucket.first_open_debt.clone() {
                    netted.push(NettedItem::Debt {
                        debt_id,
                        mes: Some(*mes),
                        concept,
                        amount: deficit,
                    });
                    total_netted_saldo += deficit;
                }
            }
        }

        // newest month first, like the month list
        netted.reverse();

        // one-off debts sit outside the month grid but still count as owed
        for debt in &debts {
            if debt.debt_type != DebtType::Mensualidad && debt.is_open() {
                netted.push(NettedItem::Debt {
                    debt_id: debt.id,
                    mes: None,
                    concept: debt.concept.clone(),
                    amount: debt.amount,
                });
                total_netted_saldo += debt.amount;
            }
        }

        months.reverse();

        Ok(AccountStatement {
            enrollment_id,
            generated_at: now,
            plan_price,
            saldo_favor: enrollment.saldo_favor,
            months,
            netted,
            total_netted_saldo,
            debts,
            payments,
            consumos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::ConsumptionEngine;
    use crate::enrollment::{EnrollmentLifecycle, NewEnrollment};
    use crate::events::EventStore;
    use crate::payments::{MonthAllocation, NewPayment, PaymentRecorder};
    use crate::types::{EnrollmentType, PaymentConcept};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use uuid::Uuid;

    struct Fixture {
        store: LedgerStore,
        events: EventStore,
        prices: PriceBook,
        enrollment_id: EnrollmentId,
        time: SafeTimeProvider,
    }

    fn fixture() -> Fixture {
        let mut store = LedgerStore::new();
        let mut events = EventStore::new();
        let prices = PriceBook::new();
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap(),
        ));
        let enrollment_id = EnrollmentLifecycle::new(&mut store, &mut events)
            .create(
                NewEnrollment {
                    student_id: Uuid::new_v4(),
                    campus_id: Uuid::new_v4(),
                    plan_id: Some(Uuid::new_v4()),
                    enrollment_type: EnrollmentType::Plan,
                    initial_payment: None,
                },
                &prices,
                &time,
            )
            .unwrap()
            .id;
        Fixture {
            store,
            events,
            prices,
            enrollment_id,
            time,
        }
    }

    fn prepay(fx: &mut Fixture, months: &[(&str, i64)]) {
        let allocations: Vec<MonthAllocation> = months
            .iter()
            .map(|(m, amount)| MonthAllocation {
                mes: m.parse().unwrap(),
                amount: Money::from_major(*amount),
            })
            .collect();
        PaymentRecorder::new(&mut fx.store, &mut fx.events)
            .record(
                NewPayment {
                    enrollment_id: fx.enrollment_id,
                    concept: PaymentConcept::MensualidadAdelantada,
                    method: "Transferencia".to_string(),
                    amount: allocations.iter().map(|a| a.amount).sum(),
                    receipt_number: None,
                    debt_id: None,
                    es_adelantado: true,
                    allocations,
                },
                &fx.time,
            )
            .unwrap();
    }

    fn build(fx: &Fixture) -> AccountStatement {
        StatementBuilder::new(&fx.store)
            .build(&fx.prices, fx.enrollment_id, fx.time.now())
            .unwrap()
    }

    #[test]
    fn test_unpaid_month_shows_pendiente_and_netted_debt() {
        let fx = fixture();
        let statement = build(&fx);

        // enrollment billed january's tuition
        let january: YearMonth = "2025-01".parse().unwrap();
        let month = statement.months.iter().find(|m| m.mes == january).unwrap();
        assert_eq!(month.status, MonthStatus::Pendiente);
        assert_eq!(month.monto_adeudado, Money::from_major(280));
        assert_eq!(month.saldo_pendiente, Money::from_major(280));

        assert!(statement.netted.iter().any(|item| matches!(
            item,
            NettedItem::Debt { mes: Some(m), amount, .. }
                if *m == january && *amount == Money::from_major(280)
        )));
    }

    #[test]
    fn test_scheduled_month_shows_completo_with_surplus_credit() {
        let mut fx = fixture();
        prepay(&mut fx, &[("2025-02", 280)]);
        let statement = build(&fx);

        let february: YearMonth = "2025-02".parse().unwrap();
        let month = statement.months.iter().find(|m| m.mes == february).unwrap();
        assert_eq!(month.status, MonthStatus::Completo);
        assert_eq!(month.saldo_pendiente, Money::ZERO);

        // no debt exists for february yet, so the whole credit survives
        assert!(statement.netted.iter().any(|item| matches!(
            item,
            NettedItem::Prepayment { mes, amount, coverage: CreditCoverage::Total }
                if *mes == february && *amount == Money::from_major(280)
        )));
    }

    #[test]
    fn test_consumed_month_does_not_net_twice() {
        // consumption already reduced the debt, so consumed credit must not
        // be netted against it a second time
        let mut fx = fixture();
        let mut enrollment = fx.store.enrollment(fx.enrollment_id).unwrap().clone();
        enrollment.saldo_favor = Money::from_major(100);
        fx.store.put_enrollment(enrollment).unwrap();

        let january: YearMonth = "2025-01".parse().unwrap();
        ConsumptionEngine::new(&mut fx.store, &mut fx.events)
            .process_month(&fx.prices, fx.enrollment_id, january, &fx.time)
            .unwrap();

        let statement = build(&fx);
        let month = statement.months.iter().find(|m| m.mes == january).unwrap();
        assert_eq!(month.monto_pagado, Money::from_major(100));
        assert_eq!(month.monto_adeudado, Money::from_major(180));
        assert_eq!(month.status, MonthStatus::Parcial);
        assert_eq!(month.saldo_pendiente, Money::from_major(180));

        assert!(statement.netted.iter().any(|item| matches!(
            item,
            NettedItem::Debt { mes: Some(m), amount, .. }
                if *m == january && *amount == Money::from_major(180)
        )));
    }

    #[test]
    fn test_exact_cancel_produces_no_netted_item() {
        let mut fx = fixture();
        // january's 280 debt against 280 scheduled for january
        prepay(&mut fx, &[("2025-01", 280)]);
        let statement = build(&fx);

        let january: YearMonth = "2025-01".parse().unwrap();
        assert!(!statement.netted.iter().any(|item| matches!(
            item,
            NettedItem::Prepayment { mes, .. } if *mes == january
        ) || matches!(
            item,
            NettedItem::Debt { mes: Some(m), .. } if *m == january
        )));
    }

    #[test]
    fn test_one_off_debts_are_appended() {
        let fx = fixture();
        let statement = build(&fx);

        let one_offs: Vec<&NettedItem> = statement
            .netted
            .iter()
            .filter(|item| matches!(item, NettedItem::Debt { mes: None, .. }))
            .collect();
        // inscription and materials
        assert_eq!(one_offs.len(), 2);

        // 280 tuition + 80 + 80
        assert_eq!(statement.total_netted_saldo, Money::from_major(440));
    }

    #[test]
    fn test_netted_items_newest_first() {
        // january debt plus credit scheduled for february and march
        let mut fx = fixture();
        prepay(&mut fx, &[("2025-02", 280), ("2025-03", 280)]);
        let statement = build(&fx);

        let listed: Vec<YearMonth> = statement
            .netted
            .iter()
            .filter_map(|item| match item {
                NettedItem::Prepayment { mes, .. } => Some(*mes),
                NettedItem::Debt { mes, .. } => *mes,
            })
            .collect();
        let expected: Vec<YearMonth> = ["2025-03", "2025-02", "2025-01"]
            .iter()
            .map(|m| m.parse().unwrap())
            .collect();
        assert_eq!(listed, expected);

        // one-off debts trail the month-keyed items
        let first_one_off = statement
            .netted
            .iter()
            .position(|item| matches!(item, NettedItem::Debt { mes: None, .. }))
            .unwrap();
        assert_eq!(first_one_off, 3);
    }

    #[test]
    fn test_months_sorted_newest_first() {
        let mut fx = fixture();
        prepay(&mut fx, &[("2025-02", 280), ("2025-03", 280)]);
        let statement = build(&fx);

        let listed: Vec<YearMonth> = statement.months.iter().map(|m| m.mes).collect();
        let mut sorted = listed.clone();
        sorted.sort();
        sorted.reverse();
        assert_eq!(listed, sorted);
        assert_eq!(listed.len(), 3);
    }
}
