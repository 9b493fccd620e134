use hourglass_rs::SafeTimeProvider;

use crate::consumption::{is_month_processed, ConsumptionEngine};
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::month::YearMonth;
use crate::pricing::PriceBook;
use crate::store::LedgerStore;

/// tally of one monthly billing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonthlyRunReport {
    pub processed: usize,
    pub skipped: usize,
    pub failures: usize,
}

/// walks every billable enrollment once per month and hands each to the
/// consumption engine
pub struct MonthlyDebtsDriver<'a> {
    store: &'a mut LedgerStore,
    events: &'a mut EventStore,
}

impl<'a> MonthlyDebtsDriver<'a> {
    pub fn new(store: &'a mut LedgerStore, events: &'a mut EventStore) -> Self {
        Self { store, events }
    }

    /// run the month across all active PLAN enrollments
    ///
    /// already-processed enrollments are skipped, and one enrollment's
    /// failure never aborts the rest of the run.
    pub fn run(
        &mut self,
        prices: &PriceBook,
        mes: YearMonth,
        time: &SafeTimeProvider,
    ) -> Result<MonthlyRunReport> {
        let ids = self.store.billable_plan_enrollment_ids();
        tracing::info!(mes = %mes, enrollments = ids.len(), "monthly billing run started");

        let mut report = MonthlyRunReport::default();
        for enrollment_id in ids {
            if is_month_processed(self.store, enrollment_id, mes) {
                tracing::warn!(enrollment_id = %enrollment_id, mes = %mes, "month already processed");
                self.events.emit(Event::MonthSkipped { enrollment_id, mes });
                report.skipped += 1;
                continue;
            }

            match ConsumptionEngine::new(self.store, self.events)
                .process_month(prices, enrollment_id, mes, time)
            {
                Ok(_) => report.processed += 1,
                Err(error) => {
                    tracing::error!(
                        enrollment_id = %enrollment_id,
                        mes = %mes,
                        %error,
                        "enrollment failed during monthly run"
                    );
                    report.failures += 1;
                }
            }
        }

        self.events.emit(Event::MonthlyRunCompleted {
            mes,
            processed: report.processed,
            skipped: report.skipped,
            failures: report.failures,
            timestamp: time.now(),
        });
        tracing::info!(
            mes = %mes,
            processed = report.processed,
            skipped = report.skipped,
            failures = report.failures,
            "monthly billing run finished"
        );
        Ok(report)
    }
}
