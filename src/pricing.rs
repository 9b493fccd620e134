use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{CampusId, PlanId};

/// the three amounts a campus+plan pair is billed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSchedule {
    pub monthly_tuition: Money,
    pub enrollment_fee: Money,
    pub materials_fee: Money,
}

impl PriceSchedule {
    /// safety-net amounts for incompletely seeded price data
    pub fn base_default() -> Self {
        Self {
            monthly_tuition: Money::from_major(280),
            enrollment_fee: Money::from_major(80),
            materials_fee: Money::from_major(80),
        }
    }
}

/// one configured price row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub id: Uuid,
    pub campus_id: CampusId,
    pub plan_id: PlanId,
    pub schedule: PriceSchedule,
    pub effective_from: NaiveDate,
    pub active: bool,
}

/// a resolved price, flagged when it came from the fallback table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub schedule: PriceSchedule,
    /// degraded mode: no explicit price row existed for the pair
    pub fallback: bool,
}

/// price catalog with a per-plan fallback table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceBook {
    rows: Vec<PriceRow>,
    fallback: HashMap<PlanId, PriceSchedule>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(
        &mut self,
        campus_id: CampusId,
        plan_id: PlanId,
        schedule: PriceSchedule,
        effective_from: NaiveDate,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.push(PriceRow {
            id,
            campus_id,
            plan_id,
            schedule,
            effective_from,
            active: true,
        });
        id
    }

    pub fn deactivate_row(&mut self, id: Uuid) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.id == id) {
            row.active = false;
        }
    }

    /// seed a fallback entry for a known plan
    pub fn set_fallback(&mut self, plan_id: PlanId, schedule: PriceSchedule) {
        self.fallback.insert(plan_id, schedule);
    }

    /// most recent active price for the pair, or the fallback table
    pub fn resolve(&self, campus_id: CampusId, plan_id: Option<PlanId>) -> PriceQuote {
        if let Some(plan_id) = plan_id {
            let best = self
                .rows
                .iter()
                .filter(|r| r.campus_id == campus_id && r.plan_id == plan_id && r.active)
                .max_by_key(|r| r.effective_from);

            if let Some(row) = best {
                return PriceQuote {
                    schedule: row.schedule,
                    fallback: false,
                };
            }
        }

        let schedule = plan_id
            .and_then(|p| self.fallback.get(&p).copied())
            .unwrap_or_else(PriceSchedule::base_default);

        tracing::warn!(
            campus_id = %campus_id,
            plan_id = ?plan_id,
            "no price row configured, using fallback prices"
        );

        PriceQuote {
            schedule,
            fallback: true,
        }
    }
}
