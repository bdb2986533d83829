//! 產能計劃模型（CRP）

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exception::Exception;
use crate::plan::{PlanScope, PlanStatus};
use crate::{MrpError, Result};

/// 單一工序對工作中心的負荷（可追溯到訂單）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLoad {
    pub order_id: Uuid,
    pub item_id: String,
    pub operation_sequence: u32,
    pub work_center_id: String,

    /// 排程開工日
    pub start_date: NaiveDate,

    /// 排程完工日
    pub end_date: NaiveDate,

    /// 負荷所屬時間桶起始日
    pub period_start: NaiveDate,

    pub setup_hours: Decimal,
    pub run_hours: Decimal,
}

impl OperationLoad {
    /// 佔用的產能工時
    pub fn hours(&self) -> Decimal {
        self.setup_hours + self.run_hours
    }
}

/// 產能需求（工作中心 × 時間桶）
///
/// 排隊與搬運是工序之間的等待，不佔用工作中心：它們只用來推算工序佔用的工作日，
/// 另記在 `queue_move_hours`，負荷率只以準備與加工工時計算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRequirement {
    pub work_center_id: String,
    pub period_start: NaiveDate,

    /// 時間桶結束日（含）
    pub period_end: NaiveDate,

    pub setup_hours: Decimal,
    pub run_hours: Decimal,

    /// 排隊與搬運時間（僅供參考，不佔用產能）
    pub queue_move_hours: Decimal,

    /// 需求工時 = 準備 + 加工
    pub required_hours: Decimal,

    /// 可用工時（日曆 × 效率）
    pub available_hours: Decimal,

    /// 負荷率（%）；可用工時為 0 時無意義
    pub load_percent: Option<Decimal>,

    /// 可用 - 需求
    pub variance: Decimal,

    pub overloaded: bool,

    pub operation_count: usize,
}

impl CapacityRequirement {
    pub fn new(
        work_center_id: impl Into<String>,
        period_start: NaiveDate,
        period_end: NaiveDate,
        available_hours: Decimal,
    ) -> Self {
        Self {
            work_center_id: work_center_id.into(),
            period_start,
            period_end,
            setup_hours: Decimal::ZERO,
            run_hours: Decimal::ZERO,
            queue_move_hours: Decimal::ZERO,
            required_hours: Decimal::ZERO,
            available_hours,
            load_percent: None,
            variance: available_hours,
            overloaded: false,
            operation_count: 0,
        }
    }

    /// 累加一筆工序負荷
    pub fn add_load(&mut self, load: &OperationLoad, queue_move_hours: Decimal) {
        self.setup_hours += load.setup_hours;
        self.run_hours += load.run_hours;
        self.queue_move_hours += queue_move_hours;
        self.operation_count += 1;
    }

    /// 依累計工時計算負荷率與差異
    pub fn finalize(&mut self, overload_threshold: Decimal) {
        self.required_hours = self.setup_hours + self.run_hours;
        self.variance = self.available_hours - self.required_hours;
        self.load_percent = if self.available_hours > Decimal::ZERO {
            Some(self.required_hours / self.available_hours * Decimal::ONE_HUNDRED)
        } else {
            None
        };
        self.overloaded = match self.load_percent {
            Some(load) => load > overload_threshold,
            None => self.required_hours > Decimal::ZERO,
        };
    }

    /// 產能不足工時
    pub fn shortage_hours(&self) -> Decimal {
        (-self.variance).max(Decimal::ZERO)
    }
}

/// 計算完成後寫入產能計劃的結果
#[derive(Debug, Clone, Default)]
pub struct CapacityRecords {
    pub requirements: Vec<CapacityRequirement>,
    pub operation_loads: Vec<OperationLoad>,
    pub exceptions: Vec<Exception>,
}

/// 產能計劃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityPlan {
    pub id: Uuid,
    pub name: String,

    /// 來源 MRP 計劃（僅記錄 ID）
    pub source_plan_id: Option<Uuid>,

    pub scope: PlanScope,
    pub status: PlanStatus,

    pub requirements: Vec<CapacityRequirement>,
    pub operation_loads: Vec<OperationLoad>,
    pub exceptions: Vec<Exception>,

    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CapacityPlan {
    pub fn new(name: impl Into<String>, scope: PlanScope) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source_plan_id: None,
            scope,
            status: PlanStatus::Draft,
            requirements: Vec::new(),
            operation_loads: Vec::new(),
            exceptions: Vec::new(),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 建構器模式：設置來源 MRP 計劃
    pub fn from_mrp_plan(mut self, plan_id: Uuid) -> Self {
        self.source_plan_id = Some(plan_id);
        self
    }

    fn transition(&mut self, to: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(MrpError::InvalidTransition {
                entity: "CapacityPlan",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn begin_calculation(&mut self) -> Result<()> {
        self.transition(PlanStatus::Calculating)
    }

    pub fn complete(&mut self, records: CapacityRecords) -> Result<()> {
        self.transition(PlanStatus::Completed)?;
        self.requirements = records.requirements;
        self.operation_loads = records.operation_loads;
        self.exceptions = records.exceptions;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, cause: impl Into<String>) -> Result<()> {
        self.transition(PlanStatus::Error)?;
        self.requirements.clear();
        self.operation_loads.clear();
        self.exceptions.clear();
        self.error = Some(cause.into());
        Ok(())
    }

    pub fn resolve_exception(
        &mut self,
        exception_id: Uuid,
        resolved_by: impl Into<String>,
        note: Option<String>,
    ) -> Result<()> {
        if self.status != PlanStatus::Completed {
            return Err(MrpError::PlanNotMutable {
                plan_id: self.id,
                status: self.status.to_string(),
            });
        }
        let exception = self
            .exceptions
            .iter_mut()
            .find(|e| e.id == exception_id)
            .ok_or(MrpError::ExceptionNotFound(exception_id))?;
        exception.resolve(resolved_by, note);
        Ok(())
    }

    pub fn requirement_for(
        &self,
        work_center_id: &str,
        period_start: NaiveDate,
    ) -> Option<&CapacityRequirement> {
        self.requirements
            .iter()
            .find(|r| r.work_center_id == work_center_id && r.period_start == period_start)
    }

    pub fn overloaded(&self) -> impl Iterator<Item = &CapacityRequirement> {
        self.requirements.iter().filter(|r| r.overloaded)
    }

    pub fn total_required_hours(&self) -> Decimal {
        self.requirements.iter().map(|r| r.required_hours).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BucketGranularity;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn load(hours: i64) -> OperationLoad {
        OperationLoad {
            order_id: Uuid::new_v4(),
            item_id: "BIKE".to_string(),
            operation_sequence: 10,
            work_center_id: "WELD".to_string(),
            start_date: date(3),
            end_date: date(5),
            period_start: date(3),
            setup_hours: Decimal::ONE,
            run_hours: Decimal::from(hours - 1),
        }
    }

    #[test]
    fn test_requirement_load_percent() {
        let mut req = CapacityRequirement::new("WELD", date(3), date(9), Decimal::from(40));
        req.add_load(&load(25), Decimal::ZERO);
        req.add_load(&load(25), Decimal::ZERO);
        req.finalize(Decimal::ONE_HUNDRED);

        assert_eq!(req.required_hours, Decimal::from(50));
        assert_eq!(req.load_percent, Some(Decimal::from(125)));
        assert_eq!(req.variance, Decimal::from(-10));
        assert_eq!(req.shortage_hours(), Decimal::from(10));
        assert_eq!(req.operation_count, 2);
        assert!(req.overloaded);
    }

    #[test]
    fn test_queue_and_move_reported_but_not_loaded() {
        let mut req = CapacityRequirement::new("WELD", date(3), date(9), Decimal::from(40));
        req.add_load(&load(20), Decimal::from(6));
        req.finalize(Decimal::ONE_HUNDRED);

        assert_eq!(req.queue_move_hours, Decimal::from(6));
        assert_eq!(req.required_hours, Decimal::from(20));
        assert_eq!(req.load_percent, Some(Decimal::from(50)));
    }

    #[test]
    fn test_zero_available_has_no_load_percent() {
        let mut req = CapacityRequirement::new("WELD", date(8), date(8), Decimal::ZERO);
        req.finalize(Decimal::ONE_HUNDRED);
        assert_eq!(req.load_percent, None);
        assert!(!req.overloaded);

        req.add_load(&load(4), Decimal::ZERO);
        req.finalize(Decimal::ONE_HUNDRED);
        assert_eq!(req.load_percent, None);
        assert!(req.overloaded);
    }

    #[test]
    fn test_capacity_plan_lifecycle() {
        let scope = PlanScope::new(date(3), date(30), BucketGranularity::Week);
        let source = Uuid::new_v4();
        let mut plan = CapacityPlan::new("CRP-W45", scope).from_mrp_plan(source);

        assert!(plan.complete(CapacityRecords::default()).is_err());
        plan.begin_calculation().unwrap();
        plan.complete(CapacityRecords {
            operation_loads: vec![load(25)],
            ..CapacityRecords::default()
        })
        .unwrap();

        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.source_plan_id, Some(source));
        assert_eq!(plan.operation_loads[0].hours(), Decimal::from(25));
        assert!(plan.fail("late").is_err());
    }
}
