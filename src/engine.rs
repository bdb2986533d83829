//! 端到端計劃流程：快照 → MRP → CRP → 批次寫入

use mrp_cache::{DirtyTracker, IncrementalCalculator};
use mrp_calc::calculator::carry_committed_orders;
use mrp_calc::{CancellationToken, MrpCalculator};
use mrp_capacity::CapacityPlanner;
use mrp_core::{
    CapacityConfig, CapacityPlan, MrpError, MrpPlan, PlanRepository, PlanScope, PlanStatus,
    PlanType, PlannedOrderStatus, PlanningConfig, PlanningSnapshot, Result,
};
use uuid::Uuid;

/// 一次計劃執行的結果
#[derive(Debug, Clone)]
pub struct PlanRun {
    pub mrp: MrpPlan,
    /// 未設定產能配置時為 None
    pub capacity: Option<CapacityPlan>,
}

/// 計劃引擎
pub struct PlanningEngine<R> {
    repository: R,
    planning: PlanningConfig,
    capacity: Option<CapacityConfig>,
}

impl<R: PlanRepository> PlanningEngine<R> {
    pub fn new(repository: R, planning: PlanningConfig) -> Self {
        Self {
            repository,
            planning,
            capacity: None,
        }
    }

    /// 建構器模式：MRP 完成後接著計算產能
    pub fn with_capacity(mut self, config: CapacityConfig) -> Self {
        self.capacity = Some(config);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// 全面重算
    ///
    /// 最近一次完成計劃中的確認/已下達訂單會帶入本次計算。
    #[tracing::instrument(skip_all, fields(name = %name))]
    pub fn run(&self, name: &str, scope: PlanScope, cancel: &CancellationToken) -> Result<PlanRun> {
        let prior = self.repository.latest_completed()?;
        let snapshot = self.prepare_snapshot(prior.as_ref())?;
        let mut plan = MrpPlan::new(name, scope, PlanType::Regenerative);
        if let Some(prior) = &prior {
            plan = plan.superseding(prior.id);
        }

        self.finish(snapshot, plan, None, cancel)
    }

    /// 淨改變：只重算 tracker 標記的物料及其子孫
    ///
    /// 沒有已完成的計劃時改為全面重算；期間與上一版不同時所有物料都會重算。
    #[tracing::instrument(skip_all, fields(name = %name, dirty = tracker.len()))]
    pub fn net_change(
        &self,
        name: &str,
        scope: PlanScope,
        tracker: &DirtyTracker,
        cancel: &CancellationToken,
    ) -> Result<PlanRun> {
        let Some(prior) = self.repository.latest_completed()? else {
            tracing::info!("沒有已完成的計劃可沿用，改為全面重算");
            let snapshot = self.repository.load_snapshot()?;
            let plan = MrpPlan::new(name, scope, PlanType::Regenerative);
            return self.finish(snapshot, plan, None, cancel);
        };

        let snapshot = self.prepare_snapshot(Some(&prior))?;
        let plan = MrpPlan::new(name, scope, PlanType::NetChange).superseding(prior.id);
        self.finish(snapshot, plan, Some((&prior, tracker)), cancel)
    }

    /// 更新已儲存計劃中的訂單狀態並寫回
    pub fn update_order_status(
        &self,
        plan_id: Uuid,
        order_id: Uuid,
        to: PlannedOrderStatus,
    ) -> Result<MrpPlan> {
        let mut plan = self
            .repository
            .load_plan(plan_id)?
            .ok_or_else(|| MrpError::Persistence(format!("找不到計劃 {plan_id}")))?;
        plan.update_order_status(order_id, to)?;
        self.repository.save_batch(&plan, None)?;
        tracing::info!("計劃 {} 訂單 {} 狀態更新為 {}", plan_id, order_id, to);
        Ok(plan)
    }

    fn prepare_snapshot(&self, prior: Option<&MrpPlan>) -> Result<PlanningSnapshot> {
        let mut snapshot = self.repository.load_snapshot()?;
        if let Some(prior) = prior {
            carry_committed_orders(&mut snapshot, prior);
        }
        Ok(snapshot)
    }

    fn check_capacity_master(&self, snapshot: &PlanningSnapshot) -> Result<()> {
        match &self.capacity {
            Some(config) => {
                CapacityPlanner::new(snapshot, config.clone()).validate_routings(&snapshot.items)
            }
            None => Ok(()),
        }
    }

    fn finish(
        &self,
        snapshot: PlanningSnapshot,
        mut plan: MrpPlan,
        incremental: Option<(&MrpPlan, &DirtyTracker)>,
        cancel: &CancellationToken,
    ) -> Result<PlanRun> {
        // 完整性錯誤（含產能主檔）在計算前即出現，計劃直接轉為 Error 並保留訊息
        let checked = MrpCalculator::new(snapshot, self.planning.clone()).and_then(|calculator| {
            self.check_capacity_master(calculator.snapshot())?;
            Ok(calculator)
        });
        let calculator = match checked {
            Ok(calculator) => calculator,
            Err(err) => {
                tracing::warn!("計劃 {} 輸入資料檢查失敗: {}", plan.name, err);
                plan.begin_calculation()?;
                plan.fail(err.to_string())?;
                self.repository.save_batch(&plan, None)?;
                return Err(err);
            }
        };

        let outcome = match incremental {
            Some((prior, tracker)) => {
                IncrementalCalculator::new(&calculator).execute(&mut plan, prior, tracker, cancel)
            }
            None => calculator.execute(&mut plan, cancel),
        };
        if let Err(err) = outcome {
            if plan.status == PlanStatus::Error {
                self.repository.save_batch(&plan, None)?;
            }
            return Err(err);
        }

        let capacity = match &self.capacity {
            Some(config) => {
                let planner = CapacityPlanner::new(calculator.snapshot(), config.clone());
                let mut capacity_plan = planner.draft_plan(&plan, format!("{} CRP", plan.name));
                if let Err(err) = planner.execute(&plan, &mut capacity_plan) {
                    self.repository.save_batch(&plan, Some(&capacity_plan))?;
                    return Err(err);
                }
                Some(capacity_plan)
            }
            None => None,
        };

        self.repository.save_batch(&plan, capacity.as_ref())?;
        tracing::info!(
            "計劃 {} 已寫入：計劃訂單 {} 筆，未處理例外 {} 筆",
            plan.name,
            plan.planned_orders.len(),
            plan.open_exception_count()
                + capacity.as_ref().map_or(0, |c| c.exceptions.len())
        );

        Ok(PlanRun {
            mrp: plan,
            capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mrp_core::{
        BomLine, BucketGranularity, Demand, DemandType, InMemoryPlanRepository, Item,
        ProcurementType, Routing, RoutingOperation, WorkCenter, WorkCenterCalendar,
    };
    use rust_decimal::Decimal;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn scope() -> PlanScope {
        PlanScope::new(date(3), date(30), BucketGranularity::Day)
    }

    fn snapshot() -> PlanningSnapshot {
        PlanningSnapshot::new(
            vec![
                Item::new("KIT", 2, ProcurementType::Make),
                Item::new("PART", 3, ProcurementType::Buy),
            ],
            vec![BomLine::new("KIT", "PART", Decimal::from(2))],
        )
        .with_demands(vec![Demand::new("KIT", Decimal::from(10), date(20), DemandType::SalesOrder)])
        .with_routings(
            vec![Routing::new(
                "KIT",
                vec![RoutingOperation::new(10, "WC-1", Decimal::ONE, Decimal::ONE)],
            )],
            vec![WorkCenter::new("WC-1", "組裝", WorkCenterCalendar::default())],
        )
    }

    fn engine(snapshot: PlanningSnapshot) -> PlanningEngine<InMemoryPlanRepository> {
        PlanningEngine::new(InMemoryPlanRepository::new(snapshot), PlanningConfig::default())
            .with_capacity(CapacityConfig::default())
    }

    #[test]
    fn test_run_persists_mrp_and_capacity_together() {
        crate::telemetry::init_test_tracing();
        let engine = engine(snapshot());

        let run = engine.run("W45", scope(), &CancellationToken::new()).unwrap();

        assert_eq!(run.mrp.status, PlanStatus::Completed);
        let capacity = run.capacity.unwrap();
        assert_eq!(capacity.status, PlanStatus::Completed);
        assert_eq!(capacity.total_required_hours(), Decimal::from(11));

        let repo = engine.repository();
        assert_eq!(repo.latest_completed().unwrap().unwrap().id, run.mrp.id);
        assert!(repo.capacity_plan_for(run.mrp.id).unwrap().is_some());
    }

    #[test]
    fn test_integrity_failure_recorded_as_error_plan() {
        let broken = snapshot().with_demands(vec![Demand::new(
            "GHOST",
            Decimal::ONE,
            date(10),
            DemandType::SalesOrder,
        )]);
        let engine = engine(broken);

        let err = engine.run("W45", scope(), &CancellationToken::new()).unwrap_err();

        assert!(err.is_integrity_error());
        assert_eq!(engine.repository().plan_count().unwrap(), 1);
        assert!(engine.repository().latest_completed().unwrap().is_none());
    }

    #[test]
    fn test_missing_routing_fails_before_any_completed_plan() {
        let mut snapshot = snapshot();
        snapshot.routings.clear();
        let engine = engine(snapshot);

        let err = engine.run("W45", scope(), &CancellationToken::new()).unwrap_err();

        assert!(matches!(err, MrpError::MissingRouting(ref item) if item == "KIT"));
        assert!(engine.repository().latest_completed().unwrap().is_none());
        assert_eq!(engine.repository().plan_count().unwrap(), 1);
    }

    #[test]
    fn test_unknown_work_center_fails_before_any_completed_plan() {
        let mut snapshot = snapshot();
        snapshot.work_centers.clear();
        let engine = engine(snapshot);

        let err = engine.run("W45", scope(), &CancellationToken::new()).unwrap_err();

        assert!(matches!(err, MrpError::UnknownWorkCenter(_)));
        assert!(engine.repository().latest_completed().unwrap().is_none());
    }

    #[test]
    fn test_firmed_orders_survive_replan() {
        let engine = engine(snapshot());
        let first = engine.run("W45", scope(), &CancellationToken::new()).unwrap();
        let kit_order = first.mrp.orders_for("KIT").next().unwrap().id;
        engine
            .update_order_status(first.mrp.id, kit_order, PlannedOrderStatus::Firmed)
            .unwrap();

        let second = engine.run("W46", scope(), &CancellationToken::new()).unwrap();

        assert_eq!(second.mrp.supersedes, Some(first.mrp.id));
        let kept = second.mrp.find_order(kit_order).unwrap();
        assert_eq!(kept.status, PlannedOrderStatus::Firmed);
        assert_eq!(second.mrp.orders_for("KIT").count(), 1);
    }

    #[test]
    fn test_net_change_supersedes_latest_plan() {
        let base = snapshot();
        let engine = engine(base.clone());
        let first = engine.run("W45", scope(), &CancellationToken::new()).unwrap();

        let mut changed = base.clone();
        changed
            .demands
            .push(Demand::new("PART", Decimal::from(4), date(12), DemandType::SalesOrder));
        let tracker = DirtyTracker::diff(&base, &changed);
        assert_eq!(tracker.dirty_items().len(), 1);
        engine.repository().replace_snapshot(changed).unwrap();

        let second = engine.net_change("W45-NC", scope(), &tracker, &CancellationToken::new()).unwrap();

        assert_eq!(second.mrp.plan_type, PlanType::NetChange);
        assert_eq!(second.mrp.supersedes, Some(first.mrp.id));
        assert_eq!(second.mrp.orders_for("PART").count(), 2);
        assert_eq!(
            second.mrp.orders_for("KIT").collect::<Vec<_>>(),
            first.mrp.orders_for("KIT").collect::<Vec<_>>()
        );
    }
}
