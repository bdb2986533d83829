//! 產能需求計算

use mrp_calc::{BucketSet, ExceptionDetector, TimeBucket};
use mrp_core::{
    CapacityConfig, CapacityPlan, CapacityRecords, CapacityRequirement, Item, MrpError, MrpPlan,
    OperationLoad, PlanScope, PlannedOrder, PlannedOrderStatus, PlanningSnapshot, Result, Routing,
    WorkCenter,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::scheduling::OperationScheduler;

/// 一筆工序負荷及其等候/搬運時間
type LoadEntry = (OperationLoad, Decimal);

/// 產能計劃器
pub struct CapacityPlanner<'a> {
    routings: HashMap<&'a str, &'a Routing>,
    work_centers: HashMap<&'a str, &'a WorkCenter>,
    config: CapacityConfig,
}

impl<'a> CapacityPlanner<'a> {
    pub fn new(snapshot: &'a PlanningSnapshot, config: CapacityConfig) -> Self {
        Self {
            routings: snapshot.routing_map(),
            work_centers: snapshot.work_center_map(),
            config,
        }
    }

    pub fn config(&self) -> &CapacityConfig {
        &self.config
    }

    /// 計算前的主檔檢查
    ///
    /// 工藝路線引用的工作中心必須存在；嚴格模式下每個啟用 MRP 的自製物料都要有工藝路線。
    pub fn validate_routings<'i>(&self, items: impl IntoIterator<Item = &'i Item>) -> Result<()> {
        let mut routings: Vec<&Routing> = self.routings.values().copied().collect();
        routings.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        for routing in routings {
            if let Some(op) = routing
                .operations
                .iter()
                .find(|op| !self.work_centers.contains_key(op.work_center_id.as_str()))
            {
                return Err(MrpError::UnknownWorkCenter(op.work_center_id.clone()));
            }
        }

        if self.config.strict_routing {
            let mut missing: Vec<&str> = items
                .into_iter()
                .filter(|item| item.is_make() && item.mrp_enabled)
                .filter(|item| {
                    self.routings
                        .get(item.item_id.as_str())
                        .map_or(true, |r| r.is_empty())
                })
                .map(|item| item.item_id.as_str())
                .collect();
            missing.sort_unstable();
            if let Some(item_id) = missing.first() {
                return Err(MrpError::MissingRouting((*item_id).to_string()));
            }
        }

        Ok(())
    }

    /// 以 MRP 計劃的期間與配置的粒度建立草稿產能計劃
    pub fn draft_plan(&self, mrp_plan: &MrpPlan, name: impl Into<String>) -> CapacityPlan {
        let scope = PlanScope::new(
            mrp_plan.scope.start_date,
            mrp_plan.scope.end_date,
            self.config.granularity,
        );
        CapacityPlan::new(name, scope).from_mrp_plan(mrp_plan.id)
    }

    /// 執行產能計劃：Draft → Calculating → Completed | Error
    #[tracing::instrument(skip_all, fields(mrp_plan = %mrp_plan.name, capacity_plan = %plan.name))]
    pub fn execute(&self, mrp_plan: &MrpPlan, plan: &mut CapacityPlan) -> Result<()> {
        plan.begin_calculation()?;

        match self.calculate(mrp_plan, &plan.scope) {
            Ok(records) => {
                tracing::info!(
                    "產能計劃 {} 完成：負荷記錄 {} 筆，工序 {} 筆，例外 {} 筆",
                    plan.name,
                    records.requirements.len(),
                    records.operation_loads.len(),
                    records.exceptions.len()
                );
                plan.complete(records)
            }
            Err(err) => {
                tracing::warn!("產能計劃 {} 計算失敗: {}", plan.name, err);
                plan.fail(err.to_string())?;
                Err(err)
            }
        }
    }

    /// 計算各工作中心各期負荷
    pub fn calculate(&self, mrp_plan: &MrpPlan, scope: &PlanScope) -> Result<CapacityRecords> {
        if !mrp_plan.is_completed() {
            return Err(MrpError::PlanNotCompleted {
                plan_id: mrp_plan.id,
                status: mrp_plan.status.to_string(),
            });
        }

        let start_time = std::time::Instant::now();
        scope.validate()?;
        let buckets = BucketSet::build(scope)?;

        // Step 1: 生產訂單 → 工序負荷
        let orders: Vec<&PlannedOrder> = mrp_plan
            .planned_orders
            .iter()
            .filter(|o| o.is_production())
            .filter(|o| {
                matches!(
                    o.status,
                    PlannedOrderStatus::Planned
                        | PlannedOrderStatus::Firmed
                        | PlannedOrderStatus::Released
                )
            })
            .collect();
        tracing::debug!("Step 1: 生產訂單 {} 筆", orders.len());

        let loads = self.load_operations(&orders, &buckets)?;

        // Step 2: 依工作中心彙總（各工作中心並行）
        let mut by_center: BTreeMap<&str, Vec<&LoadEntry>> = BTreeMap::new();
        for entry in &loads {
            by_center
                .entry(entry.0.work_center_id.as_str())
                .or_default()
                .push(entry);
        }

        let mut centers: Vec<&WorkCenter> = self.work_centers.values().copied().collect();
        centers.sort_by(|a, b| a.id.cmp(&b.id));

        let requirements: Vec<CapacityRequirement> = centers
            .par_iter()
            .map(|center| {
                let center_loads = by_center
                    .get(center.id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                self.work_center_requirements(center, &buckets, center_loads)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();
        tracing::debug!("Step 2: 工作中心 {} 個，負荷記錄 {} 筆", centers.len(), requirements.len());

        // Step 3: 產能例外
        let exceptions = ExceptionDetector::capacity(&requirements, &self.config);

        tracing::info!(
            "產能計算完成，耗時 {:?}，超載期間: {}",
            start_time.elapsed(),
            requirements.iter().filter(|r| r.overloaded).count()
        );

        Ok(CapacityRecords {
            requirements,
            operation_loads: loads.into_iter().map(|(load, _)| load).collect(),
            exceptions,
        })
    }

    /// 排程各訂單的工序，負荷歸入工序開始日所在的時間桶
    fn load_operations(&self, orders: &[&PlannedOrder], buckets: &BucketSet) -> Result<Vec<LoadEntry>> {
        let scheduler = OperationScheduler::new(
            &self.work_centers,
            self.config.scheduling_direction,
            self.config.include_setup_times,
        );

        let mut loads = Vec::new();
        for order in orders {
            let Some(routing) = self
                .routings
                .get(order.item_id.as_str())
                .filter(|r| !r.is_empty())
            else {
                if self.config.strict_routing {
                    return Err(MrpError::MissingRouting(order.item_id.clone()));
                }
                tracing::debug!("物料 {} 無工藝路線，略過訂單 {}", order.item_id, order.id);
                continue;
            };

            for op in scheduler.schedule(order, routing)? {
                let Some(period_start) = buckets
                    .bucket_for(op.start_date)
                    .and_then(|b| buckets.start_of(b))
                else {
                    tracing::debug!(
                        "訂單 {} 工序 {} 開工日 {} 超出計劃期間，不計負荷",
                        order.id,
                        op.operation.sequence,
                        op.start_date
                    );
                    continue;
                };

                loads.push((
                    OperationLoad {
                        order_id: order.id,
                        item_id: order.item_id.clone(),
                        operation_sequence: op.operation.sequence,
                        work_center_id: op.operation.work_center_id.clone(),
                        start_date: op.start_date,
                        end_date: op.end_date,
                        period_start,
                        setup_hours: op.setup_hours,
                        run_hours: op.run_hours,
                    },
                    op.queue_move_hours,
                ));
            }
        }

        Ok(loads)
    }

    fn available_hours(&self, center: &WorkCenter, bucket: &TimeBucket) -> Decimal {
        let hours = center
            .calendar
            .available_hours(bucket.start, bucket.end_exclusive());
        if self.config.include_efficiency {
            hours * center.efficiency
        } else {
            hours
        }
    }

    fn work_center_requirements(
        &self,
        center: &WorkCenter,
        buckets: &BucketSet,
        loads: &[&LoadEntry],
    ) -> Vec<CapacityRequirement> {
        buckets
            .iter()
            .map(|bucket| {
                let mut requirement = CapacityRequirement::new(
                    center.id.clone(),
                    bucket.start,
                    bucket.end,
                    self.available_hours(center, bucket),
                );
                for (load, queue_move) in loads.iter().copied().filter(|(l, _)| l.period_start == bucket.start) {
                    requirement.add_load(load, *queue_move);
                }
                requirement.finalize(self.config.overload_threshold);
                requirement
            })
            .collect()
    }
}
