//! MRP 主計算器

use chrono::NaiveDate;
use mrp_core::{
    ExceptionType, Item, MrpError, MrpPlan, PlanScope, PlannedOrder, PlanningConfig,
    PlanningSnapshot, Requirement, Result, WorkCalendar,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::aggregation::{DemandAggregator, DemandSeries};
use crate::bom_graph::BomGraph;
use crate::bucketing::BucketSet;
use crate::exceptions::{ExceptionDetector, ItemExceptionInput};
use crate::lead_time::OrderOffsetting;
use crate::netting::{NettingCalculator, NettingInput};
use crate::{ComponentMrpResult, MrpResult};

/// 取消旗標：只在層級屏障檢查
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 淨改變計算：未受影響的物料沿用上一版計劃的結果
#[derive(Debug, Clone, Copy)]
pub struct CarryForward<'a> {
    pub prior: &'a MrpPlan,
    /// 需要重新計算的物料
    pub dirty: &'a BTreeSet<String>,
}

impl CarryForward<'_> {
    fn carries(&self, item_id: &str) -> bool {
        !self.dirty.contains(item_id)
            && self.prior.requirements.iter().any(|r| r.item_id == item_id)
    }
}

/// 單層計算共用的唯讀資料
struct LevelContext<'a> {
    buckets: &'a BucketSet,
    series: &'a BTreeMap<String, DemandSeries>,
    receipts: &'a HashMap<String, Vec<Decimal>>,
    firmed: &'a HashMap<String, Vec<PlannedOrder>>,
    balances: &'a HashMap<String, Decimal>,
    offsetting: &'a OrderOffsetting<'a>,
    carry: Option<CarryForward<'a>>,
    plan_start: NaiveDate,
}

/// MRP 計算器
pub struct MrpCalculator {
    /// 計劃快照（計算期間唯讀）
    snapshot: PlanningSnapshot,

    /// 物料主檔（已填入低階碼）
    items: HashMap<String, Item>,

    /// BOM 圖
    graph: BomGraph,

    /// 物料工作日曆
    calendars: HashMap<String, WorkCalendar>,

    config: PlanningConfig,
}

impl MrpCalculator {
    /// 創建新的 MRP 計算器
    ///
    /// 輸入完整性檢查（批量參數、未知物料、BOM 循環）在此完成，任何輸出產生前即失敗。
    pub fn new(snapshot: PlanningSnapshot, config: PlanningConfig) -> Result<Self> {
        for item in &snapshot.items {
            item.validate()?;
        }

        let graph = BomGraph::build(&snapshot.items, &snapshot.bom_lines)?;

        let items = snapshot
            .items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.low_level_code = graph.low_level_code(&item.item_id).unwrap_or(0);
                (item.item_id.clone(), item)
            })
            .collect();

        let calendars = snapshot
            .calendars
            .iter()
            .map(|c| (c.calendar_id.clone(), c.clone()))
            .collect();

        Ok(Self {
            snapshot,
            items,
            graph,
            calendars,
            config,
        })
    }

    pub fn graph(&self) -> &BomGraph {
        &self.graph
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &PlanningSnapshot {
        &self.snapshot
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.get(item_id)
    }

    /// 執行計劃：Draft → Calculating → Completed | Error
    #[tracing::instrument(skip_all, fields(plan = %plan.name, plan_id = %plan.id))]
    pub fn execute(&self, plan: &mut MrpPlan, cancel: &CancellationToken) -> Result<()> {
        self.run(plan, None, cancel)
    }

    /// 淨改變執行：只重算 dirty 物料
    #[tracing::instrument(skip_all, fields(plan = %plan.name, dirty = carry.dirty.len()))]
    pub fn execute_net_change(
        &self,
        plan: &mut MrpPlan,
        carry: CarryForward<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run(plan, Some(carry), cancel)
    }

    fn run(
        &self,
        plan: &mut MrpPlan,
        carry: Option<CarryForward<'_>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        plan.begin_calculation()?;

        match self.calculate_with(&plan.scope, carry, cancel) {
            Ok(result) => {
                tracing::info!(
                    "MRP 計劃 {} 完成：時間桶記錄 {} 筆，計劃訂單 {} 筆，例外 {} 筆",
                    plan.name,
                    result.requirements.len(),
                    result.planned_orders.len(),
                    result.exceptions.len()
                );
                plan.complete(result.into_records())
            }
            Err(err) => {
                tracing::warn!("MRP 計劃 {} 計算失敗: {}", plan.name, err);
                plan.fail(err.to_string())?;
                Err(err)
            }
        }
    }

    /// 主 MRP 計算入口
    pub fn calculate(&self, scope: &PlanScope, cancel: &CancellationToken) -> Result<MrpResult> {
        self.calculate_with(scope, None, cancel)
    }

    /// 依低階碼逐層計算；同層物料並行，層與層之間合併相依需求
    #[tracing::instrument(skip_all, fields(start = %scope.start_date, end = %scope.end_date))]
    pub fn calculate_with(
        &self,
        scope: &PlanScope,
        carry: Option<CarryForward<'_>>,
        cancel: &CancellationToken,
    ) -> Result<MrpResult> {
        tracing::info!(
            "開始 MRP 計算：物料 {} 筆，需求 {} 筆，供應 {} 筆，確認訂單 {} 筆",
            self.items.len(),
            self.snapshot.demands.len(),
            self.snapshot.scheduled_receipts.len(),
            self.snapshot.firmed_orders.len()
        );
        let start_time = std::time::Instant::now();

        // Step 1: 時間分桶與計劃範圍
        scope.validate()?;
        let buckets = BucketSet::build(scope)?;
        let planned_items = self.planning_set(scope)?;
        tracing::debug!(
            "Step 1: 時間桶 {} 個，計劃物料 {} 個",
            buckets.len(),
            planned_items.len()
        );

        // Step 2: 獨立需求彙總
        let item_refs: HashMap<&str, &Item> =
            self.items.iter().map(|(id, item)| (id.as_str(), item)).collect();
        let aggregator = DemandAggregator::new(&buckets);
        let mut series = aggregator.aggregate(&self.snapshot.demands, &item_refs)?;

        // Step 3: 供應與期初庫存
        let receipts = self.group_receipts(&buckets)?;
        let firmed = self.group_firmed_orders()?;
        let balances = self.snapshot.opening_balances();
        let offsetting = OrderOffsetting::new(
            scope.start_date,
            self.config.include_lead_times,
            &self.calendars,
        );

        // Step 4: 依低階碼分層
        let levels: Vec<Vec<String>> = self
            .graph
            .levels()
            .into_iter()
            .map(|level| {
                level
                    .into_iter()
                    .filter(|id| planned_items.contains(id))
                    .collect::<Vec<_>>()
            })
            .filter(|level| !level.is_empty())
            .collect();

        // Step 5: 逐層計算
        let mut result = MrpResult::empty();
        for (level, level_items) in levels.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("MRP 計算於第 {} 層屏障取消", level);
                return Err(MrpError::Cancelled {
                    level: level as u32,
                });
            }
            tracing::debug!("Step 5: 第 {} 層，{} 個物料", level, level_items.len());

            let ctx = LevelContext {
                buckets: &buckets,
                series: &series,
                receipts: &receipts,
                firmed: &firmed,
                balances: &balances,
                offsetting: &offsetting,
                carry,
                plan_start: scope.start_date,
            };
            let plan_one = |item_id: &String| self.plan_item(item_id, &ctx);
            let outcomes: Vec<ComponentMrpResult> = if self.config.parallel {
                level_items.par_iter().map(plan_one).collect::<Result<_>>()?
            } else {
                level_items.iter().map(plan_one).collect::<Result<_>>()?
            };

            // 屏障：單執行緒合併下一層的相依需求
            for outcome in outcomes {
                for demand in &outcome.dependent_demands {
                    aggregator.push(&mut series, demand);
                }
                result.absorb(outcome);
            }
        }

        result.level_sequence = levels;
        result.calculation_time_ms = Some(start_time.elapsed().as_millis());

        tracing::info!(
            "MRP 計算完成，耗時 {:?}，計劃訂單數量: {}",
            start_time.elapsed(),
            result.planned_orders.len()
        );

        Ok(result)
    }

    /// 計劃範圍：指定物料及其所有 BOM 子孫；未指定則為全部物料
    fn planning_set(&self, scope: &PlanScope) -> Result<BTreeSet<String>> {
        match &scope.items {
            None => Ok(self.items.keys().cloned().collect()),
            Some(selected) => {
                if let Some(unknown) = selected.iter().find(|id| !self.items.contains_key(*id)) {
                    return Err(MrpError::unknown_item(unknown, "計劃範圍"));
                }
                let mut closure = selected.clone();
                closure.extend(self.graph.descendants_of(selected.iter().map(String::as_str)));
                Ok(closure)
            }
        }
    }

    /// 預計收貨依物料、時間桶分組（時界外的收貨不計入）
    fn group_receipts(&self, buckets: &BucketSet) -> Result<HashMap<String, Vec<Decimal>>> {
        let mut grouped: HashMap<String, Vec<Decimal>> = HashMap::new();
        for supply in &self.snapshot.scheduled_receipts {
            if !self.items.contains_key(&supply.item_id) {
                return Err(MrpError::unknown_item(
                    &supply.item_id,
                    format!("預計收貨 {}", supply.id),
                ));
            }
            if let Some(bucket) = buckets.bucket_for(supply.available_date) {
                grouped
                    .entry(supply.item_id.clone())
                    .or_insert_with(|| vec![Decimal::ZERO; buckets.len()])[bucket] +=
                    supply.quantity;
            }
        }
        Ok(grouped)
    }

    /// 已確認/已下達訂單依物料分組（依到期日排序）
    fn group_firmed_orders(&self) -> Result<HashMap<String, Vec<PlannedOrder>>> {
        let mut grouped: HashMap<String, Vec<PlannedOrder>> = HashMap::new();
        for order in self.snapshot.firmed_orders.iter().filter(|o| o.is_committed()) {
            if !self.items.contains_key(&order.item_id) {
                return Err(MrpError::unknown_item(
                    &order.item_id,
                    format!("確認訂單 {}", order.id),
                ));
            }
            grouped
                .entry(order.item_id.clone())
                .or_default()
                .push(order.clone());
        }
        for orders in grouped.values_mut() {
            orders.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        }
        Ok(grouped)
    }

    /// 單物料 MRP 計算
    fn plan_item(&self, item_id: &str, ctx: &LevelContext<'_>) -> Result<ComponentMrpResult> {
        let item = self
            .items
            .get(item_id)
            .ok_or_else(|| MrpError::unknown_item(item_id, "計劃範圍"))?;
        let consumption = self.config.forecast_consumption;
        let bucket_count = ctx.buckets.len();

        let series = ctx.series.get(item_id);
        let overflow = series
            .map(|s| s.overflow_quantity(consumption))
            .unwrap_or_default();

        if let Some(carry) = ctx.carry.filter(|c| c.carries(item_id)) {
            return self.carry_item(item, carry, ctx, overflow);
        }

        let gross = series
            .map(|s| s.gross(consumption))
            .unwrap_or_else(|| vec![Decimal::ZERO; bucket_count]);
        let scheduled = ctx
            .receipts
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| vec![Decimal::ZERO; bucket_count]);
        let firmed_orders: &[PlannedOrder] =
            ctx.firmed.get(item_id).map(Vec::as_slice).unwrap_or(&[]);
        let firmed_receipts = Self::firmed_receipts(firmed_orders, ctx.buckets);

        let input = NettingInput {
            item,
            buckets: ctx.buckets,
            gross: &gross,
            scheduled_receipts: &scheduled,
            firmed_receipts: &firmed_receipts,
            opening_balance: ctx.balances.get(item_id).copied().unwrap_or_default(),
            safety_stock: if self.config.include_safety_stock {
                item.safety_stock
            } else {
                Decimal::ZERO
            },
        };

        // 淨需求 + 批量
        let netting = NettingCalculator::calculate(&input);
        let mut requirements = netting.requirements;

        // 訂單偏置：確認訂單原樣保留，新訂單依時間桶起始日為需求日
        let reserved_ids: HashSet<uuid::Uuid> = firmed_orders.iter().map(|o| o.id).collect();
        let mut sequence: HashMap<NaiveDate, usize> = HashMap::new();
        let mut orders: Vec<PlannedOrder> = firmed_orders.to_vec();
        for receipt in &netting.receipts {
            let Some(due_date) = ctx.buckets.start_of(receipt.bucket) else {
                continue;
            };
            let seq = sequence.entry(due_date).or_insert(0);
            while reserved_ids.contains(&PlannedOrder::planned_id(item_id, due_date, *seq)) {
                *seq += 1;
            }
            orders.push(ctx.offsetting.schedule(item, due_date, receipt.quantity, *seq));
            *seq += 1;
        }
        Self::fill_releases(&mut requirements, &orders, ctx.buckets);

        // 例外
        let checks = NettingCalculator::check_firmed_orders(&input, firmed_orders);
        let mut exceptions = ExceptionDetector::detect_item(
            &ItemExceptionInput {
                item,
                requirements: &requirements,
                orders: &orders,
                overflow_demand: overflow,
            },
            &self.config,
            ctx.plan_start,
        );
        exceptions.extend(ExceptionDetector::firmed_order_changes(&checks));

        // BOM 展開
        let dependent_demands = self.explode_orders(item, &orders, ctx.offsetting)?;

        tracing::debug!(
            "物料 {} (低階碼 {}) 計劃訂單: {} 筆，相依需求: {} 筆",
            item_id,
            item.low_level_code,
            orders.len(),
            dependent_demands.len()
        );

        Ok(ComponentMrpResult {
            item_id: item_id.to_string(),
            requirements,
            planned_orders: orders,
            exceptions,
            dependent_demands,
        })
    }

    /// 沿用上一版計劃：記錄與訂單照舊，仍展開給子件
    fn carry_item(
        &self,
        item: &Item,
        carry: CarryForward<'_>,
        ctx: &LevelContext<'_>,
        overflow: Decimal,
    ) -> Result<ComponentMrpResult> {
        let prior = carry.prior;
        let requirements: Vec<Requirement> = prior.requirements_for(&item.item_id).cloned().collect();
        let orders: Vec<PlannedOrder> = prior
            .orders_for(&item.item_id)
            .filter(|o| o.is_open())
            .cloned()
            .collect();

        let mut exceptions = ExceptionDetector::detect_item(
            &ItemExceptionInput {
                item,
                requirements: &requirements,
                orders: &orders,
                overflow_demand: overflow,
            },
            &self.config,
            ctx.plan_start,
        );
        exceptions.extend(
            prior
                .exceptions
                .iter()
                .filter(|e| e.item_id.as_deref() == Some(item.item_id.as_str()))
                .filter(|e| {
                    matches!(
                        e.exception_type,
                        ExceptionType::OrderQuantityChange | ExceptionType::OrderDateChange
                    )
                })
                .map(|e| e.carried_forward()),
        );

        let dependent_demands = self.explode_orders(item, &orders, ctx.offsetting)?;
        tracing::debug!("物料 {} 未受影響，沿用上一版計劃", item.item_id);

        Ok(ComponentMrpResult {
            item_id: item.item_id.clone(),
            requirements,
            planned_orders: orders,
            exceptions,
            dependent_demands,
        })
    }

    fn explode_orders(
        &self,
        item: &Item,
        orders: &[PlannedOrder],
        offsetting: &OrderOffsetting<'_>,
    ) -> Result<Vec<mrp_core::Demand>> {
        let mut demands = Vec::new();
        for order in orders.iter().filter(|o| o.is_open()) {
            demands.extend(offsetting.explode(&self.graph, item, order)?);
        }
        Ok(demands)
    }

    fn firmed_receipts(orders: &[PlannedOrder], buckets: &BucketSet) -> Vec<Decimal> {
        let mut receipts = vec![Decimal::ZERO; buckets.len()];
        for order in orders {
            if let Some(bucket) = buckets.bucket_for(order.due_date) {
                receipts[bucket] += order.quantity;
            }
        }
        receipts
    }

    /// 計劃訂單下達量依下達日落入時間桶
    fn fill_releases(requirements: &mut [Requirement], orders: &[PlannedOrder], buckets: &BucketSet) {
        for order in orders {
            if let Some(record) = buckets
                .bucket_for(order.release_date)
                .and_then(|b| requirements.get_mut(b))
            {
                record.planned_order_release += order.quantity;
            }
        }
    }
}

/// 重算前沿用上一版計劃的確認/已下達訂單（以 ID 去重）
pub fn carry_committed_orders(snapshot: &mut PlanningSnapshot, prior: &MrpPlan) {
    let known: HashSet<uuid::Uuid> = snapshot.firmed_orders.iter().map(|o| o.id).collect();
    let carried: Vec<PlannedOrder> = prior
        .committed_orders()
        .into_iter()
        .filter(|o| !known.contains(&o.id))
        .collect();
    tracing::debug!("沿用上一版計劃的確認訂單 {} 筆", carried.len());
    snapshot.firmed_orders.extend(carried);
}
