//! 淨改變計算

use mrp_calc::{CancellationToken, CarryForward, MrpCalculator};
use mrp_core::{MrpError, MrpPlan, PlanType, Result};
use std::collections::BTreeSet;

use crate::dirty_tracking::DirtyTracker;

/// 增量計算器：只重算受影響的物料，其餘沿用上一版已完成的計劃
pub struct IncrementalCalculator<'a> {
    calculator: &'a MrpCalculator,
}

impl<'a> IncrementalCalculator<'a> {
    pub fn new(calculator: &'a MrpCalculator) -> Self {
        Self { calculator }
    }

    /// 受影響物料（髒物料 + BOM 子孫）
    pub fn affected_items(&self, tracker: &DirtyTracker) -> BTreeSet<String> {
        tracker.expand(self.calculator.graph())
    }

    /// 建立取代上一版計劃的淨改變草稿
    pub fn draft_plan(&self, prior: &MrpPlan, name: impl Into<String>) -> MrpPlan {
        MrpPlan::new(name, prior.scope.clone(), PlanType::NetChange).superseding(prior.id)
    }

    /// 執行淨改變計算
    ///
    /// 計劃期間與上一版不同時無法沿用，所有物料改為重算。
    #[tracing::instrument(skip_all, fields(prior = %prior.id, dirty = tracker.len()))]
    pub fn execute(
        &self,
        plan: &mut MrpPlan,
        prior: &MrpPlan,
        tracker: &DirtyTracker,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !prior.is_completed() {
            return Err(MrpError::PlanNotCompleted {
                plan_id: prior.id,
                status: prior.status.to_string(),
            });
        }

        let affected = if plan.scope == prior.scope {
            self.affected_items(tracker)
        } else {
            tracing::info!("計劃期間與上一版不同，全部物料重算");
            self.calculator
                .snapshot()
                .items
                .iter()
                .map(|i| i.item_id.clone())
                .collect()
        };
        tracing::info!(
            "淨改變計算：髒物料 {} 個，受影響物料 {} 個",
            tracker.len(),
            affected.len()
        );

        self.calculator.execute_net_change(
            plan,
            CarryForward {
                prior,
                dirty: &affected,
            },
            cancel,
        )
    }
}
