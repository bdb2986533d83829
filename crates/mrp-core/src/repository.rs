//! 持久化邊界

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::capacity::CapacityPlan;
use crate::plan::{MrpPlan, PlanStatus};
use crate::snapshot::PlanningSnapshot;
use crate::{MrpError, Result};

/// 計劃儲存庫
///
/// 計算開始時讀取一次快照；MRP 與 CRP 結果在計算結束時以單一批次寫入。
pub trait PlanRepository: Send + Sync {
    fn load_snapshot(&self) -> Result<PlanningSnapshot>;

    fn save_batch(&self, plan: &MrpPlan, capacity: Option<&CapacityPlan>) -> Result<()>;

    fn load_plan(&self, plan_id: Uuid) -> Result<Option<MrpPlan>>;

    /// 最近一次完成的計劃（淨改變計算的基準）
    fn latest_completed(&self) -> Result<Option<MrpPlan>>;
}

#[derive(Default)]
struct Store {
    plans: HashMap<Uuid, MrpPlan>,
    capacity_plans: HashMap<Uuid, CapacityPlan>,
    /// 寫入順序
    history: Vec<Uuid>,
}

/// 記憶體儲存庫（測試與示範用）
pub struct InMemoryPlanRepository {
    snapshot: Mutex<PlanningSnapshot>,
    store: Mutex<Store>,
}

impl InMemoryPlanRepository {
    pub fn new(snapshot: PlanningSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            store: Mutex::new(Store::default()),
        }
    }

    /// 替換快照（模擬主檔變更）
    pub fn replace_snapshot(&self, snapshot: PlanningSnapshot) -> Result<()> {
        let mut guard = self.snapshot.lock().map_err(|_| poisoned())?;
        *guard = snapshot;
        Ok(())
    }

    pub fn capacity_plan_for(&self, mrp_plan_id: Uuid) -> Result<Option<CapacityPlan>> {
        let store = self.store.lock().map_err(|_| poisoned())?;
        Ok(store
            .capacity_plans
            .values()
            .find(|c| c.source_plan_id == Some(mrp_plan_id))
            .cloned())
    }

    pub fn plan_count(&self) -> Result<usize> {
        Ok(self.store.lock().map_err(|_| poisoned())?.plans.len())
    }
}

fn poisoned() -> MrpError {
    MrpError::Persistence("儲存庫鎖已中毒".to_string())
}

impl PlanRepository for InMemoryPlanRepository {
    fn load_snapshot(&self) -> Result<PlanningSnapshot> {
        Ok(self.snapshot.lock().map_err(|_| poisoned())?.clone())
    }

    fn save_batch(&self, plan: &MrpPlan, capacity: Option<&CapacityPlan>) -> Result<()> {
        if plan.status == PlanStatus::Calculating || plan.status == PlanStatus::Draft {
            return Err(MrpError::Persistence(format!(
                "計劃 {} 尚未完成（{}），不可寫入",
                plan.id, plan.status
            )));
        }

        let mut store = self.store.lock().map_err(|_| poisoned())?;
        // 覆寫既有計劃（訂單狀態回寫）不改變寫入順序
        if store.plans.insert(plan.id, plan.clone()).is_none() {
            store.history.push(plan.id);
        }
        if let Some(capacity) = capacity {
            store.capacity_plans.insert(capacity.id, capacity.clone());
        }
        Ok(())
    }

    fn load_plan(&self, plan_id: Uuid) -> Result<Option<MrpPlan>> {
        Ok(self
            .store
            .lock()
            .map_err(|_| poisoned())?
            .plans
            .get(&plan_id)
            .cloned())
    }

    fn latest_completed(&self) -> Result<Option<MrpPlan>> {
        let store = self.store.lock().map_err(|_| poisoned())?;
        Ok(store
            .history
            .iter()
            .rev()
            .filter_map(|id| store.plans.get(id))
            .find(|p| p.status == PlanStatus::Completed)
            .cloned())
    }
}
