//! 計劃快照：一次計算所需的全部主檔與交易資料

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::bom::BomLine;
use crate::calendar::WorkCalendar;
use crate::demand::Demand;
use crate::inventory::Inventory;
use crate::item::Item;
use crate::plan::PlannedOrder;
use crate::routing::{Routing, WorkCenter};
use crate::supply::Supply;
use crate::{MrpError, Result};

/// 計劃快照（計算開始時一次載入，計算期間不再讀取外部資料）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningSnapshot {
    pub items: Vec<Item>,
    pub bom_lines: Vec<BomLine>,
    #[serde(default)]
    pub routings: Vec<Routing>,
    #[serde(default)]
    pub work_centers: Vec<WorkCenter>,
    /// 物料工作日曆（依 calendar_id 對應）
    #[serde(default)]
    pub calendars: Vec<WorkCalendar>,
    #[serde(default)]
    pub inventories: Vec<Inventory>,
    #[serde(default)]
    pub scheduled_receipts: Vec<Supply>,
    #[serde(default)]
    pub demands: Vec<Demand>,
    /// 已確認/已下達的計劃訂單（必須原樣保留）
    #[serde(default)]
    pub firmed_orders: Vec<PlannedOrder>,
}

impl PlanningSnapshot {
    pub fn new(items: Vec<Item>, bom_lines: Vec<BomLine>) -> Self {
        Self {
            items,
            bom_lines,
            ..Self::default()
        }
    }

    /// 建構器模式：設置需求
    pub fn with_demands(mut self, demands: Vec<Demand>) -> Self {
        self.demands = demands;
        self
    }

    /// 建構器模式：設置庫存
    pub fn with_inventories(mut self, inventories: Vec<Inventory>) -> Self {
        self.inventories = inventories;
        self
    }

    /// 建構器模式：設置預計收貨
    pub fn with_scheduled_receipts(mut self, receipts: Vec<Supply>) -> Self {
        self.scheduled_receipts = receipts;
        self
    }

    /// 建構器模式：設置確認訂單
    pub fn with_firmed_orders(mut self, orders: Vec<PlannedOrder>) -> Self {
        self.firmed_orders = orders;
        self
    }

    /// 建構器模式：設置工藝路線與工作中心
    pub fn with_routings(mut self, routings: Vec<Routing>, work_centers: Vec<WorkCenter>) -> Self {
        self.routings = routings;
        self.work_centers = work_centers;
        self
    }

    /// 建構器模式：設置物料工作日曆
    pub fn with_calendars(mut self, calendars: Vec<WorkCalendar>) -> Self {
        self.calendars = calendars;
        self
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn item_map(&self) -> HashMap<&str, &Item> {
        self.items.iter().map(|i| (i.item_id.as_str(), i)).collect()
    }

    pub fn calendar_map(&self) -> HashMap<&str, &WorkCalendar> {
        self.calendars
            .iter()
            .map(|c| (c.calendar_id.as_str(), c))
            .collect()
    }

    pub fn routing_map(&self) -> HashMap<&str, &Routing> {
        self.routings
            .iter()
            .map(|r| (r.item_id.as_str(), r))
            .collect()
    }

    pub fn work_center_map(&self) -> HashMap<&str, &WorkCenter> {
        self.work_centers
            .iter()
            .map(|w| (w.id.as_str(), w))
            .collect()
    }

    /// 期初可用庫存（跨倉庫加總）
    pub fn opening_balances(&self) -> HashMap<String, Decimal> {
        let mut balances: HashMap<String, Decimal> = HashMap::new();
        for inventory in &self.inventories {
            *balances.entry(inventory.item_id.clone()).or_default() += inventory.nettable_qty();
        }
        balances
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 從檔案載入
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| MrpError::Persistence(format!("讀取 {} 失敗: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// 寫入檔案
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| MrpError::Persistence(format!("寫入 {} 失敗: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::DemandType;
    use crate::item::ProcurementType;
    use chrono::NaiveDate;

    fn snapshot() -> PlanningSnapshot {
        PlanningSnapshot::new(
            vec![
                Item::new("BIKE", 5, ProcurementType::Make),
                Item::new("FRAME", 3, ProcurementType::Buy),
            ],
            vec![BomLine::new("BIKE", "FRAME", Decimal::ONE)],
        )
        .with_inventories(vec![
            Inventory::new("FRAME", Decimal::from(30)).with_warehouse_id("WH-01"),
            Inventory::new("FRAME", Decimal::from(20)).with_warehouse_id("WH-02"),
        ])
        .with_demands(vec![Demand::new(
            "BIKE",
            Decimal::from(100),
            NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            DemandType::SalesOrder,
        )])
    }

    #[test]
    fn test_opening_balance_sums_warehouses() {
        let balances = snapshot().opening_balances();
        assert_eq!(balances.get("FRAME"), Some(&Decimal::from(50)));
        assert_eq!(balances.get("BIKE"), None);
    }

    #[test]
    fn test_json_round_trip() {
        let original = snapshot();
        let restored = PlanningSnapshot::from_json(&original.to_json().unwrap()).unwrap();

        assert_eq!(restored.items.len(), 2);
        assert_eq!(restored.bom_lines[0].component_id, "FRAME");
        assert_eq!(restored.demands[0].quantity, Decimal::from(100));
        assert!(restored.item("FRAME").is_some());
    }

    #[test]
    fn test_missing_optional_sections_default_to_empty() {
        let restored = PlanningSnapshot::from_json(r#"{"items": [], "bom_lines": []}"#).unwrap();
        assert!(restored.routings.is_empty());
        assert!(restored.firmed_orders.is_empty());
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        assert!(matches!(
            PlanningSnapshot::from_json("{not json"),
            Err(MrpError::Serialization(_))
        ));
    }
}
