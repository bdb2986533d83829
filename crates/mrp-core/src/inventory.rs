//! 庫存快照模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 庫存狀態（單一倉庫）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    /// 物料ID
    pub item_id: String,

    /// 現有庫存
    pub on_hand_qty: Decimal,

    /// 已分配數量（鎖定）
    pub allocated_qty: Decimal,

    /// 可用庫存（現有 - 已分配）
    pub available_qty: Decimal,

    /// 倉庫
    pub warehouse_id: Option<String>,
}

impl Inventory {
    /// 創建新的庫存記錄
    pub fn new(item_id: impl Into<String>, on_hand_qty: Decimal) -> Self {
        Self {
            item_id: item_id.into(),
            on_hand_qty,
            allocated_qty: Decimal::ZERO,
            available_qty: on_hand_qty,
            warehouse_id: None,
        }
    }

    /// 建構器模式：設置已分配數量
    pub fn with_allocated_qty(mut self, allocated_qty: Decimal) -> Self {
        self.allocated_qty = allocated_qty;
        self.available_qty = self.on_hand_qty - allocated_qty;
        self
    }

    /// 建構器模式：設置倉庫
    pub fn with_warehouse_id(mut self, warehouse_id: impl Into<String>) -> Self {
        self.warehouse_id = Some(warehouse_id.into());
        self
    }

    /// 可供 MRP 使用的數量（不低於 0）
    pub fn nettable_qty(&self) -> Decimal {
        self.available_qty.max(Decimal::ZERO)
    }
}
