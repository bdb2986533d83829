//! 預計收貨模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 供應類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyType {
    /// 採購訂單
    PurchaseOrder,
    /// 生產工單
    WorkOrder,
    /// 調撥在途
    Transfer,
}

/// 在途供應（已下達的採購/生產訂單）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supply {
    /// 供應ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 供應數量
    pub quantity: Decimal,

    /// 可用日期
    pub available_date: NaiveDate,

    /// 供應類型
    pub supply_type: SupplyType,

    /// 來源單據
    pub source_ref: Option<String>,
}

impl Supply {
    /// 創建新的供應
    pub fn new(
        item_id: impl Into<String>,
        quantity: Decimal,
        available_date: NaiveDate,
        supply_type: SupplyType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: item_id.into(),
            quantity,
            available_date,
            supply_type,
            source_ref: None,
        }
    }

    /// 建構器模式：設置來源單據
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_supply() {
        let supply = Supply::new(
            "BIKE-001",
            Decimal::from(50),
            NaiveDate::from_ymd_opt(2025, 10, 20).unwrap(),
            SupplyType::PurchaseOrder,
        )
        .with_source_ref("PO-12345");

        assert_eq!(supply.item_id, "BIKE-001");
        assert_eq!(supply.quantity, Decimal::from(50));
        assert_eq!(supply.source_ref.as_deref(), Some("PO-12345"));
    }
}
