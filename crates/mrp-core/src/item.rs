//! 物料主檔模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::MrpError;

/// 物料 MRP 主檔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// 物料ID
    pub item_id: String,

    /// 描述
    pub description: Option<String>,

    /// 計量單位
    pub unit_of_measure: String,

    /// 提前期（天）
    pub lead_time_days: u32,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 批量規則
    pub lot_sizing: LotSizingPolicy,

    /// 採購/生產標記
    pub procurement_type: ProcurementType,

    /// 提前期偏置使用的工作日曆（None 表示按日曆天）
    pub calendar_id: Option<String>,

    /// 是否啟用 MRP（停用的物料只產生時間桶記錄，不產生計劃訂單）
    pub mrp_enabled: bool,

    /// 低階碼（由 BOM 圖計算，物料在任一 BOM 中出現的最深層級）
    pub low_level_code: u32,
}

impl Item {
    /// 創建新的物料主檔
    pub fn new(item_id: impl Into<String>, lead_time_days: u32, procurement_type: ProcurementType) -> Self {
        Self {
            item_id: item_id.into(),
            description: None,
            unit_of_measure: "EA".to_string(),
            lead_time_days,
            safety_stock: Decimal::ZERO,
            lot_sizing: LotSizingPolicy::LotForLot,
            procurement_type,
            calendar_id: None,
            mrp_enabled: true,
            low_level_code: 0,
        }
    }

    /// 建構器模式：設置批量規則
    pub fn with_lot_sizing(mut self, policy: LotSizingPolicy) -> Self {
        self.lot_sizing = policy;
        self
    }

    /// 建構器模式：設置安全庫存
    pub fn with_safety_stock(mut self, stock: Decimal) -> Self {
        self.safety_stock = stock;
        self
    }

    /// 建構器模式：設置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 建構器模式：設置計量單位
    pub fn with_unit_of_measure(mut self, uom: impl Into<String>) -> Self {
        self.unit_of_measure = uom.into();
        self
    }

    /// 建構器模式：設置工作日曆
    pub fn with_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }

    /// 建構器模式：設置是否啟用 MRP
    pub fn with_mrp_enabled(mut self, enabled: bool) -> Self {
        self.mrp_enabled = enabled;
        self
    }

    /// 是否為自製件
    pub fn is_make(&self) -> bool {
        self.procurement_type == ProcurementType::Make
    }

    /// 檢查批量參數
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |reason: &str| MrpError::InvalidLotSizing {
            item_id: self.item_id.clone(),
            reason: reason.to_string(),
        };

        if self.safety_stock < Decimal::ZERO {
            return Err(invalid("安全庫存不可為負"));
        }

        match self.lot_sizing {
            LotSizingPolicy::LotForLot => Ok(()),
            LotSizingPolicy::FixedOrderQuantity { quantity } if quantity <= Decimal::ZERO => {
                Err(invalid("固定批量必須大於 0"))
            }
            LotSizingPolicy::PeriodOrderQuantity { periods } if periods == 0 => {
                Err(invalid("週期數必須大於 0"))
            }
            LotSizingPolicy::MinMax { min, max } if min < Decimal::ZERO || max < min => {
                Err(invalid("最小值不可為負且不可大於最大值"))
            }
            _ => Ok(()),
        }
    }
}

/// 採購類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementType {
    /// 採購
    Buy,
    /// 生產
    Make,
}

/// 批量規則（每個物料只有一個生效規則，不混合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotSizingPolicy {
    /// 批對批（Lot for Lot）- 按實際淨需求訂購
    LotForLot,

    /// 固定訂購量 - 每張訂單固定數量，不足時開立多張
    FixedOrderQuantity { quantity: Decimal },

    /// 週期訂購量 - 合併 N 個時間桶的淨需求
    PeriodOrderQuantity { periods: u32 },

    /// 最小-最大 - 預計庫存低於最小值時補到最大值
    MinMax { min: Decimal, max: Decimal },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_create_item() {
        let item = Item::new("BIKE-001", 5, ProcurementType::Make);

        assert_eq!(item.item_id, "BIKE-001");
        assert_eq!(item.lead_time_days, 5);
        assert_eq!(item.lot_sizing, LotSizingPolicy::LotForLot);
        assert_eq!(item.low_level_code, 0);
        assert!(item.is_make());
        assert!(item.mrp_enabled);
    }

    #[test]
    fn test_item_builder() {
        let item = Item::new("FRAME-001", 7, ProcurementType::Buy)
            .with_lot_sizing(LotSizingPolicy::FixedOrderQuantity {
                quantity: Decimal::from(100),
            })
            .with_safety_stock(Decimal::from(20))
            .with_calendar("FACTORY-A")
            .with_unit_of_measure("PCS");

        assert_eq!(
            item.lot_sizing,
            LotSizingPolicy::FixedOrderQuantity {
                quantity: Decimal::from(100)
            }
        );
        assert_eq!(item.safety_stock, Decimal::from(20));
        assert_eq!(item.calendar_id.as_deref(), Some("FACTORY-A"));
        assert_eq!(item.unit_of_measure, "PCS");
        assert!(item.validate().is_ok());
    }

    #[rstest]
    #[case(LotSizingPolicy::FixedOrderQuantity { quantity: Decimal::ZERO })]
    #[case(LotSizingPolicy::PeriodOrderQuantity { periods: 0 })]
    #[case(LotSizingPolicy::MinMax { min: Decimal::from(50), max: Decimal::from(10) })]
    #[case(LotSizingPolicy::MinMax { min: Decimal::from(-1), max: Decimal::from(10) })]
    fn test_invalid_lot_sizing(#[case] policy: LotSizingPolicy) {
        let item = Item::new("BAD", 1, ProcurementType::Buy).with_lot_sizing(policy);

        assert!(matches!(
            item.validate(),
            Err(MrpError::InvalidLotSizing { .. })
        ));
    }
}
