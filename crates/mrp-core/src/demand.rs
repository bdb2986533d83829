//! 需求模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 需求類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandType {
    /// 銷售訂單
    SalesOrder,
    /// 銷售預測
    Forecast,
    /// 安全庫存補充目標
    SafetyStock,
    /// 相依需求（BOM展開）
    Dependent,
}

/// 需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    /// 需求ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 需求數量
    pub quantity: Decimal,

    /// 需求日期
    pub required_date: NaiveDate,

    /// 需求類型
    pub demand_type: DemandType,

    /// 來源單據（銷售訂單號，或相依需求的父件計劃訂單）
    pub source_ref: Option<String>,

    /// 優先級（1-10，10最高）
    pub priority: u8,
}

impl Demand {
    /// 創建新的需求
    pub fn new(
        item_id: impl Into<String>,
        quantity: Decimal,
        required_date: NaiveDate,
        demand_type: DemandType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: item_id.into(),
            quantity,
            required_date,
            demand_type,
            source_ref: None,
            priority: 5,
        }
    }

    /// 建構器模式：設置來源單據
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    /// 建構器模式：設置優先級
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    /// 檢查是否為獨立需求
    pub fn is_independent(&self) -> bool {
        !self.is_dependent()
    }

    /// 檢查是否為相依需求
    pub fn is_dependent(&self) -> bool {
        self.demand_type == DemandType::Dependent
    }
}
