//! BOM 行模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// BOM 行：父件 → 子件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    pub id: Uuid,

    /// 父件
    pub parent_id: String,

    /// 子件
    pub component_id: String,

    /// 每個父件的用量
    pub quantity_per_parent: Decimal,

    /// 損耗率（0.05 = 5%）
    pub scrap_rate: Decimal,

    /// 生效日（含）
    pub effective_from: Option<NaiveDate>,

    /// 失效日（含）
    pub effective_to: Option<NaiveDate>,

    /// 子件需求日相對父件下達日的偏移天數（不超過父件完工日）
    pub lead_time_offset_days: u32,
}

impl BomLine {
    pub fn new(
        parent_id: impl Into<String>,
        component_id: impl Into<String>,
        quantity_per_parent: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: parent_id.into(),
            component_id: component_id.into(),
            quantity_per_parent,
            scrap_rate: Decimal::ZERO,
            effective_from: None,
            effective_to: None,
            lead_time_offset_days: 0,
        }
    }

    /// 建構器模式：設置損耗率
    pub fn with_scrap_rate(mut self, scrap_rate: Decimal) -> Self {
        self.scrap_rate = scrap_rate;
        self
    }

    /// 建構器模式：設置生效區間
    pub fn with_effectivity(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.effective_from = from;
        self.effective_to = to;
        self
    }

    /// 建構器模式：設置偏移天數
    pub fn with_lead_time_offset(mut self, days: u32) -> Self {
        self.lead_time_offset_days = days;
        self
    }

    /// 含損耗用量 = 用量 × (1 + 損耗率)
    pub fn effective_quantity(&self) -> Decimal {
        self.quantity_per_parent * (Decimal::ONE + self.scrap_rate)
    }

    /// 指定日期是否生效
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from.map_or(true, |from| date >= from)
            && self.effective_to.map_or(true, |to| date <= to)
    }
}
