//! 工作中心與工藝路線

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::WorkCenterCalendar;

/// 工作中心類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkCenterType {
    Machine,
    Labor,
    Subcontract,
    Mixed,
}

/// 工作中心
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCenter {
    /// 工作中心代碼
    pub id: String,

    pub name: String,

    pub work_center_type: WorkCenterType,

    /// 效率（1 = 100%）
    pub efficiency: Decimal,

    /// 產能日曆
    pub calendar: WorkCenterCalendar,
}

impl WorkCenter {
    pub fn new(id: impl Into<String>, name: impl Into<String>, calendar: WorkCenterCalendar) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            work_center_type: WorkCenterType::Machine,
            efficiency: Decimal::ONE,
            calendar,
        }
    }

    /// 建構器模式：設置類型
    pub fn with_type(mut self, work_center_type: WorkCenterType) -> Self {
        self.work_center_type = work_center_type;
        self
    }

    /// 建構器模式：設置效率（不低於 0）
    pub fn with_efficiency(mut self, efficiency: Decimal) -> Self {
        self.efficiency = efficiency.max(Decimal::ZERO);
        self
    }
}

/// 工序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingOperation {
    /// 工序序號（升冪執行）
    pub sequence: u32,

    pub work_center_id: String,

    pub name: String,

    /// 準備工時（每張訂單一次）
    pub setup_hours: Decimal,

    /// 單件加工工時
    pub run_hours_per_unit: Decimal,

    /// 排隊時間
    pub queue_hours: Decimal,

    /// 搬運時間
    pub move_hours: Decimal,

    /// 工序損耗率
    pub scrap_rate: Decimal,
}

impl RoutingOperation {
    pub fn new(
        sequence: u32,
        work_center_id: impl Into<String>,
        setup_hours: Decimal,
        run_hours_per_unit: Decimal,
    ) -> Self {
        let work_center_id = work_center_id.into();
        Self {
            sequence,
            name: format!("OP{sequence}"),
            work_center_id,
            setup_hours,
            run_hours_per_unit,
            queue_hours: Decimal::ZERO,
            move_hours: Decimal::ZERO,
            scrap_rate: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 建構器模式：設置排隊與搬運時間
    pub fn with_queue_and_move(mut self, queue_hours: Decimal, move_hours: Decimal) -> Self {
        self.queue_hours = queue_hours;
        self.move_hours = move_hours;
        self
    }

    /// 建構器模式：設置損耗率
    pub fn with_scrap_rate(mut self, scrap_rate: Decimal) -> Self {
        self.scrap_rate = scrap_rate;
        self
    }

    /// 加工工時：單件工時 × 數量 × (1 + 損耗率)
    pub fn run_hours(&self, quantity: Decimal) -> Decimal {
        self.run_hours_per_unit * quantity * (Decimal::ONE + self.scrap_rate)
    }

    /// 工序佔用的總時間（排程用）
    pub fn elapsed_hours(&self, quantity: Decimal, include_setup: bool) -> Decimal {
        let setup = if include_setup {
            self.setup_hours
        } else {
            Decimal::ZERO
        };
        self.queue_hours + setup + self.run_hours(quantity) + self.move_hours
    }
}

/// 工藝路線
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    pub item_id: String,
    pub operations: Vec<RoutingOperation>,
}

impl Routing {
    /// 工序依序號排序
    pub fn new(item_id: impl Into<String>, mut operations: Vec<RoutingOperation>) -> Self {
        operations.sort_by_key(|op| op.sequence);
        Self {
            item_id: item_id.into(),
            operations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
