//! # MRP Calculation Engine
//!
//! 核心 MRP 計算引擎：依低階碼逐層計算，同層物料並行

pub mod aggregation;
pub mod bom_graph;
pub mod bucketing;
pub mod calculator;
pub mod exceptions;
pub mod lead_time;
pub mod lot_sizing;
pub mod netting;

// Re-export 主要類型
pub use aggregation::{DemandAggregator, DemandSeries};
pub use bom_graph::{BomGraph, ComponentUsage, NodeIndex};
pub use bucketing::{BucketSet, TimeBucket};
pub use calculator::{CancellationToken, CarryForward, MrpCalculator};
pub use exceptions::ExceptionDetector;
pub use lead_time::{LeadTimeCalculator, OrderOffsetting};
pub use lot_sizing::LotSizingCalculator;
pub use netting::{FirmedOrderCheck, NettingCalculator};

use mrp_core::{Demand, Exception, PlanRecords, PlannedOrder, Requirement};

/// MRP 計算結果
#[derive(Debug, Clone, Default)]
pub struct MrpResult {
    /// 時間桶記錄
    pub requirements: Vec<Requirement>,

    /// 計劃訂單（含沿用的確認訂單）
    pub planned_orders: Vec<PlannedOrder>,

    /// 例外訊息
    pub exceptions: Vec<Exception>,

    /// 各層處理的物料
    pub level_sequence: Vec<Vec<String>>,

    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u128>,
}

impl MrpResult {
    /// 創建空的計算結果
    pub fn empty() -> Self {
        Self::default()
    }

    /// 轉為計劃記錄（一次寫入計劃）
    pub fn into_records(self) -> PlanRecords {
        PlanRecords {
            requirements: self.requirements,
            planned_orders: self.planned_orders,
            exceptions: self.exceptions,
            level_sequence: self.level_sequence,
            calculation_time_ms: self.calculation_time_ms,
        }
    }

    fn absorb(&mut self, component: ComponentMrpResult) {
        self.requirements.extend(component.requirements);
        self.planned_orders.extend(component.planned_orders);
        self.exceptions.extend(component.exceptions);
    }
}

/// 單物料 MRP 計算結果
#[derive(Debug, Clone)]
pub struct ComponentMrpResult {
    pub item_id: String,
    pub requirements: Vec<Requirement>,
    pub planned_orders: Vec<PlannedOrder>,
    pub exceptions: Vec<Exception>,
    /// 推給下一層子件的相依需求
    pub dependent_demands: Vec<Demand>,
}
