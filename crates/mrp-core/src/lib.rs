//! # MRP Core
//!
//! 核心資料模型與類型定義

pub mod bom;
pub mod calendar;
pub mod capacity;
pub mod config;
pub mod demand;
pub mod exception;
pub mod inventory;
pub mod item;
pub mod plan;
pub mod repository;
pub mod routing;
pub mod snapshot;
pub mod supply;

// Re-export 主要類型
pub use bom::BomLine;
pub use calendar::{Downtime, ShiftSchedule, WorkCalendar, WorkCenterCalendar};
pub use capacity::{CapacityPlan, CapacityRecords, CapacityRequirement, OperationLoad};
pub use config::{
    BucketGranularity, CapacityConfig, ForecastConsumption, PlanningConfig, SchedulingDirection,
};
pub use demand::{Demand, DemandType};
pub use exception::{Exception, ExceptionResolution, ExceptionType, Severity};
pub use inventory::Inventory;
pub use item::{Item, LotSizingPolicy, ProcurementType};
pub use plan::{
    MrpPlan, PlanRecords, PlanScope, PlanStatus, PlanType, PlannedOrder, PlannedOrderStatus,
    PlannedOrderType, Requirement,
};
pub use repository::{InMemoryPlanRepository, PlanRepository};
pub use routing::{Routing, RoutingOperation, WorkCenter, WorkCenterType};
pub use snapshot::PlanningSnapshot;
pub use supply::{Supply, SupplyType};

/// MRP 錯誤類型
///
/// 前五種屬於輸入完整性錯誤：在產生任何輸出前中止整個計算。
#[derive(Debug, thiserror::Error)]
pub enum MrpError {
    #[error("BOM 存在循環引用: {}", .path.join(" → "))]
    CyclicBom { path: Vec<String> },

    #[error("找不到物料主檔: {item_id}（{context}）")]
    UnknownItem { item_id: String, context: String },

    #[error("物料缺少工藝路線: {0}")]
    MissingRouting(String),

    #[error("找不到工作中心: {0}")]
    UnknownWorkCenter(String),

    #[error("物料 {item_id} 的批量規則無效: {reason}")]
    InvalidLotSizing { item_id: String, reason: String },

    #[error("無效的狀態轉換（{entity}）: {from} → {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("計劃 {plan_id} 目前狀態為 {status}，不允許此操作")]
    PlanNotMutable { plan_id: uuid::Uuid, status: String },

    #[error("計劃 {plan_id} 尚未完成（目前狀態為 {status}）")]
    PlanNotCompleted { plan_id: uuid::Uuid, status: String },

    #[error("找不到計劃訂單: {0}")]
    OrderNotFound(uuid::Uuid),

    #[error("找不到例外訊息: {0}")]
    ExceptionNotFound(uuid::Uuid),

    #[error("無效的日期: {0}")]
    InvalidDate(String),

    #[error("計算已於第 {level} 層屏障取消")]
    Cancelled { level: u32 },

    #[error("持久化錯誤: {0}")]
    Persistence(String),

    #[error("序列化錯誤: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MrpError {
    /// 是否為輸入完整性錯誤（計劃應轉為 Error 狀態，不保留任何部分結果）
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            MrpError::CyclicBom { .. }
                | MrpError::UnknownItem { .. }
                | MrpError::MissingRouting(_)
                | MrpError::UnknownWorkCenter(_)
                | MrpError::InvalidLotSizing { .. }
        )
    }

    /// 建立 UnknownItem 錯誤
    pub fn unknown_item(item_id: impl Into<String>, context: impl Into<String>) -> Self {
        MrpError::UnknownItem {
            item_id: item_id.into(),
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MrpError>;
