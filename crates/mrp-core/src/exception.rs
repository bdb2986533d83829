//! 例外訊息模型

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 例外類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExceptionType {
    /// 計劃下達日早於計劃起始日
    PastDue,
    /// 淨需求無法被任何訂單滿足
    Shortage,
    /// 預計庫存長期高於平均需求
    ExcessInventory,
    /// 確認訂單的需求數量與確認值不同
    OrderQuantityChange,
    /// 確認訂單的需求日期與確認值不同
    OrderDateChange,
    /// 工作中心超載
    CapacityOverload,
    /// 瓶頸工作中心
    Bottleneck,
    /// 工作中心低負荷
    Underload,
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 嚴重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// 例外處理紀錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionResolution {
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// 例外訊息（計劃的建議性輸出，不會中斷計算）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exception {
    pub id: Uuid,
    pub exception_type: ExceptionType,
    pub severity: Severity,

    /// 相關物料
    pub item_id: Option<String>,

    /// 相關工作中心
    pub work_center_id: Option<String>,

    /// 相關時間桶起始日
    pub period: Option<NaiveDate>,

    /// 相關計劃訂單
    pub order_id: Option<Uuid>,

    pub message: String,

    /// 建議處理方式
    pub suggested_action: Option<String>,

    pub resolution: Option<ExceptionResolution>,
}

impl Exception {
    pub fn new(exception_type: ExceptionType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exception_type,
            severity,
            item_id: None,
            work_center_id: None,
            period: None,
            order_id: None,
            message: message.into(),
            suggested_action: None,
            resolution: None,
        }
    }

    /// 建構器模式：設置物料
    pub fn for_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// 建構器模式：設置工作中心
    pub fn for_work_center(mut self, work_center_id: impl Into<String>) -> Self {
        self.work_center_id = Some(work_center_id.into());
        self
    }

    /// 建構器模式：設置時間桶
    pub fn in_period(mut self, period: NaiveDate) -> Self {
        self.period = Some(period);
        self
    }

    /// 建構器模式：設置計劃訂單
    pub fn for_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// 建構器模式：設置建議處理方式
    pub fn with_suggested_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// 標記為已處理
    pub fn resolve(&mut self, resolved_by: impl Into<String>, note: Option<String>) {
        self.resolution = Some(ExceptionResolution {
            resolved_by: resolved_by.into(),
            resolved_at: Utc::now(),
            note,
        });
    }

    /// 沿用到新計劃：新 ID，清除處理紀錄
    pub fn carried_forward(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            resolution: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_builder() {
        let order_id = Uuid::new_v4();
        let period = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let exception = Exception::new(ExceptionType::PastDue, Severity::Warning, "過期")
            .for_item("BIKE")
            .in_period(period)
            .for_order(order_id)
            .with_suggested_action("加急");

        assert_eq!(exception.item_id.as_deref(), Some("BIKE"));
        assert_eq!(exception.period, Some(period));
        assert_eq!(exception.order_id, Some(order_id));
        assert!(!exception.is_resolved());
    }

    #[test]
    fn test_resolve_and_carry_forward() {
        let mut exception =
            Exception::new(ExceptionType::OrderDateChange, Severity::Info, "改期").for_item("X");
        exception.resolve("planner-01", Some("已與供應商確認".to_string()));

        assert!(exception.is_resolved());
        assert_eq!(
            exception.resolution.as_ref().map(|r| r.resolved_by.as_str()),
            Some("planner-01")
        );

        let carried = exception.carried_forward();
        assert_ne!(carried.id, exception.id);
        assert!(!carried.is_resolved());
        assert_eq!(carried.item_id.as_deref(), Some("X"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
