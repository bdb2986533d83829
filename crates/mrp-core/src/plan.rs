//! 計劃模型：計劃訂單、時間桶記錄、MRP 計劃

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::config::BucketGranularity;
use crate::exception::{Exception, ExceptionType};
use crate::{MrpError, Result};

/// 計劃訂單類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannedOrderType {
    /// 採購
    Purchase,
    /// 生產
    Production,
}

/// 計劃訂單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlannedOrderStatus {
    /// 系統建議
    Planned,
    /// 計劃員確認（鎖定數量/日期，重算時不再調整）
    Firmed,
    /// 已下達
    Released,
    /// 已轉為實際採購/生產訂單
    Converted,
    /// 已取消
    Cancelled,
}

impl PlannedOrderStatus {
    /// 是否允許轉換到目標狀態
    pub fn can_transition_to(self, to: PlannedOrderStatus) -> bool {
        use PlannedOrderStatus::*;
        matches!(
            (self, to),
            (Planned, Firmed | Released | Converted | Cancelled)
                | (Firmed, Released | Converted | Cancelled)
                | (Released, Converted | Cancelled)
        )
    }

    /// 終態
    pub fn is_terminal(self) -> bool {
        matches!(self, PlannedOrderStatus::Converted | PlannedOrderStatus::Cancelled)
    }
}

impl fmt::Display for PlannedOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 計劃訂單（MRP計算結果）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOrder {
    /// 計劃訂單ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 訂單類型
    pub order_type: PlannedOrderType,

    /// 計劃數量
    pub quantity: Decimal,

    /// 需求日期（完工/到貨日期）
    pub due_date: NaiveDate,

    /// 下達日期（不早於計劃起始日）
    pub release_date: NaiveDate,

    /// 提前期推算出的原始下達日期（可能早於計劃起始日）
    pub computed_release_date: NaiveDate,

    pub status: PlannedOrderStatus,

    /// 來源（上一版計劃或外部單據）
    pub source_ref: Option<String>,

    /// 確認時間
    pub firmed_at: Option<DateTime<Utc>>,
}

impl PlannedOrder {
    /// 創建新的計劃訂單
    pub fn new(
        item_id: impl Into<String>,
        quantity: Decimal,
        due_date: NaiveDate,
        release_date: NaiveDate,
        order_type: PlannedOrderType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: item_id.into(),
            order_type,
            quantity,
            due_date,
            release_date,
            computed_release_date: release_date,
            status: PlannedOrderStatus::Planned,
            source_ref: None,
            firmed_at: None,
        }
    }

    /// 可重現的計劃訂單ID：相同輸入重算時得到相同ID
    pub fn planned_id(item_id: &str, due_date: NaiveDate, sequence: usize) -> Uuid {
        let name = format!("mrp-planned-order:{item_id}:{due_date}:{sequence}");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    /// 建構器模式：設置ID
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// 建構器模式：設置來源
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    /// 建構器模式：以確認狀態建立（用於載入既有確認訂單）
    pub fn firmed(mut self) -> Self {
        self.status = PlannedOrderStatus::Firmed;
        self.firmed_at = Some(Utc::now());
        self
    }

    /// 狀態轉換
    pub fn transition(&mut self, to: PlannedOrderStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(MrpError::InvalidTransition {
                entity: "PlannedOrder",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        if to == PlannedOrderStatus::Firmed {
            self.firmed_at = Some(Utc::now());
        }
        self.status = to;
        Ok(())
    }

    /// 計算提前期（天數）
    pub fn lead_time_days(&self) -> i64 {
        (self.due_date - self.computed_release_date).num_days()
    }

    /// 檢查是否為採購訂單
    pub fn is_purchase(&self) -> bool {
        self.order_type == PlannedOrderType::Purchase
    }

    /// 檢查是否為生產訂單
    pub fn is_production(&self) -> bool {
        self.order_type == PlannedOrderType::Production
    }

    /// 已確認或已下達：重算時視為既定供應
    pub fn is_committed(&self) -> bool {
        matches!(
            self.status,
            PlannedOrderStatus::Firmed | PlannedOrderStatus::Released
        )
    }

    /// 仍需執行（未轉單、未取消）
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// MRP 時間桶記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub item_id: String,

    /// 時間桶起始日
    pub period_start: NaiveDate,

    /// 時間桶結束日（含）
    pub period_end: NaiveDate,

    /// 毛需求
    pub gross_requirement: Decimal,

    /// 期初庫存（上一期預計庫存）
    pub on_hand: Decimal,

    /// 預計收貨
    pub scheduled_receipts: Decimal,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 淨需求
    pub net_requirement: Decimal,

    /// 計劃訂單收貨（含確認訂單）
    pub planned_order_receipt: Decimal,

    /// 其中確認/已下達訂單的收貨
    pub firmed_receipts: Decimal,

    /// 計劃訂單下達
    pub planned_order_release: Decimal,

    /// 預計庫存
    pub projected_on_hand: Decimal,
}

impl Requirement {
    pub fn new(item_id: impl Into<String>, period_start: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            item_id: item_id.into(),
            period_start,
            period_end,
            gross_requirement: Decimal::ZERO,
            on_hand: Decimal::ZERO,
            scheduled_receipts: Decimal::ZERO,
            safety_stock: Decimal::ZERO,
            net_requirement: Decimal::ZERO,
            planned_order_receipt: Decimal::ZERO,
            firmed_receipts: Decimal::ZERO,
            planned_order_release: Decimal::ZERO,
            projected_on_hand: Decimal::ZERO,
        }
    }

    /// 本期新產生的計劃收貨
    pub fn new_planned_receipts(&self) -> Decimal {
        self.planned_order_receipt - self.firmed_receipts
    }

    /// 平衡式：期末 = 期初 + 預計收貨 + 計劃收貨 - 毛需求
    pub fn balance_holds(&self) -> bool {
        self.projected_on_hand
            == self.on_hand + self.scheduled_receipts + self.planned_order_receipt
                - self.gross_requirement
    }

    /// 日期是否落在此時間桶
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }
}

/// 計劃類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
    /// 全部重算
    Regenerative,
    /// 淨改變：只重算受影響物料
    NetChange,
}

/// 計劃狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Draft,
    Calculating,
    Completed,
    Error,
}

impl PlanStatus {
    pub fn can_transition_to(self, to: PlanStatus) -> bool {
        use PlanStatus::*;
        matches!(
            (self, to),
            (Draft, Calculating) | (Draft, Error) | (Calculating, Completed) | (Calculating, Error)
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 計劃範圍
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanScope {
    /// 計劃起始日（「今天」）
    pub start_date: NaiveDate,

    /// 計劃時界結束日（含）
    pub end_date: NaiveDate,

    /// 時間桶粒度
    pub granularity: BucketGranularity,

    /// 限定物料（None 表示全部；限定時其 BOM 子孫也一併計劃）
    pub items: Option<BTreeSet<String>>,
}

impl PlanScope {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, granularity: BucketGranularity) -> Self {
        Self {
            start_date,
            end_date,
            granularity,
            items: None,
        }
    }

    /// 建構器模式：限定物料
    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = Some(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(MrpError::InvalidDate(format!(
                "計劃時界結束日 {} 早於起始日 {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }
}

/// 計算完成後一次性寫入計劃的結果
#[derive(Debug, Clone, Default)]
pub struct PlanRecords {
    pub requirements: Vec<Requirement>,
    pub planned_orders: Vec<PlannedOrder>,
    pub exceptions: Vec<Exception>,
    pub level_sequence: Vec<Vec<String>>,
    pub calculation_time_ms: Option<u128>,
}

/// MRP 計劃（一次執行的容器）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrpPlan {
    pub id: Uuid,
    pub name: String,
    pub plan_type: PlanType,
    pub scope: PlanScope,
    pub status: PlanStatus,

    pub requirements: Vec<Requirement>,
    pub planned_orders: Vec<PlannedOrder>,
    pub exceptions: Vec<Exception>,

    /// 各低階碼層的物料（處理順序）
    pub level_sequence: Vec<Vec<String>>,

    /// 失敗原因
    pub error: Option<String>,

    /// 被取代的上一版計劃
    pub supersedes: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub calculation_time_ms: Option<u128>,
}

impl MrpPlan {
    pub fn new(name: impl Into<String>, scope: PlanScope, plan_type: PlanType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            plan_type,
            scope,
            status: PlanStatus::Draft,
            requirements: Vec::new(),
            planned_orders: Vec::new(),
            exceptions: Vec::new(),
            level_sequence: Vec::new(),
            error: None,
            supersedes: None,
            created_at: Utc::now(),
            completed_at: None,
            calculation_time_ms: None,
        }
    }

    /// 建構器模式：取代上一版計劃
    pub fn superseding(mut self, prior: Uuid) -> Self {
        self.supersedes = Some(prior);
        self
    }

    fn transition(&mut self, to: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(MrpError::InvalidTransition {
                entity: "MrpPlan",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Draft → Calculating
    pub fn begin_calculation(&mut self) -> Result<()> {
        self.transition(PlanStatus::Calculating)
    }

    /// Calculating → Completed，一次寫入全部結果
    pub fn complete(&mut self, records: PlanRecords) -> Result<()> {
        self.transition(PlanStatus::Completed)?;
        self.requirements = records.requirements;
        self.planned_orders = records.planned_orders;
        self.exceptions = records.exceptions;
        self.level_sequence = records.level_sequence;
        self.calculation_time_ms = records.calculation_time_ms;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Draft/Calculating → Error，不保留任何部分結果
    pub fn fail(&mut self, cause: impl Into<String>) -> Result<()> {
        self.transition(PlanStatus::Error)?;
        self.requirements.clear();
        self.planned_orders.clear();
        self.exceptions.clear();
        self.level_sequence.clear();
        self.error = Some(cause.into());
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == PlanStatus::Completed
    }

    fn ensure_completed(&self) -> Result<()> {
        if self.is_completed() {
            Ok(())
        } else {
            Err(MrpError::PlanNotMutable {
                plan_id: self.id,
                status: self.status.to_string(),
            })
        }
    }

    /// 計劃訂單狀態推進（外部回呼）
    pub fn update_order_status(&mut self, order_id: Uuid, to: PlannedOrderStatus) -> Result<()> {
        self.ensure_completed()?;
        let order = self
            .planned_orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(MrpError::OrderNotFound(order_id))?;
        order.transition(to)
    }

    pub fn firm_order(&mut self, order_id: Uuid) -> Result<()> {
        self.update_order_status(order_id, PlannedOrderStatus::Firmed)
    }

    pub fn release_order(&mut self, order_id: Uuid) -> Result<()> {
        self.update_order_status(order_id, PlannedOrderStatus::Released)
    }

    pub fn convert_order(&mut self, order_id: Uuid) -> Result<()> {
        self.update_order_status(order_id, PlannedOrderStatus::Converted)
    }

    pub fn cancel_order(&mut self, order_id: Uuid) -> Result<()> {
        self.update_order_status(order_id, PlannedOrderStatus::Cancelled)
    }

    /// 處理例外訊息（計劃完成後唯一可修改的內容之一）
    pub fn resolve_exception(
        &mut self,
        exception_id: Uuid,
        resolved_by: impl Into<String>,
        note: Option<String>,
    ) -> Result<()> {
        self.ensure_completed()?;
        let exception = self
            .exceptions
            .iter_mut()
            .find(|e| e.id == exception_id)
            .ok_or(MrpError::ExceptionNotFound(exception_id))?;
        exception.resolve(resolved_by, note);
        Ok(())
    }

    pub fn find_order(&self, order_id: Uuid) -> Option<&PlannedOrder> {
        self.planned_orders.iter().find(|o| o.id == order_id)
    }

    pub fn orders_for<'a>(&'a self, item_id: &'a str) -> impl Iterator<Item = &'a PlannedOrder> + 'a {
        self.planned_orders.iter().filter(move |o| o.item_id == item_id)
    }

    pub fn requirements_for<'a>(
        &'a self,
        item_id: &'a str,
    ) -> impl Iterator<Item = &'a Requirement> + 'a {
        self.requirements.iter().filter(move |r| r.item_id == item_id)
    }

    pub fn exceptions_of(&self, exception_type: ExceptionType) -> impl Iterator<Item = &Exception> {
        self.exceptions
            .iter()
            .filter(move |e| e.exception_type == exception_type)
    }

    /// 已確認/已下達訂單：下一次重算的既定供應
    pub fn committed_orders(&self) -> Vec<PlannedOrder> {
        self.planned_orders
            .iter()
            .filter(|o| o.is_committed())
            .cloned()
            .collect()
    }

    /// 未處理的例外數量
    pub fn open_exception_count(&self) -> usize {
        self.exceptions.iter().filter(|e| !e.is_resolved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::Severity;
    use rstest::rstest;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn order() -> PlannedOrder {
        PlannedOrder::new("BIKE-001", Decimal::from(100), date(8), date(1), PlannedOrderType::Production)
    }

    fn completed_plan() -> MrpPlan {
        let mut plan = MrpPlan::new(
            "W45",
            PlanScope::new(date(1), date(30), BucketGranularity::Day),
            PlanType::Regenerative,
        );
        plan.begin_calculation().unwrap();
        plan.complete(PlanRecords {
            planned_orders: vec![order()],
            exceptions: vec![Exception::new(ExceptionType::Shortage, Severity::Critical, "缺料")],
            ..PlanRecords::default()
        })
        .unwrap();
        plan
    }

    #[test]
    fn test_create_planned_order() {
        let order = order();

        assert_eq!(order.item_id, "BIKE-001");
        assert_eq!(order.lead_time_days(), 7);
        assert_eq!(order.status, PlannedOrderStatus::Planned);
        assert!(order.is_production());
        assert!(!order.is_purchase());
        assert!(!order.is_committed());
    }

    #[test]
    fn test_planned_id_is_reproducible() {
        let a = PlannedOrder::planned_id("X", date(20), 0);
        let b = PlannedOrder::planned_id("X", date(20), 0);
        let c = PlannedOrder::planned_id("X", date(20), 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[rstest]
    #[case(PlannedOrderStatus::Planned, PlannedOrderStatus::Firmed, true)]
    #[case(PlannedOrderStatus::Planned, PlannedOrderStatus::Released, true)]
    #[case(PlannedOrderStatus::Planned, PlannedOrderStatus::Cancelled, true)]
    #[case(PlannedOrderStatus::Firmed, PlannedOrderStatus::Released, true)]
    #[case(PlannedOrderStatus::Released, PlannedOrderStatus::Converted, true)]
    #[case(PlannedOrderStatus::Released, PlannedOrderStatus::Firmed, false)]
    #[case(PlannedOrderStatus::Converted, PlannedOrderStatus::Cancelled, false)]
    #[case(PlannedOrderStatus::Cancelled, PlannedOrderStatus::Planned, false)]
    fn test_order_status_transitions(
        #[case] from: PlannedOrderStatus,
        #[case] to: PlannedOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_order_transition_records_firm_time() {
        let mut order = order();
        order.transition(PlannedOrderStatus::Firmed).unwrap();

        assert!(order.firmed_at.is_some());
        assert!(order.is_committed());
        assert!(matches!(
            order.transition(PlannedOrderStatus::Planned),
            Err(MrpError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_requirement_balance() {
        let mut req = Requirement::new("X", date(1), date(1));
        req.on_hand = Decimal::from(20);
        req.scheduled_receipts = Decimal::from(10);
        req.planned_order_receipt = Decimal::from(80);
        req.gross_requirement = Decimal::from(100);
        req.projected_on_hand = Decimal::from(10);

        assert!(req.balance_holds());
        assert!(req.contains(date(1)));
        assert!(!req.contains(date(2)));
    }

    #[test]
    fn test_plan_lifecycle() {
        let plan = completed_plan();

        assert!(plan.is_completed());
        assert!(plan.completed_at.is_some());
        assert_eq!(plan.planned_orders.len(), 1);
        assert_eq!(plan.open_exception_count(), 1);
    }

    #[test]
    fn test_plan_cannot_complete_twice() {
        let mut plan = completed_plan();

        assert!(plan.begin_calculation().is_err());
        assert!(plan.complete(PlanRecords::default()).is_err());
        assert_eq!(plan.planned_orders.len(), 1);
    }

    #[test]
    fn test_failed_plan_keeps_no_records() {
        let mut plan = MrpPlan::new(
            "W46",
            PlanScope::new(date(1), date(30), BucketGranularity::Day),
            PlanType::Regenerative,
        );
        plan.begin_calculation().unwrap();
        plan.fail("BOM 存在循環引用").unwrap();

        assert_eq!(plan.status, PlanStatus::Error);
        assert_eq!(plan.error.as_deref(), Some("BOM 存在循環引用"));
        assert!(plan.planned_orders.is_empty());
    }

    #[test]
    fn test_order_callbacks_on_completed_plan() {
        let mut plan = completed_plan();
        let order_id = plan.planned_orders[0].id;

        plan.firm_order(order_id).unwrap();
        plan.release_order(order_id).unwrap();
        assert_eq!(plan.committed_orders().len(), 1);

        plan.convert_order(order_id).unwrap();
        assert!(plan.committed_orders().is_empty());
        assert!(plan.cancel_order(order_id).is_err());
        assert!(matches!(
            plan.firm_order(Uuid::new_v4()),
            Err(MrpError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_draft_plan_rejects_callbacks() {
        let mut plan = MrpPlan::new(
            "W47",
            PlanScope::new(date(1), date(30), BucketGranularity::Day),
            PlanType::Regenerative,
        );

        assert!(matches!(
            plan.resolve_exception(Uuid::new_v4(), "planner", None),
            Err(MrpError::PlanNotMutable { .. })
        ));
    }

    #[test]
    fn test_resolve_exception() {
        let mut plan = completed_plan();
        let exception_id = plan.exceptions[0].id;

        plan.resolve_exception(exception_id, "planner-01", None).unwrap();

        assert_eq!(plan.open_exception_count(), 0);
        assert_eq!(plan.exceptions_of(ExceptionType::Shortage).count(), 1);
    }

    #[test]
    fn test_scope_validation() {
        let scope = PlanScope::new(date(10), date(1), BucketGranularity::Week);
        assert!(matches!(scope.validate(), Err(MrpError::InvalidDate(_))));

        let scope = PlanScope::new(date(1), date(10), BucketGranularity::Week).with_items(["A", "B"]);
        assert!(scope.validate().is_ok());
        assert_eq!(scope.items.map(|s| s.len()), Some(2));
    }
}
