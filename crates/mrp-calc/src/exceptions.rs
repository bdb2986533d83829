//! 例外偵測
//!
//! 無狀態：只讀取時間桶記錄、計劃訂單與產能需求，產生例外訊息，不修改任何輸入。

use chrono::NaiveDate;
use mrp_core::{
    CapacityConfig, CapacityRequirement, Exception, ExceptionType, Item, PlannedOrder,
    PlannedOrderStatus, PlanningConfig, Requirement, Severity,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::netting::FirmedOrderCheck;

/// 單一物料的偵測輸入
#[derive(Debug, Clone, Copy)]
pub struct ItemExceptionInput<'a> {
    pub item: &'a Item,
    pub requirements: &'a [Requirement],
    pub orders: &'a [PlannedOrder],
    /// 時界外的需求量
    pub overflow_demand: Decimal,
}

/// 例外偵測器
pub struct ExceptionDetector;

impl ExceptionDetector {
    /// 物料層級的全部規則（不含確認訂單比對）
    pub fn detect_item(
        input: &ItemExceptionInput<'_>,
        config: &PlanningConfig,
        plan_start: NaiveDate,
    ) -> Vec<Exception> {
        let mut exceptions = Self::past_due(input.orders, plan_start);
        exceptions.extend(Self::shortages(input));
        exceptions.extend(Self::excess_inventory(
            &input.item.item_id,
            input.requirements,
            config.excess_inventory_multiple,
            config.excess_inventory_periods,
        ));
        exceptions
    }

    /// 過期：提前期推算的下達日早於計劃起始日
    pub fn past_due(orders: &[PlannedOrder], plan_start: NaiveDate) -> Vec<Exception> {
        orders
            .iter()
            .filter(|o| matches!(o.status, PlannedOrderStatus::Planned | PlannedOrderStatus::Firmed))
            .filter(|o| o.computed_release_date < plan_start)
            .map(|o| {
                let late_days = (plan_start - o.computed_release_date).num_days();
                Exception::new(
                    ExceptionType::PastDue,
                    Severity::Warning,
                    format!(
                        "物料 {} 的計劃訂單應於 {} 下達，已落後 {} 天",
                        o.item_id, o.computed_release_date, late_days
                    ),
                )
                .for_item(o.item_id.clone())
                .for_order(o.id)
                .in_period(o.due_date)
                .with_suggested_action("加急處理或調整需求日期")
            })
            .collect()
    }

    /// 缺料：淨需求未被新訂單涵蓋，或時界外需求超過期末庫存
    ///
    /// 未補足的缺口會帶到後續各期，只在缺口擴大的時間桶報告。
    pub fn shortages(input: &ItemExceptionInput<'_>) -> Vec<Exception> {
        let item_id = &input.item.item_id;
        let mut reported = Decimal::ZERO;
        let mut exceptions: Vec<Exception> = input
            .requirements
            .iter()
            .filter_map(|r| {
                let uncovered = (r.net_requirement - r.new_planned_receipts()).max(Decimal::ZERO);
                let widened = uncovered > reported;
                reported = uncovered;
                widened.then(|| {
                    Exception::new(
                        ExceptionType::Shortage,
                        Severity::Critical,
                        format!("物料 {item_id} 於 {} 缺料 {uncovered}", r.period_start),
                    )
                    .for_item(item_id.clone())
                    .in_period(r.period_start)
                    .with_suggested_action("手動建立補貨訂單")
                })
            })
            .collect();

        if input.overflow_demand > Decimal::ZERO {
            let ending = input
                .requirements
                .last()
                .map(|r| r.projected_on_hand)
                .unwrap_or_default()
                .max(Decimal::ZERO);
            if input.overflow_demand > ending {
                exceptions.push(
                    Exception::new(
                        ExceptionType::Shortage,
                        Severity::Warning,
                        format!(
                            "物料 {item_id} 時界外需求 {} 超過期末預計庫存 {ending}",
                            input.overflow_demand
                        ),
                    )
                    .for_item(item_id.clone())
                    .with_suggested_action("延長計劃時界"),
                );
            }
        }

        exceptions
    }

    /// 庫存過高：預計庫存連續 N 期超過平均毛需求的倍數，每段只報一次
    pub fn excess_inventory(
        item_id: &str,
        requirements: &[Requirement],
        multiple: Decimal,
        periods: usize,
    ) -> Vec<Exception> {
        if requirements.is_empty() {
            return Vec::new();
        }

        let total: Decimal = requirements.iter().map(|r| r.gross_requirement).sum();
        let average = total / Decimal::from(requirements.len());
        let threshold = average * multiple;
        let periods = periods.max(1);

        let mut exceptions = Vec::new();
        let mut run_start = 0;
        let mut run_length = 0;

        for (t, record) in requirements.iter().enumerate() {
            if record.projected_on_hand > threshold {
                if run_length == 0 {
                    run_start = t;
                }
                run_length += 1;
                if run_length == periods {
                    let start = &requirements[run_start];
                    exceptions.push(
                        Exception::new(
                            ExceptionType::ExcessInventory,
                            Severity::Info,
                            format!(
                                "物料 {item_id} 自 {} 起連續 {periods} 期預計庫存高於平均需求 {average} 的 {multiple} 倍",
                                start.period_start
                            ),
                        )
                        .for_item(item_id)
                        .in_period(start.period_start)
                        .with_suggested_action("延後或取消補貨訂單"),
                    );
                }
            } else {
                run_length = 0;
            }
        }

        exceptions
    }

    /// 確認訂單的需求數量/日期與確認值不同（僅提示，不自動修改）
    pub fn firmed_order_changes(checks: &[FirmedOrderCheck]) -> Vec<Exception> {
        let mut exceptions = Vec::new();
        for check in checks {
            if check.quantity_changed() {
                exceptions.push(
                    Exception::new(
                        ExceptionType::OrderQuantityChange,
                        Severity::Info,
                        format!(
                            "確認訂單 {} 數量 {}，本次需要 {}",
                            check.order_id, check.firmed_quantity, check.needed_quantity
                        ),
                    )
                    .for_item(check.item_id.clone())
                    .for_order(check.order_id)
                    .in_period(check.firmed_due)
                    .with_suggested_action(format!("調整數量為 {}", check.needed_quantity)),
                );
            }
            if let (true, Some(needed)) = (check.date_changed, check.needed_date) {
                exceptions.push(
                    Exception::new(
                        ExceptionType::OrderDateChange,
                        Severity::Info,
                        format!(
                            "確認訂單 {} 需求日 {}，本次需要 {}",
                            check.order_id, check.firmed_due, needed
                        ),
                    )
                    .for_item(check.item_id.clone())
                    .for_order(check.order_id)
                    .in_period(needed)
                    .with_suggested_action(if needed < check.firmed_due {
                        "提前交期"
                    } else {
                        "延後交期"
                    }),
                );
            }
        }
        exceptions
    }

    /// 產能規則：超載、瓶頸、低負荷
    pub fn capacity(requirements: &[CapacityRequirement], config: &CapacityConfig) -> Vec<Exception> {
        let mut exceptions = Vec::new();

        for req in requirements {
            match req.load_percent {
                Some(load) if load > config.overload_threshold => {
                    let severity = if load > config.critical_threshold {
                        Severity::Critical
                    } else {
                        Severity::Warning
                    };
                    exceptions.push(
                        Exception::new(
                            ExceptionType::CapacityOverload,
                            severity,
                            format!(
                                "工作中心 {} 於 {} 負荷 {}%（需求 {} 小時，可用 {} 小時）",
                                req.work_center_id,
                                req.period_start,
                                load.round_dp(1),
                                req.required_hours,
                                req.available_hours
                            ),
                        )
                        .for_work_center(req.work_center_id.clone())
                        .in_period(req.period_start)
                        .with_suggested_action("加班、外包或調整訂單日期"),
                    );
                }
                None if req.required_hours > Decimal::ZERO => {
                    exceptions.push(
                        Exception::new(
                            ExceptionType::CapacityOverload,
                            Severity::Critical,
                            format!(
                                "工作中心 {} 於 {} 無可用產能，需求 {} 小時",
                                req.work_center_id, req.period_start, req.required_hours
                            ),
                        )
                        .for_work_center(req.work_center_id.clone())
                        .in_period(req.period_start),
                    );
                }
                Some(load) => {
                    if let Some(underload) = config.underload_threshold {
                        if load < underload {
                            exceptions.push(
                                Exception::new(
                                    ExceptionType::Underload,
                                    Severity::Info,
                                    format!(
                                        "工作中心 {} 於 {} 負荷僅 {}%",
                                        req.work_center_id,
                                        req.period_start,
                                        load.round_dp(1)
                                    ),
                                )
                                .for_work_center(req.work_center_id.clone())
                                .in_period(req.period_start),
                            );
                        }
                    }
                }
                None => {}
            }
        }

        exceptions.extend(Self::bottlenecks(requirements, config.bottleneck_share));
        exceptions
    }

    /// 瓶頸：單一工作中心佔全部產能不足工時的比例達門檻
    fn bottlenecks(requirements: &[CapacityRequirement], share: Decimal) -> Vec<Exception> {
        let mut shortage_by_center: BTreeMap<&str, Decimal> = BTreeMap::new();
        for req in requirements {
            *shortage_by_center.entry(req.work_center_id.as_str()).or_default() +=
                req.shortage_hours();
        }

        let total: Decimal = shortage_by_center.values().copied().sum();
        if total <= Decimal::ZERO {
            return Vec::new();
        }

        shortage_by_center
            .into_iter()
            .filter(|(_, hours)| *hours > Decimal::ZERO && *hours / total >= share)
            .map(|(center, hours)| {
                let percent = (hours / total * Decimal::ONE_HUNDRED).round_dp(1);
                Exception::new(
                    ExceptionType::Bottleneck,
                    Severity::Critical,
                    format!("工作中心 {center} 佔全部產能缺口的 {percent}%（{hours} 小時）"),
                )
                .for_work_center(center)
                .with_suggested_action("增加班次或轉移工序")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_core::{PlannedOrderType, ProcurementType};
    use rstest::rstest;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn record(day: u32, gross: i64, poh: i64) -> Requirement {
        let mut r = Requirement::new("X", date(day), date(day));
        r.gross_requirement = dec(gross);
        r.projected_on_hand = dec(poh);
        r
    }

    #[test]
    fn test_single_past_due_per_order() {
        let mut late = PlannedOrder::new("X", dec(10), date(12), date(10), PlannedOrderType::Purchase);
        late.computed_release_date = date(7);
        let on_time = PlannedOrder::new("X", dec(10), date(20), date(15), PlannedOrderType::Purchase);

        let exceptions = ExceptionDetector::past_due(&[late.clone(), on_time], date(10));

        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].exception_type, ExceptionType::PastDue);
        assert_eq!(exceptions[0].order_id, Some(late.id));
        assert_eq!(exceptions[0].severity, Severity::Warning);
    }

    #[test]
    fn test_released_orders_are_not_past_due() {
        let mut released = PlannedOrder::new("X", dec(10), date(12), date(10), PlannedOrderType::Purchase);
        released.computed_release_date = date(7);
        released.status = PlannedOrderStatus::Released;

        assert!(ExceptionDetector::past_due(&[released], date(10)).is_empty());
    }

    #[test]
    fn test_uncovered_net_is_shortage() {
        let item = Item::new("X", 1, ProcurementType::Buy).with_mrp_enabled(false);
        let mut short = record(5, 40, -40);
        short.net_requirement = dec(40);

        let input = ItemExceptionInput {
            item: &item,
            requirements: &[record(4, 0, 0), short],
            orders: &[],
            overflow_demand: Decimal::ZERO,
        };
        let exceptions = ExceptionDetector::shortages(&input);

        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].severity, Severity::Critical);
        assert_eq!(exceptions[0].period, Some(date(5)));
    }

    #[test]
    fn test_carried_deficit_reported_once() {
        let item = Item::new("X", 1, ProcurementType::Buy).with_mrp_enabled(false);
        let mut first = record(5, 40, -40);
        first.net_requirement = dec(40);
        let mut carried = record(6, 0, -40);
        carried.net_requirement = dec(40);
        let mut widened = record(7, 30, -70);
        widened.net_requirement = dec(70);

        let input = ItemExceptionInput {
            item: &item,
            requirements: &[first, carried, widened],
            orders: &[],
            overflow_demand: Decimal::ZERO,
        };
        let periods: Vec<_> = ExceptionDetector::shortages(&input)
            .into_iter()
            .map(|e| e.period)
            .collect();

        assert_eq!(periods, vec![Some(date(5)), Some(date(7))]);
    }

    #[test]
    fn test_overflow_beyond_surplus_is_warning() {
        let item = Item::new("X", 1, ProcurementType::Buy);
        let requirements = [record(4, 0, 25)];
        let input = ItemExceptionInput {
            item: &item,
            requirements: &requirements,
            orders: &[],
            overflow_demand: dec(30),
        };

        let exceptions = ExceptionDetector::shortages(&input);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].severity, Severity::Warning);

        let covered = ItemExceptionInput {
            overflow_demand: dec(20),
            ..input
        };
        assert!(ExceptionDetector::shortages(&covered).is_empty());
    }

    #[test]
    fn test_excess_inventory_reported_once_per_run() {
        // 平均毛需求 10，門檻 30
        let requirements = vec![
            record(1, 20, 40),
            record(2, 10, 35),
            record(3, 10, 31),
            record(4, 0, 31),
            record(5, 10, 5),
            record(6, 10, 50),
        ];

        let exceptions = ExceptionDetector::excess_inventory("X", &requirements, dec(3), 3);

        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].period, Some(date(1)));
    }

    #[test]
    fn test_excess_with_zero_demand() {
        let requirements = vec![record(1, 0, 1), record(2, 0, 1)];
        assert_eq!(ExceptionDetector::excess_inventory("X", &requirements, dec(3), 2).len(), 1);
    }

    #[test]
    fn test_firmed_order_changes() {
        let check = FirmedOrderCheck {
            order_id: uuid::Uuid::new_v4(),
            item_id: "X".to_string(),
            firmed_quantity: dec(100),
            firmed_due: date(15),
            needed_quantity: dec(80),
            needed_date: Some(date(10)),
            date_changed: true,
        };

        let exceptions = ExceptionDetector::firmed_order_changes(&[check]);
        let types: Vec<_> = exceptions.iter().map(|e| e.exception_type).collect();

        assert_eq!(types, vec![ExceptionType::OrderQuantityChange, ExceptionType::OrderDateChange]);
        assert!(exceptions.iter().all(|e| e.severity == Severity::Info));
    }

    fn capacity_req(center: &str, day: u32, required: i64, available: i64) -> CapacityRequirement {
        let mut req = CapacityRequirement::new(center, date(day), date(day + 6), dec(available));
        req.run_hours = dec(required);
        req.finalize(dec(100));
        req
    }

    #[rstest]
    #[case(50, Some(Severity::Critical))]
    #[case(44, Some(Severity::Warning))]
    #[case(40, None)]
    fn test_overload_severity(#[case] required: i64, #[case] expected: Option<Severity>) {
        let config = CapacityConfig::default();
        let exceptions = ExceptionDetector::capacity(&[capacity_req("WELD", 3, required, 40)], &config);

        let overload = exceptions
            .iter()
            .find(|e| e.exception_type == ExceptionType::CapacityOverload)
            .map(|e| e.severity);
        assert_eq!(overload, expected);
    }

    #[test]
    fn test_bottleneck_share() {
        let config = CapacityConfig::default();
        let requirements = [
            capacity_req("WELD", 3, 70, 40),
            capacity_req("PAINT", 3, 45, 40),
            capacity_req("ASSY", 3, 10, 40),
        ];

        let exceptions = ExceptionDetector::capacity(&requirements, &config);
        let bottlenecks: Vec<_> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::Bottleneck)
            .collect();

        assert_eq!(bottlenecks.len(), 1);
        assert_eq!(bottlenecks[0].work_center_id.as_deref(), Some("WELD"));
    }

    #[test]
    fn test_underload_optional() {
        let requirements = [capacity_req("ASSY", 3, 10, 40)];

        assert!(ExceptionDetector::capacity(&requirements, &CapacityConfig::default()).is_empty());

        let config = CapacityConfig::default().with_underload_threshold(dec(50));
        let exceptions = ExceptionDetector::capacity(&requirements, &config);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].exception_type, ExceptionType::Underload);
    }
}
