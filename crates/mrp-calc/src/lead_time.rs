//! 訂單偏置：由需求日期倒推下達日期，並展開自製件的相依需求

use chrono::NaiveDate;
use mrp_core::{
    Demand, DemandType, Item, PlannedOrder, PlannedOrderType, ProcurementType, Result,
    WorkCalendar,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::bom_graph::BomGraph;

/// 交期計算器
pub struct LeadTimeCalculator;

impl LeadTimeCalculator {
    /// 計算下單日期（向後推算提前期）
    ///
    /// 有工作日曆時跳過非工作日，否則以日曆天相減。
    pub fn calculate_order_date(
        required_date: NaiveDate,
        lead_time_days: u32,
        calendar: Option<&WorkCalendar>,
    ) -> NaiveDate {
        match calendar {
            Some(calendar) => calendar.subtract_working_days(required_date, lead_time_days),
            None => required_date
                .checked_sub_signed(chrono::Duration::days(i64::from(lead_time_days)))
                .unwrap_or(NaiveDate::MIN),
        }
    }

    /// 計算到貨日期（向前推算提前期）
    pub fn calculate_delivery_date(
        order_date: NaiveDate,
        lead_time_days: u32,
        calendar: Option<&WorkCalendar>,
    ) -> NaiveDate {
        match calendar {
            Some(calendar) => calendar.add_working_days(order_date, lead_time_days),
            None => order_date
                .checked_add_signed(chrono::Duration::days(i64::from(lead_time_days)))
                .unwrap_or(NaiveDate::MAX),
        }
    }
}

/// 訂單偏置
pub struct OrderOffsetting<'a> {
    plan_start: NaiveDate,
    include_lead_times: bool,
    calendars: &'a HashMap<String, WorkCalendar>,
}

impl<'a> OrderOffsetting<'a> {
    pub fn new(
        plan_start: NaiveDate,
        include_lead_times: bool,
        calendars: &'a HashMap<String, WorkCalendar>,
    ) -> Self {
        Self {
            plan_start,
            include_lead_times,
            calendars,
        }
    }

    fn calendar_for(&self, item: &Item) -> Option<&'a WorkCalendar> {
        item.calendar_id
            .as_deref()
            .and_then(|id| self.calendars.get(id))
    }

    /// 未截斷的下達日期
    pub fn release_date(&self, item: &Item, due_date: NaiveDate) -> NaiveDate {
        if !self.include_lead_times {
            return due_date;
        }
        LeadTimeCalculator::calculate_order_date(due_date, item.lead_time_days, self.calendar_for(item))
    }

    /// 產生計劃訂單：下達日早於計劃起始日時截斷，原始日期保留在 computed_release_date
    pub fn schedule(
        &self,
        item: &Item,
        due_date: NaiveDate,
        quantity: Decimal,
        sequence: usize,
    ) -> PlannedOrder {
        let computed = self.release_date(item, due_date);
        let release = computed.max(self.plan_start);

        if computed < self.plan_start {
            tracing::debug!(
                "物料 {} 的計劃訂單下達日 {} 早於計劃起始日，截斷為 {}",
                item.item_id,
                computed,
                release
            );
        }

        let order_type = match item.procurement_type {
            ProcurementType::Make => PlannedOrderType::Production,
            ProcurementType::Buy => PlannedOrderType::Purchase,
        };

        let mut order = PlannedOrder::new(item.item_id.clone(), quantity, due_date, release, order_type)
            .with_id(PlannedOrder::planned_id(&item.item_id, due_date, sequence));
        order.computed_release_date = computed;
        order
    }

    /// 自製件訂單 → 子件相依需求
    ///
    /// 子件需求日 = 父件下達日 + BOM 行的偏置天數（不晚於父件需求日）。
    pub fn explode(&self, graph: &BomGraph, item: &Item, order: &PlannedOrder) -> Result<Vec<Demand>> {
        if !item.is_make() || order.quantity <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let demands = graph
            .effective_components_of(&item.item_id, order.release_date)?
            .into_iter()
            .map(|usage| {
                let required_date = order
                    .release_date
                    .checked_add_signed(chrono::Duration::days(i64::from(
                        usage.line.lead_time_offset_days,
                    )))
                    .unwrap_or(order.due_date)
                    .min(order.due_date);

                tracing::debug!(
                    "BOM 展開: {} → {} (數量: {}, 日期: {})",
                    item.item_id,
                    usage.component_id,
                    order.quantity * usage.quantity,
                    required_date
                );

                Demand::new(
                    usage.component_id,
                    order.quantity * usage.quantity,
                    required_date,
                    DemandType::Dependent,
                )
                .with_source_ref(format!("{}:{}", item.item_id, order.id))
            })
            .collect();

        Ok(demands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_core::BomLine;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    #[test]
    fn test_lead_time_calculation_calendar_days() {
        let order_date = LeadTimeCalculator::calculate_order_date(date(20), 5, None);
        assert_eq!(order_date, date(15));
        assert_eq!(LeadTimeCalculator::calculate_delivery_date(order_date, 5, None), date(20));
    }

    #[test]
    fn test_lead_time_calculation_weekday_only() {
        // 標準工作日曆（週一到週五）
        let calendar = WorkCalendar::default();
        let required_date = date(10); // 星期一

        let order_date = LeadTimeCalculator::calculate_order_date(required_date, 5, Some(&calendar));

        assert_eq!(order_date, date(3));
        assert_eq!(
            LeadTimeCalculator::calculate_delivery_date(order_date, 5, Some(&calendar)),
            required_date
        );
    }

    #[test]
    fn test_item_calendar_used_when_assigned() {
        let calendars = HashMap::from([("WEEKDAYS".to_string(), WorkCalendar::default())]);
        let offsetting = OrderOffsetting::new(date(1), true, &calendars);

        let with_calendar = Item::new("A", 5, ProcurementType::Buy).with_calendar("WEEKDAYS");
        let unknown_calendar = Item::new("B", 5, ProcurementType::Buy).with_calendar("NIGHTS");

        assert_eq!(offsetting.release_date(&with_calendar, date(10)), date(3));
        assert_eq!(offsetting.release_date(&unknown_calendar, date(10)), date(5));
    }

    #[test]
    fn test_schedule_clamps_past_due_release() {
        let calendars = HashMap::new();
        let offsetting = OrderOffsetting::new(date(10), true, &calendars);
        let item = Item::new("X", 5, ProcurementType::Make);

        let order = offsetting.schedule(&item, date(12), Decimal::from(40), 0);

        assert_eq!(order.release_date, date(10));
        assert_eq!(order.computed_release_date, date(7));
        assert_eq!(order.order_type, PlannedOrderType::Production);
        assert_eq!(order.id, PlannedOrder::planned_id("X", date(12), 0));
    }

    #[test]
    fn test_lead_times_disabled() {
        let calendars = HashMap::new();
        let offsetting = OrderOffsetting::new(date(1), false, &calendars);
        let item = Item::new("X", 5, ProcurementType::Buy);

        assert_eq!(offsetting.release_date(&item, date(20)), date(20));
    }

    #[test]
    fn test_explosion_is_stable() {
        let items = vec![
            Item::new("BIKE", 3, ProcurementType::Make),
            Item::new("SPOKE", 1, ProcurementType::Buy),
            Item::new("SEAT", 1, ProcurementType::Buy),
        ];
        let graph = BomGraph::build(
            &items,
            &[
                BomLine::new("BIKE", "SPOKE", Decimal::from(72)).with_scrap_rate(Decimal::new(5, 2)),
                BomLine::new("BIKE", "SEAT", Decimal::ONE).with_lead_time_offset(10),
            ],
        )
        .unwrap();
        let calendars = HashMap::new();
        let offsetting = OrderOffsetting::new(date(1), true, &calendars);
        let order = offsetting.schedule(&items[0], date(20), Decimal::from(10), 0);

        let first = offsetting.explode(&graph, &items[0], &order).unwrap();
        let second = offsetting.explode(&graph, &items[0], &order).unwrap();

        let quantities = |demands: &[Demand]| -> Vec<(String, Decimal, NaiveDate)> {
            demands
                .iter()
                .map(|d| (d.item_id.clone(), d.quantity, d.required_date))
                .collect()
        };
        assert_eq!(quantities(&first), quantities(&second));
        assert_eq!(
            quantities(&first),
            vec![
                ("SPOKE".to_string(), Decimal::new(756, 0), date(17)),
                ("SEAT".to_string(), Decimal::from(10), date(20)),
            ]
        );
        assert!(first.iter().all(|d| d.is_dependent()));
    }

    #[test]
    fn test_buy_orders_do_not_explode() {
        let items = vec![Item::new("KIT", 1, ProcurementType::Buy), Item::new("PART", 1, ProcurementType::Buy)];
        let graph = BomGraph::build(&items, &[BomLine::new("KIT", "PART", Decimal::ONE)]).unwrap();
        let calendars = HashMap::new();
        let offsetting = OrderOffsetting::new(date(1), true, &calendars);
        let order = offsetting.schedule(&items[0], date(20), Decimal::from(10), 0);

        assert!(offsetting.explode(&graph, &items[0], &order).unwrap().is_empty());
    }
}
