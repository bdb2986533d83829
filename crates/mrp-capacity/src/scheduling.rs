//! 工序排程：依工作中心日曆決定每道工序佔用的工作日

use chrono::NaiveDate;
use mrp_core::{
    MrpError, PlannedOrder, Result, Routing, RoutingOperation, SchedulingDirection, WorkCenter,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// 已排程的工序
#[derive(Debug, Clone)]
pub struct ScheduledOperation<'a> {
    pub operation: &'a RoutingOperation,
    pub start_date: NaiveDate,
    /// 最後一個佔用的工作日
    pub end_date: NaiveDate,
    pub working_days: u32,
    pub setup_hours: Decimal,
    pub run_hours: Decimal,
    /// 等候 + 搬運（只影響排程，不計入負荷）
    pub queue_move_hours: Decimal,
}

/// 工序排程器
pub struct OperationScheduler<'a> {
    work_centers: &'a HashMap<&'a str, &'a WorkCenter>,
    direction: SchedulingDirection,
    include_setup: bool,
}

impl<'a> OperationScheduler<'a> {
    pub fn new(
        work_centers: &'a HashMap<&'a str, &'a WorkCenter>,
        direction: SchedulingDirection,
        include_setup: bool,
    ) -> Self {
        Self {
            work_centers,
            direction,
            include_setup,
        }
    }

    /// 佔用工作日數 = ceil(總時間 / 每日工時)
    pub fn occupied_days(elapsed_hours: Decimal, hours_per_day: Decimal) -> u32 {
        if elapsed_hours <= Decimal::ZERO {
            return 0;
        }
        if hours_per_day <= Decimal::ZERO {
            return 1;
        }
        (elapsed_hours / hours_per_day)
            .ceil()
            .to_u32()
            .unwrap_or(u32::MAX)
    }

    fn work_center(&self, work_center_id: &str) -> Result<&'a WorkCenter> {
        self.work_centers
            .get(work_center_id)
            .copied()
            .ok_or_else(|| MrpError::UnknownWorkCenter(work_center_id.to_string()))
    }

    /// 排程一張生產訂單的全部工序（依工序序號回傳）
    pub fn schedule<'r>(
        &self,
        order: &PlannedOrder,
        routing: &'r Routing,
    ) -> Result<Vec<ScheduledOperation<'r>>> {
        let mut scheduled = Vec::with_capacity(routing.operations.len());

        match self.direction {
            // 由需求日往回排：最後一道工序須在需求日前完成
            SchedulingDirection::Backward => {
                let mut cursor = order.due_date;
                for operation in routing.operations.iter().rev() {
                    let work_center = self.work_center(&operation.work_center_id)?;
                    let calendar = &work_center.calendar.calendar;
                    let days = Self::occupied_days(
                        operation.elapsed_hours(order.quantity, self.include_setup),
                        work_center.calendar.standard_daily_hours(),
                    );

                    let (start, end) = if days == 0 {
                        (cursor, cursor)
                    } else {
                        let start = calendar.subtract_working_days(cursor, days);
                        (start, calendar.add_working_days(start, days - 1))
                    };
                    cursor = start;
                    scheduled.push(self.entry(operation, order.quantity, start, end, days));
                }
                scheduled.reverse();
            }
            // 由下達日往後排
            SchedulingDirection::Forward => {
                let mut cursor = order.release_date;
                for operation in &routing.operations {
                    let work_center = self.work_center(&operation.work_center_id)?;
                    let calendar = &work_center.calendar.calendar;
                    let days = Self::occupied_days(
                        operation.elapsed_hours(order.quantity, self.include_setup),
                        work_center.calendar.standard_daily_hours(),
                    );

                    let start = if calendar.is_working_day(cursor) {
                        cursor
                    } else {
                        calendar.add_working_days(cursor, 1)
                    };
                    let end = if days == 0 {
                        start
                    } else {
                        calendar.add_working_days(start, days - 1)
                    };
                    cursor = if days == 0 {
                        start
                    } else {
                        calendar.add_working_days(end, 1)
                    };
                    scheduled.push(self.entry(operation, order.quantity, start, end, days));
                }
            }
        }

        Ok(scheduled)
    }

    fn entry<'r>(
        &self,
        operation: &'r RoutingOperation,
        quantity: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
        working_days: u32,
    ) -> ScheduledOperation<'r> {
        ScheduledOperation {
            operation,
            start_date,
            end_date,
            working_days,
            setup_hours: if self.include_setup {
                operation.setup_hours
            } else {
                Decimal::ZERO
            },
            run_hours: operation.run_hours(quantity),
            queue_move_hours: operation.queue_hours + operation.move_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_core::{PlannedOrderType, WorkCenterCalendar};
    use rstest::rstest;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn centers() -> Vec<WorkCenter> {
        vec![
            WorkCenter::new("WC-A", "焊接", WorkCenterCalendar::default()),
            WorkCenter::new("WC-B", "噴漆", WorkCenterCalendar::default()),
        ]
    }

    fn routing() -> Routing {
        Routing::new(
            "FRAME",
            vec![
                RoutingOperation::new(20, "WC-B", Decimal::ZERO, Decimal::new(5, 1)),
                RoutingOperation::new(10, "WC-A", dec(2), Decimal::ONE),
            ],
        )
    }

    fn order(release: NaiveDate, due: NaiveDate) -> PlannedOrder {
        PlannedOrder::new("FRAME", dec(10), due, release, PlannedOrderType::Production)
    }

    #[rstest]
    #[case(dec(25), dec(10), 3)]
    #[case(dec(8), dec(8), 1)]
    #[case(Decimal::ZERO, dec(8), 0)]
    #[case(dec(5), Decimal::ZERO, 1)]
    fn test_occupied_days(#[case] hours: Decimal, #[case] per_day: Decimal, #[case] expected: u32) {
        assert_eq!(OperationScheduler::occupied_days(hours, per_day), expected);
    }

    #[test]
    fn test_backward_scheduling_chains_operations() {
        let centers = centers();
        let map: HashMap<&str, &WorkCenter> = centers.iter().map(|w| (w.id.as_str(), w)).collect();
        let scheduler = OperationScheduler::new(&map, SchedulingDirection::Backward, true);
        let routing = routing();

        let ops = scheduler.schedule(&order(date(1), date(7)), &routing).unwrap();

        // OP10: 2 + 10 = 12h → 2 天；OP20: 5h → 1 天
        assert_eq!(ops[0].operation.sequence, 10);
        assert_eq!((ops[0].start_date, ops[0].end_date), (date(4), date(5)));
        assert_eq!(ops[0].working_days, 2);
        assert_eq!((ops[1].start_date, ops[1].end_date), (date(6), date(6)));
        assert_eq!(ops[0].setup_hours + ops[0].run_hours, dec(12));
    }

    #[test]
    fn test_forward_scheduling_skips_weekend() {
        let centers = centers();
        let map: HashMap<&str, &WorkCenter> = centers.iter().map(|w| (w.id.as_str(), w)).collect();
        let scheduler = OperationScheduler::new(&map, SchedulingDirection::Forward, true);
        let routing = routing();

        // 11/1 為星期六
        let ops = scheduler.schedule(&order(date(1), date(14)), &routing).unwrap();

        assert_eq!((ops[0].start_date, ops[0].end_date), (date(3), date(4)));
        assert_eq!((ops[1].start_date, ops[1].end_date), (date(5), date(5)));
    }

    #[test]
    fn test_setup_excluded_when_disabled() {
        let centers = centers();
        let map: HashMap<&str, &WorkCenter> = centers.iter().map(|w| (w.id.as_str(), w)).collect();
        let scheduler = OperationScheduler::new(&map, SchedulingDirection::Backward, false);
        let routing = routing();

        let ops = scheduler.schedule(&order(date(1), date(7)), &routing).unwrap();

        assert_eq!(ops[0].setup_hours, Decimal::ZERO);
        assert_eq!(ops[0].working_days, 2);
    }

    #[test]
    fn test_unknown_work_center() {
        let map: HashMap<&str, &WorkCenter> = HashMap::new();
        let scheduler = OperationScheduler::new(&map, SchedulingDirection::Backward, true);
        let routing = routing();

        let err = scheduler.schedule(&order(date(1), date(7)), &routing).unwrap_err();
        assert!(matches!(err, MrpError::UnknownWorkCenter(ref id) if id == "WC-B"));
    }
}
