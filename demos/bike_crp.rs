//! # 腳踏車 MRP + CRP 範例
//!
//! 以計劃引擎執行：快照 → MRP → 產能負荷 → 寫入儲存庫，之後追加訂單做淨改變。
//! 設定 `RUST_LOG=debug` 可看到逐層計算日誌。

use chrono::NaiveDate;
use mrp::*;
use rust_decimal::Decimal;

fn date(day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 11, day).ok_or_else(|| anyhow::anyhow!("無效日期 11/{day}"))
}

fn snapshot() -> anyhow::Result<PlanningSnapshot> {
    let items = vec![
        Item::new("BIKE-001", 2, ProcurementType::Make),
        Item::new("FRAME-001", 3, ProcurementType::Make),
        Item::new("WHEEL-001", 5, ProcurementType::Buy),
    ];
    let bom_lines = vec![
        BomLine::new("BIKE-001", "FRAME-001", Decimal::ONE),
        BomLine::new("BIKE-001", "WHEEL-001", Decimal::from(2)),
    ];

    // 組裝線週一至週四每日 10 小時；焊接兩班制
    let four_day_week = WorkCalendar::new("MON-THU".to_string())
        .with_working_days([true, true, true, true, false, false, false]);
    let work_centers = vec![
        WorkCenter::new(
            "WC-ASM",
            "組裝線",
            WorkCenterCalendar::single_shift(four_day_week, Decimal::from(10)),
        )
        .with_type(WorkCenterType::Labor),
        WorkCenter::new(
            "WC-WELD",
            "焊接",
            WorkCenterCalendar::single_shift(WorkCalendar::default(), Decimal::from(8))
                .with_shift(ShiftSchedule::new("NIGHT", Decimal::from(8)))
                .with_downtime(date(12)?, Decimal::from(8), Some("保養".to_string())),
        )
        .with_type(WorkCenterType::Machine)
        .with_efficiency(Decimal::new(9, 1)),
    ];
    let routings = vec![
        Routing::new(
            "BIKE-001",
            vec![RoutingOperation::new(10, "WC-ASM", Decimal::ONE, Decimal::new(48, 2)).with_name("總裝")],
        ),
        Routing::new(
            "FRAME-001",
            vec![
                RoutingOperation::new(10, "WC-WELD", Decimal::from(2), Decimal::new(3, 1))
                    .with_name("焊接")
                    .with_queue_and_move(Decimal::from(4), Decimal::from(2)),
                RoutingOperation::new(20, "WC-ASM", Decimal::ZERO, Decimal::new(1, 1)).with_name("校正"),
            ],
        ),
    ];

    Ok(PlanningSnapshot::new(items, bom_lines)
        .with_routings(routings, work_centers)
        .with_demands(vec![
            Demand::new("BIKE-001", Decimal::from(50), date(13)?, DemandType::SalesOrder),
            Demand::new("BIKE-001", Decimal::from(50), date(14)?, DemandType::SalesOrder),
        ]))
}

fn print_capacity(run: &PlanRun) {
    let Some(capacity) = &run.capacity else {
        return;
    };
    println!("🏭 產能負荷（{}）:", capacity.name);
    for req in capacity.requirements.iter().filter(|r| r.operation_count > 0) {
        println!(
            "   {:<8} {} 需求 {:>6} h / 可用 {:>6} h，負荷 {}",
            req.work_center_id,
            req.period_start,
            req.required_hours,
            req.available_hours,
            req.load_percent
                .map(|p| format!("{}%", p.round_dp(1)))
                .unwrap_or_else(|| "無可用產能".to_string())
        );
    }
    for exception in &capacity.exceptions {
        println!("   [{:?}] {}", exception.severity, exception.message);
    }
    println!();
}

fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Json);
    println!("🚲 ===== 腳踏車 MRP + CRP 範例 =====");
    println!();

    let base = snapshot()?;
    let engine = PlanningEngine::new(InMemoryPlanRepository::new(base.clone()), PlanningConfig::default())
        .with_capacity(CapacityConfig::new(BucketGranularity::Week));
    let scope = PlanScope::new(date(3)?, date(30)?, BucketGranularity::Day);
    let cancel = CancellationToken::new();

    // ========== 1. 全面重算 ==========
    let first = engine.run("2025-W45", scope.clone(), &cancel)?;
    println!("📋 {}：計劃訂單 {} 筆", first.mrp.name, first.mrp.planned_orders.len());
    print_capacity(&first);

    // ========== 2. 追加訂單，淨改變 ==========
    let mut changed = base.clone();
    changed
        .demands
        .push(Demand::new("FRAME-001", Decimal::from(30), date(20)?, DemandType::SalesOrder));
    let tracker = DirtyTracker::diff(&base, &changed);
    engine.repository().replace_snapshot(changed)?;

    let second = engine.net_change("2025-W45-NC", scope, &tracker, &cancel)?;
    println!(
        "🔁 {}（取代 {:?}）：重算物料 {:?}",
        second.mrp.name,
        second.mrp.supersedes,
        tracker.dirty_items()
    );
    print_capacity(&second);

    Ok(())
}
