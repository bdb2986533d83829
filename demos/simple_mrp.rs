//! 簡單 MRP 計算示例：單一物料、批對批、含安全庫存

use chrono::NaiveDate;
use mrp::{
    init_tracing, BucketGranularity, CancellationToken, Demand, DemandType, Item, LogFormat,
    MrpCalculator, MrpPlan, PlanScope, PlanType, PlanningConfig, PlanningSnapshot,
    ProcurementType,
};
use rust_decimal::Decimal;

fn date(day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 11, day).ok_or_else(|| anyhow::anyhow!("無效日期 11/{day}"))
}

fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Pretty);
    println!("=== 簡單 MRP 計算示例 ===\n");

    let start = date(1)?;
    let end = date(30)?;

    let item = Item::new("BIKE-001", 5, ProcurementType::Buy)
        .with_description("腳踏車（外購）")
        .with_safety_stock(Decimal::from(10));

    let demands = vec![Demand::new(
        "BIKE-001",
        Decimal::from(100),
        date(20)?,
        DemandType::SalesOrder,
    )
    .with_source_ref("SO-001")
    .with_priority(5)];

    println!("需求清單:");
    for demand in &demands {
        println!(
            "  - 物料: {}, 數量: {}, 需求日期: {}",
            demand.item_id, demand.quantity, demand.required_date
        );
    }

    let snapshot = PlanningSnapshot::new(vec![item], vec![]).with_demands(demands);
    let calculator = MrpCalculator::new(snapshot, PlanningConfig::default())?;

    let mut plan = MrpPlan::new(
        "示例計劃",
        PlanScope::new(start, end, BucketGranularity::Day),
        PlanType::Regenerative,
    );
    calculator.execute(&mut plan, &CancellationToken::new())?;

    println!("\n計劃訂單:");
    for order in &plan.planned_orders {
        println!(
            "  - {} 數量 {}，下達 {}，到期 {}",
            order.item_id, order.quantity, order.release_date, order.due_date
        );
    }

    Ok(())
}
