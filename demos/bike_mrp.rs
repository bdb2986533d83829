//! # 腳踏車 MRP 計算完整範例
//!
//! 這個範例展示完整的 MRP 計算流程：
//! - 產品：腳踏車
//! - 零件：車架、鋼管、輪子、座椅
//! - 需求：銷售訂單 + 預測
//! - 批量規則：不同零件使用不同策略

use chrono::NaiveDate;
use mrp::*;
use rust_decimal::Decimal;

fn date(month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, month, day).ok_or_else(|| anyhow::anyhow!("無效日期 {month}/{day}"))
}

fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Pretty);
    println!("🚲 ===== 腳踏車 MRP 計算範例 =====");
    println!();

    // ========== 1. 建立工作日曆 ==========
    println!("📅 步驟 1: 建立工廠工作日曆");
    let calendar = WorkCalendar::from_shift_data(
        "FACTORY".to_string(),
        vec![true, true, true, true, true, false, false],
        vec![date(11, 11)?],
    );
    println!("   ✓ 週一至週五，11/11 休假");
    println!();

    // ========== 2. 物料主檔 ==========
    println!("⚙️  步驟 2: 設定各物料 MRP 參數");
    let items = vec![
        Item::new("BIKE-001", 2, ProcurementType::Make)
            .with_description("腳踏車")
            .with_calendar("FACTORY")
            .with_safety_stock(Decimal::from(5)),
        Item::new("FRAME-001", 3, ProcurementType::Make)
            .with_description("車架")
            .with_calendar("FACTORY")
            .with_lot_sizing(LotSizingPolicy::FixedOrderQuantity {
                quantity: Decimal::from(100),
            }),
        Item::new("TUBE-001", 4, ProcurementType::Buy)
            .with_description("鋼管")
            .with_unit_of_measure("M")
            .with_lot_sizing(LotSizingPolicy::MinMax {
                min: Decimal::from(50),
                max: Decimal::from(400),
            }),
        Item::new("WHEEL-001", 5, ProcurementType::Buy)
            .with_description("輪子")
            .with_lot_sizing(LotSizingPolicy::PeriodOrderQuantity { periods: 2 })
            .with_safety_stock(Decimal::from(20)),
        Item::new("SEAT-001", 7, ProcurementType::Buy).with_description("座椅"),
    ];
    for item in &items {
        println!("   ✓ {}: {:?}, 提前期 {} 天", item.item_id, item.lot_sizing, item.lead_time_days);
    }
    println!();

    // ========== 3. BOM 結構 ==========
    println!("🔧 步驟 3: 建立 BOM 結構");
    let bom_lines = vec![
        BomLine::new("BIKE-001", "FRAME-001", Decimal::ONE),
        BomLine::new("BIKE-001", "WHEEL-001", Decimal::from(2)),
        BomLine::new("BIKE-001", "SEAT-001", Decimal::ONE).with_lead_time_offset(1),
        BomLine::new("FRAME-001", "TUBE-001", Decimal::new(25, 1)).with_scrap_rate(Decimal::new(4, 2)),
    ];
    println!("   ✓ BOM 行數: {}", bom_lines.len());
    println!();

    // ========== 4. 需求與供應 ==========
    println!("📦 步驟 4: 建立需求與現有供應");
    let demands = vec![
        Demand::new("BIKE-001", Decimal::from(150), date(11, 17)?, DemandType::SalesOrder)
            .with_source_ref("SO-2025-001"),
        Demand::new("BIKE-001", Decimal::from(100), date(11, 24)?, DemandType::SalesOrder)
            .with_source_ref("SO-2025-002"),
        Demand::new("BIKE-001", Decimal::from(120), date(11, 24)?, DemandType::Forecast),
    ];
    let supplies = vec![Supply::new("FRAME-001", Decimal::from(50), date(11, 10)?, SupplyType::PurchaseOrder)
        .with_source_ref("PO-2025-100")];
    let inventories = vec![
        Inventory::new("BIKE-001", Decimal::from(20)),
        Inventory::new("WHEEL-001", Decimal::from(80)).with_allocated_qty(Decimal::from(10)),
    ];
    println!("   ✓ 需求 {} 筆、預計收貨 {} 筆、庫存 {} 筆", demands.len(), supplies.len(), inventories.len());
    println!();

    let snapshot = PlanningSnapshot::new(items, bom_lines)
        .with_calendars(vec![calendar])
        .with_demands(demands)
        .with_scheduled_receipts(supplies)
        .with_inventories(inventories);

    // ========== 5. 執行 MRP ==========
    println!("🚀 步驟 5: 執行 MRP 計算");
    let calculator = MrpCalculator::new(snapshot, PlanningConfig::default())?;
    let mut plan = MrpPlan::new(
        "2025-W46",
        PlanScope::new(date(11, 3)?, date(12, 28)?, BucketGranularity::Week),
        PlanType::Regenerative,
    );
    calculator.execute(&mut plan, &CancellationToken::new())?;

    for (level, items) in plan.level_sequence.iter().enumerate() {
        println!("   第 {level} 層: {}", items.join(", "));
    }
    println!();

    // ========== 6. 結果 ==========
    println!("📋 計劃訂單:");
    for order in &plan.planned_orders {
        println!(
            "   {:<10} {:?} 數量 {:>6}，下達 {}，到期 {}",
            order.item_id, order.order_type, order.quantity, order.release_date, order.due_date
        );
    }
    println!();

    println!("⚠️  例外訊息:");
    for exception in &plan.exceptions {
        println!("   [{:?}] {}: {}", exception.severity, exception.exception_type, exception.message);
    }

    // 確認第一張車架訂單
    let frame_order = plan.orders_for("FRAME-001").next().map(|o| o.id);
    if let Some(order_id) = frame_order {
        plan.firm_order(order_id)?;
        println!();
        println!("✅ 已確認車架訂單 {order_id}");
    }

    Ok(())
}
