//! 批量規則實現

use mrp_core::LotSizingPolicy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 單一時間桶的批量計算輸入
#[derive(Debug, Clone, Copy)]
pub struct LotSizingContext<'a> {
    /// 目前時間桶
    pub bucket: usize,

    /// 淨需求
    pub net_requirement: Decimal,

    /// 扣除本期毛需求後的預計庫存（未含本期新訂單）
    pub projected: Decimal,

    pub gross: &'a [Decimal],
    pub scheduled_receipts: &'a [Decimal],
    pub firmed_receipts: &'a [Decimal],
}

impl LotSizingContext<'_> {
    /// 第 k 桶尚未被既有供應涵蓋的需求
    fn uncovered(&self, k: usize) -> Decimal {
        let gross = self.gross.get(k).copied().unwrap_or_default();
        let scheduled = self.scheduled_receipts.get(k).copied().unwrap_or_default();
        let firmed = self.firmed_receipts.get(k).copied().unwrap_or_default();
        (gross - scheduled - firmed).max(Decimal::ZERO)
    }
}

/// 批量規則計算器
pub struct LotSizingCalculator;

impl LotSizingCalculator {
    /// 依物料的批量規則計算本期訂單數量（每個元素為一張訂單）
    ///
    /// 回傳空集合表示不需下單。
    pub fn apply(policy: LotSizingPolicy, ctx: &LotSizingContext<'_>) -> Vec<Decimal> {
        let quantities = match policy {
            LotSizingPolicy::LotForLot => Self::lot_for_lot(ctx),
            LotSizingPolicy::FixedOrderQuantity { quantity } => {
                Self::fixed_order_quantity(ctx, quantity)
            }
            LotSizingPolicy::PeriodOrderQuantity { periods } => {
                Self::period_order_quantity(ctx, periods)
            }
            LotSizingPolicy::MinMax { min, max } => Self::min_max(ctx, min, max),
        };

        quantities.into_iter().filter(|q| *q > Decimal::ZERO).collect()
    }

    /// 批對批（Lot for Lot）
    fn lot_for_lot(ctx: &LotSizingContext<'_>) -> Vec<Decimal> {
        vec![ctx.net_requirement]
    }

    /// 固定訂購量：ceil(淨需求 / 批量) 張訂單，每張一個批量
    fn fixed_order_quantity(ctx: &LotSizingContext<'_>, lot: Decimal) -> Vec<Decimal> {
        if ctx.net_requirement <= Decimal::ZERO || lot <= Decimal::ZERO {
            return Vec::new();
        }
        let batches = (ctx.net_requirement / lot).ceil().to_usize().unwrap_or(1).max(1);
        vec![lot; batches]
    }

    /// 期間訂購量：一張訂單涵蓋自本期起 N 期的需求
    fn period_order_quantity(ctx: &LotSizingContext<'_>, periods: u32) -> Vec<Decimal> {
        if ctx.net_requirement <= Decimal::ZERO {
            return Vec::new();
        }
        let window_end = ctx.bucket + periods.max(1) as usize;
        let future: Decimal = (ctx.bucket + 1..window_end)
            .map(|k| ctx.uncovered(k))
            .sum();
        vec![ctx.net_requirement + future]
    }

    /// 最小/最大：預計庫存低於最小值（或有淨需求）時補到最大值
    fn min_max(ctx: &LotSizingContext<'_>, min: Decimal, max: Decimal) -> Vec<Decimal> {
        if ctx.projected >= min && ctx.net_requirement <= Decimal::ZERO {
            return Vec::new();
        }
        vec![(max - ctx.projected).max(ctx.net_requirement)]
    }
}
