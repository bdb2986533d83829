//! 淨需求計算

use chrono::NaiveDate;
use mrp_core::{Item, PlannedOrder, Requirement};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::bucketing::BucketSet;
use crate::lot_sizing::{LotSizingCalculator, LotSizingContext};

/// 單一物料的淨需求計算輸入（各序列長度等於時間桶數）
#[derive(Debug, Clone, Copy)]
pub struct NettingInput<'a> {
    pub item: &'a Item,
    pub buckets: &'a BucketSet,
    pub gross: &'a [Decimal],
    pub scheduled_receipts: &'a [Decimal],
    /// 確認/已下達計劃訂單的收貨
    pub firmed_receipts: &'a [Decimal],
    pub opening_balance: Decimal,
    /// 已依配置決定是否保留的安全庫存
    pub safety_stock: Decimal,
}

impl NettingInput<'_> {
    fn at(series: &[Decimal], t: usize) -> Decimal {
        series.get(t).copied().unwrap_or_default()
    }
}

/// 新產生的計劃收貨
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedReceipt {
    pub bucket: usize,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct NettingResult {
    pub requirements: Vec<Requirement>,
    pub receipts: Vec<PlannedReceipt>,
}

/// 確認訂單比對結果：本次計算實際需要的數量/日期
#[derive(Debug, Clone, PartialEq)]
pub struct FirmedOrderCheck {
    pub order_id: Uuid,
    pub item_id: String,
    pub firmed_quantity: Decimal,
    pub firmed_due: NaiveDate,
    pub needed_quantity: Decimal,
    /// 最早需要的時間桶起始日（完全不需要時為 None）
    pub needed_date: Option<NaiveDate>,
    pub date_changed: bool,
}

impl FirmedOrderCheck {
    pub fn quantity_changed(&self) -> bool {
        self.needed_quantity != self.firmed_quantity
    }
}

/// 淨需求計算器
pub struct NettingCalculator;

impl NettingCalculator {
    /// 淨需求：可用 + 既定收貨足以滿足毛需求 + 安全庫存時為 0
    pub fn net_requirement(
        available: Decimal,
        committed: Decimal,
        gross: Decimal,
        safety_stock: Decimal,
    ) -> Decimal {
        if available + committed >= gross + safety_stock {
            Decimal::ZERO
        } else {
            gross + safety_stock - available - committed
        }
    }

    /// 開始保留安全庫存的時間桶
    ///
    /// 從第一個有毛需求的時間桶起每期保留；期間內完全沒有需求時從第一期起保留。
    /// 需求出現前的安全庫存缺口併入該期補足，不另開一張逾期訂單。
    fn safety_stock_from(input: &NettingInput<'_>) -> usize {
        input
            .buckets
            .iter()
            .map(|b| b.index)
            .find(|&t| NettingInput::at(input.gross, t) > Decimal::ZERO)
            .unwrap_or(0)
    }

    fn reserved_safety_stock(input: &NettingInput<'_>, from: usize, t: usize) -> Decimal {
        if t >= from {
            input.safety_stock
        } else {
            Decimal::ZERO
        }
    }

    /// 逐時間桶計算淨需求並套用批量規則
    pub fn calculate(input: &NettingInput<'_>) -> NettingResult {
        let item = input.item;
        let mut requirements = Vec::with_capacity(input.buckets.len());
        let mut receipts = Vec::new();
        let mut carry = input.opening_balance;
        let reserve_from = Self::safety_stock_from(input);

        for bucket in input.buckets.iter() {
            let t = bucket.index;
            let gross = NettingInput::at(input.gross, t);
            let scheduled = NettingInput::at(input.scheduled_receipts, t);
            let committed = NettingInput::at(input.firmed_receipts, t);
            let safety_stock = Self::reserved_safety_stock(input, reserve_from, t);

            // 同桶的預計收貨先計入可用量
            let available = carry + scheduled;
            let net = Self::net_requirement(available, committed, gross, safety_stock);

            let new_receipt: Decimal = if item.mrp_enabled {
                let ctx = LotSizingContext {
                    bucket: t,
                    net_requirement: net,
                    projected: available + committed - gross,
                    gross: input.gross,
                    scheduled_receipts: input.scheduled_receipts,
                    firmed_receipts: input.firmed_receipts,
                };
                let quantities = LotSizingCalculator::apply(item.lot_sizing, &ctx);
                receipts.extend(quantities.iter().map(|&quantity| PlannedReceipt {
                    bucket: t,
                    quantity,
                }));
                quantities.iter().sum()
            } else {
                Decimal::ZERO
            };

            let projected_on_hand = available + committed + new_receipt - gross;

            let mut record = Requirement::new(item.item_id.clone(), bucket.start, bucket.end);
            record.gross_requirement = gross;
            record.on_hand = carry;
            record.scheduled_receipts = scheduled;
            record.safety_stock = safety_stock;
            record.net_requirement = net;
            record.firmed_receipts = committed;
            record.planned_order_receipt = committed + new_receipt;
            record.projected_on_hand = projected_on_hand;
            requirements.push(record);

            carry = projected_on_hand;
        }

        NettingResult {
            requirements,
            receipts,
        }
    }

    /// 不計確認訂單時，以批對批計算的各期實際需要量
    pub fn shadow_needs(input: &NettingInput<'_>) -> Vec<Decimal> {
        let mut needs = Vec::with_capacity(input.buckets.len());
        let mut carry = input.opening_balance;
        let reserve_from = Self::safety_stock_from(input);

        for bucket in input.buckets.iter() {
            let t = bucket.index;
            let gross = NettingInput::at(input.gross, t);
            let available = carry + NettingInput::at(input.scheduled_receipts, t);
            let safety_stock = Self::reserved_safety_stock(input, reserve_from, t);
            let need = Self::net_requirement(available, Decimal::ZERO, gross, safety_stock);

            needs.push(need);
            carry = available + need - gross;
        }

        needs
    }

    /// 將實際需要量依到期日先後分配給確認訂單
    pub fn check_firmed_orders(
        input: &NettingInput<'_>,
        firmed_orders: &[PlannedOrder],
    ) -> Vec<FirmedOrderCheck> {
        if firmed_orders.is_empty() {
            return Vec::new();
        }

        let mut queue: Vec<(usize, Decimal)> = Self::shadow_needs(input)
            .into_iter()
            .enumerate()
            .filter(|(_, need)| *need > Decimal::ZERO)
            .collect();
        let mut cursor = 0;

        let mut orders: Vec<&PlannedOrder> = firmed_orders
            .iter()
            .filter(|o| input.buckets.bucket_for(o.due_date).is_some())
            .collect();
        orders.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));

        let mut checks = Vec::with_capacity(orders.len());
        for order in orders {
            let mut assigned = Decimal::ZERO;
            let mut first_bucket = None;

            while assigned < order.quantity && cursor < queue.len() {
                let (bucket, remaining) = &mut queue[cursor];
                let take = (*remaining).min(order.quantity - assigned);
                first_bucket.get_or_insert(*bucket);
                assigned += take;
                *remaining -= take;
                if *remaining <= Decimal::ZERO {
                    cursor += 1;
                }
            }

            let due_bucket = input.buckets.bucket_for(order.due_date);
            checks.push(FirmedOrderCheck {
                order_id: order.id,
                item_id: order.item_id.clone(),
                firmed_quantity: order.quantity,
                firmed_due: order.due_date,
                needed_quantity: assigned,
                needed_date: first_bucket.and_then(|b| input.buckets.start_of(b)),
                date_changed: first_bucket.is_some() && first_bucket != due_bucket,
            });
        }

        checks
    }
}
