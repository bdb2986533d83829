//! 需求彙總：依物料、依時間桶合併獨立需求與相依需求

use mrp_core::{Demand, DemandType, ForecastConsumption, Item, MrpError, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::bucketing::BucketSet;

/// 單一時間桶內依來源分開累計的需求
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BucketDemand {
    pub sales_orders: Decimal,
    pub forecast: Decimal,
    /// 安全庫存補充與相依需求（一律相加）
    pub other: Decimal,
}

impl BucketDemand {
    fn add(&mut self, demand: &Demand) {
        match demand.demand_type {
            DemandType::SalesOrder => self.sales_orders += demand.quantity,
            DemandType::Forecast => self.forecast += demand.quantity,
            DemandType::SafetyStock | DemandType::Dependent => self.other += demand.quantity,
        }
    }

    /// 毛需求
    pub fn total(&self, consumption: ForecastConsumption) -> Decimal {
        let independent = match consumption {
            ForecastConsumption::Additive => self.sales_orders + self.forecast,
            ForecastConsumption::ConsumeForecast => self.sales_orders.max(self.forecast),
        };
        independent + self.other
    }
}

/// 單一物料的需求序列
#[derive(Debug, Clone)]
pub struct DemandSeries {
    pub item_id: String,
    pub buckets: Vec<BucketDemand>,
    /// 時界外的需求
    pub overflow: BucketDemand,
}

impl DemandSeries {
    pub fn new(item_id: impl Into<String>, bucket_count: usize) -> Self {
        Self {
            item_id: item_id.into(),
            buckets: vec![BucketDemand::default(); bucket_count],
            overflow: BucketDemand::default(),
        }
    }

    fn add(&mut self, bucket: Option<usize>, demand: &Demand) {
        match bucket.and_then(|b| self.buckets.get_mut(b)) {
            Some(slot) => slot.add(demand),
            None => self.overflow.add(demand),
        }
    }

    /// 各時間桶毛需求
    pub fn gross(&self, consumption: ForecastConsumption) -> Vec<Decimal> {
        self.buckets.iter().map(|b| b.total(consumption)).collect()
    }

    pub fn overflow_quantity(&self, consumption: ForecastConsumption) -> Decimal {
        self.overflow.total(consumption)
    }
}

/// 需求彙總器
///
/// 依來源分開累計，預測沖銷方式在取毛需求時才套用。
pub struct DemandAggregator<'a> {
    buckets: &'a BucketSet,
}

impl<'a> DemandAggregator<'a> {
    pub fn new(buckets: &'a BucketSet) -> Self {
        Self { buckets }
    }

    /// 彙總獨立需求（第 0 層的毛需求來源）
    pub fn aggregate(
        &self,
        demands: &[Demand],
        items: &HashMap<&str, &Item>,
    ) -> Result<BTreeMap<String, DemandSeries>> {
        let mut series = BTreeMap::new();
        for demand in demands {
            if !items.contains_key(demand.item_id.as_str()) {
                return Err(MrpError::unknown_item(
                    &demand.item_id,
                    format!("需求 {}", demand.id),
                ));
            }
            self.push(&mut series, demand);
        }

        tracing::debug!("需求彙總：{} 筆需求，{} 個物料", demands.len(), series.len());
        Ok(series)
    }

    /// 加入一筆需求（層級屏障時合併相依需求也使用此方法）
    pub fn push(&self, series: &mut BTreeMap<String, DemandSeries>, demand: &Demand) {
        let bucket = self.buckets.bucket_for(demand.required_date);
        series
            .entry(demand.item_id.clone())
            .or_insert_with(|| DemandSeries::new(demand.item_id.clone(), self.buckets.len()))
            .add(bucket, demand);
    }
}
