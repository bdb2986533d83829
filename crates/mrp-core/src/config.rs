//! 計算配置模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 時間桶粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketGranularity {
    /// 每日
    Day,
    /// 每週（自計劃起始日起每 7 天）
    Week,
    /// 每期（自計劃起始日起每個日曆月）
    Month,
}

/// 預測與訂單的合併方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastConsumption {
    /// 預測與銷售訂單相加
    Additive,
    /// 訂單沖銷預測：每個時間桶取 max(預測, 訂單)
    ConsumeForecast,
}

/// 作業排程方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingDirection {
    /// 由完工日倒排
    Backward,
    /// 由下達日順排
    Forward,
}

/// MRP 計算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// 是否保留安全庫存
    pub include_safety_stock: bool,

    /// 是否使用提前期偏置（false 時下達日 = 需求日）
    pub include_lead_times: bool,

    /// 預測沖銷策略
    pub forecast_consumption: ForecastConsumption,

    /// 呆滯判定：預計庫存超過平均需求的倍數
    pub excess_inventory_multiple: Decimal,

    /// 呆滯判定：連續期數
    pub excess_inventory_periods: usize,

    /// 同層物料是否並行計算
    pub parallel: bool,
}

impl PlanningConfig {
    pub fn new() -> Self {
        Self {
            include_safety_stock: true,
            include_lead_times: true,
            forecast_consumption: ForecastConsumption::ConsumeForecast,
            excess_inventory_multiple: Decimal::from(3),
            excess_inventory_periods: 3,
            parallel: true,
        }
    }

    /// 建構器模式：設置是否保留安全庫存
    pub fn with_safety_stock(mut self, include: bool) -> Self {
        self.include_safety_stock = include;
        self
    }

    /// 建構器模式：設置是否使用提前期
    pub fn with_lead_times(mut self, include: bool) -> Self {
        self.include_lead_times = include;
        self
    }

    /// 建構器模式：設置預測沖銷策略
    pub fn with_forecast_consumption(mut self, consumption: ForecastConsumption) -> Self {
        self.forecast_consumption = consumption;
        self
    }

    /// 建構器模式：設置呆滯判定參數
    pub fn with_excess_rule(mut self, multiple: Decimal, periods: usize) -> Self {
        self.excess_inventory_multiple = multiple;
        self.excess_inventory_periods = periods.max(1);
        self
    }

    /// 建構器模式：設置是否並行
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// 產能計算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// 產能時間桶粒度
    pub granularity: BucketGranularity,

    /// 超載門檻（負荷百分比，超過即 Warning）
    pub overload_threshold: Decimal,

    /// 嚴重超載門檻（負荷百分比，超過即 Critical）
    pub critical_threshold: Decimal,

    /// 低負荷門檻（負荷百分比，低於即 Info；None 表示不檢查）
    pub underload_threshold: Option<Decimal>,

    /// 瓶頸判定：單一工作中心佔總缺口工時的比例
    pub bottleneck_share: Decimal,

    /// 是否計入準備工時
    pub include_setup_times: bool,

    /// 是否以工作中心效率折算可用工時
    pub include_efficiency: bool,

    /// 作業排程方向
    pub scheduling_direction: SchedulingDirection,

    /// 生產物料缺少工藝路線時是否中止
    pub strict_routing: bool,
}

impl CapacityConfig {
    pub fn new(granularity: BucketGranularity) -> Self {
        Self {
            granularity,
            overload_threshold: Decimal::from(100),
            critical_threshold: Decimal::from(120),
            underload_threshold: None,
            bottleneck_share: Decimal::new(5, 1),
            include_setup_times: true,
            include_efficiency: true,
            scheduling_direction: SchedulingDirection::Backward,
            strict_routing: true,
        }
    }

    /// 建構器模式：設置超載門檻
    pub fn with_thresholds(mut self, overload: Decimal, critical: Decimal) -> Self {
        self.overload_threshold = overload;
        self.critical_threshold = critical.max(overload);
        self
    }

    /// 建構器模式：設置低負荷門檻
    pub fn with_underload_threshold(mut self, threshold: Decimal) -> Self {
        self.underload_threshold = Some(threshold);
        self
    }

    /// 建構器模式：設置瓶頸比例
    pub fn with_bottleneck_share(mut self, share: Decimal) -> Self {
        self.bottleneck_share = share;
        self
    }

    /// 建構器模式：設置排程方向
    pub fn with_scheduling_direction(mut self, direction: SchedulingDirection) -> Self {
        self.scheduling_direction = direction;
        self
    }

    /// 建構器模式：設置是否計入準備工時
    pub fn with_setup_times(mut self, include: bool) -> Self {
        self.include_setup_times = include;
        self
    }

    /// 建構器模式：設置是否折算效率
    pub fn with_efficiency(mut self, include: bool) -> Self {
        self.include_efficiency = include;
        self
    }

    /// 建構器模式：設置工藝路線檢查
    pub fn with_strict_routing(mut self, strict: bool) -> Self {
        self.strict_routing = strict;
        self
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self::new(BucketGranularity::Week)
    }
}
