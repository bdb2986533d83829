//! # MRP
//!
//! 物料需求計劃（MRP）與產能需求計劃（CRP）引擎
//!
//! - `mrp-core`：資料模型、計劃狀態機、持久化邊界
//! - `mrp-calc`：多階 BOM 展開、淨需求、批量、訂單偏置、例外
//! - `mrp-capacity`：工序排程與工作中心負荷
//! - `mrp-cache`：淨改變（增量）計算
//!
//! [`PlanningEngine`] 串起整個流程：讀取快照 → MRP → CRP → 單一批次寫入。

pub mod engine;
pub mod telemetry;

pub use engine::{PlanRun, PlanningEngine};
pub use telemetry::{init_tracing, LogFormat};

pub use mrp_cache::{ChangeKind, DirtyTracker, IncrementalCalculator};
pub use mrp_calc::{CancellationToken, ExceptionDetector, MrpCalculator, MrpResult};
pub use mrp_capacity::CapacityPlanner;
pub use mrp_core::*;
