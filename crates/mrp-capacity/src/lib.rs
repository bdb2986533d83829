//! # MRP Capacity
//!
//! 產能需求計劃（CRP）：依工藝路線排程工序，彙總工作中心各期負荷。
//! 僅報告負荷與例外，不會修改任何訂單日期。

pub mod planner;
pub mod scheduling;

// Re-export 主要類型
pub use planner::CapacityPlanner;
pub use scheduling::{OperationScheduler, ScheduledOperation};
