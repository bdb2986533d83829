//! # MRP Cache
//!
//! 淨改變（增量）計算：追蹤輸入異動的物料，只重算受影響的部分

pub mod dirty_tracking;
pub mod incremental;

// Re-export 主要類型
pub use dirty_tracking::{ChangeKind, DirtyTracker};
pub use incremental::IncrementalCalculator;
