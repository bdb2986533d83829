//! 日誌初始化（供示範程式與服務入口使用）

use tracing_subscriber::{fmt, EnvFilter};

/// 日誌輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人類可讀
    #[default]
    Pretty,
    /// 每行一筆 JSON
    Json,
}

/// 初始化日誌系統
///
/// 日誌層級由 `RUST_LOG` 控制，預設 `info`。重複呼叫不會覆蓋既有設定。
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = match format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init(),
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .try_init(),
    };
}

/// 測試用：debug 層級，輸出交給測試框架擷取
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
