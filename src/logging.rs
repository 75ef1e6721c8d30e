/// 日志初始化
///
/// 输出到 stderr，过滤级别优先取 `RUST_LOG`，否则按命令行 `-v` 次数决定：
/// 0 次为 info，1 次为 debug，2 次及以上为 trace。

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{NavError, Result};

/// `-v` 次数对应的默认过滤级别
pub fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// 安装全局日志订阅者，重复调用会返回错误
pub fn init_logging(verbosity: u8) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| NavError::Config(format!("日志初始化失败: {}", e)))
}
