/// 定位流程的错误类型
///
/// 所有失败都向上传递到调用方，库代码内部不做重试或恢复。

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::algorithms::AccessPointId;

/// 数据集来源（离线训练集 / 在线测试集）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetPool {
    Offline,
    Online,
}

impl fmt::Display for DatasetPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetPool::Offline => write!(f, "offline"),
            DatasetPool::Online => write!(f, "online"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NavError {
    /// 统计函数收到空序列
    #[error("输入为空: {0}")]
    EmptyInput(&'static str),

    /// Spearman 系数无法计算（零方差输入）
    #[error("统计量不是有限数: {0}")]
    NonFinite(&'static str),

    #[error("朝向必须满足 0 <= o < 360，实际为 {0}")]
    InvalidOrientation(f64),

    #[error("参数无效: {0}")]
    InvalidArgument(String),

    /// 聚合中不存在该接入点
    #[error("信号聚合中不存在接入点 {0}")]
    UnknownAccessPoint(AccessPointId),

    #[error("未知的轨迹类型: {0}")]
    UnknownTraceMode(String),

    #[error("{0} 轨迹池为空，无法生成数据集")]
    EmptyTracePool(DatasetPool),

    /// 某个分桶的样本数少于要求值
    #[error("{pool} 分桶 {position} 只有 {available} 条记录，需要 {required} 条")]
    InsufficientSamples {
        pool: DatasetPool,
        position: String,
        available: usize,
        required: usize,
    },

    #[error("{0} 指纹集合为空")]
    EmptyFingerprints(DatasetPool),

    #[error("第 {line} 行解析失败: {message}")]
    Parse { line: usize, message: String },

    #[error("MAC 地址格式无效: '{0}'")]
    InvalidMac(String),

    #[error("位置格式无效: '{0}'")]
    InvalidPosition(String),

    #[error("配置无效: {0}")]
    Config(String),

    #[error("文件 {path:?} 读写失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
}

impl NavError {
    /// 附带文件路径的 I/O 错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NavError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
