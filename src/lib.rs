/// 基于 WiFi 信号指纹的室内定位库
///
/// 支持的功能：
/// - 轨迹文件解析与接入点/位置/朝向过滤
/// - 离线/在线数据集的分层随机生成
/// - 经验指纹 KNN 与路径损耗模型 KNN 定位
/// - 定位误差评估（累积分布表）

pub mod algorithms;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod generator;
pub mod io;
pub mod logging;
pub mod positioning;
pub mod trace;

pub use error::{NavError, Result};
