/// 定位算法模块
///
/// 该模块提供 WiFi 指纹室内定位的基础类型和算法：
/// - 位置与接入点标识等值类型
/// - 信号强度聚合与统计函数
/// - 经验指纹与路径损耗模型两类 KNN 定位

pub mod access_point;
pub mod geo;
pub mod location_algorithms;
pub mod results;
pub mod rssi_model;
pub mod statistics;

pub use access_point::*;
pub use geo::*;
pub use location_algorithms::*;
pub use results::*;
pub use rssi_model::*;
