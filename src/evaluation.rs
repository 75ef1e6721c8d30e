/// 定位精度评估
///
/// 计算每个在线位置的平面误差，升序排列后生成经验累积分布表

use std::fmt;

use crate::algorithms::{statistics, GeoPosition};
use crate::error::Result;

/// 累积分布表的一行
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CdfRow {
    pub error: f64,
    /// 1 起始的排名除以总数
    pub percentage: f64,
}

impl CdfRow {
    pub fn to_line(&self) -> String {
        format!("err={:?};percentage={:?}", self.error, self.percentage)
    }
}

/// 每对位置的平面误差，升序排列
pub fn evaluate(pairs: &[(GeoPosition, GeoPosition)]) -> Vec<f64> {
    let mut errors: Vec<f64> = pairs
        .iter()
        .map(|(truth, estimate)| truth.distance_2d(estimate))
        .collect();
    errors.sort_by(f64::total_cmp);
    errors
}

/// 经验累积分布表，第 i 个误差对应 i / n
pub fn cdf_table(errors: &[f64]) -> Vec<CdfRow> {
    let mut sorted = errors.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, error)| CdfRow {
            error,
            percentage: (i + 1) as f64 / n,
        })
        .collect()
}

/// 误差的汇总统计
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl ErrorSummary {
    pub fn from_errors(errors: &[f64]) -> Result<Self> {
        Ok(ErrorSummary {
            count: errors.len(),
            mean: statistics::mean(errors)?,
            median: statistics::median(errors)?,
            std_dev: statistics::std_dev(errors)?,
            min: statistics::min(errors)?,
            max: statistics::max(errors)?,
        })
    }

    /// 按正态分布近似，误差不超过 `threshold` 的概率
    pub fn probability_within(&self, threshold: f64) -> f64 {
        statistics::normal_cdf_approx(threshold, self.mean, self.std_dev)
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={}, 平均误差 {:.3}, 中位数 {:.3}, 标准差 {:.3}, 范围 [{:.3}, {:.3}]",
            self.count, self.mean, self.median, self.std_dev, self.min, self.max
        )
    }
}
