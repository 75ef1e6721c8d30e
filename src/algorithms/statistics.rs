/// 统计辅助函数
///
/// 所有函数都是纯函数；空序列返回 `EmptyInput` 错误。
/// 方差使用样本方差（除以 n - 1），少于两个元素时返回 0。

use crate::algorithms::GeoPosition;
use crate::error::{NavError, Result};

/// 算术平均值
pub fn mean(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(NavError::EmptyInput("mean"));
    }
    Ok(data.iter().sum::<f64>() / data.len() as f64)
}

/// 样本方差
pub fn variance(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(NavError::EmptyInput("variance"));
    }
    if data.len() < 2 {
        return Ok(0.0);
    }
    let avg = mean(data)?;
    let sum: f64 = data.iter().map(|v| (v - avg) * (v - avg)).sum();
    Ok(sum / (data.len() - 1) as f64)
}

/// 样本标准差
pub fn std_dev(data: &[f64]) -> Result<f64> {
    variance(data).map(f64::sqrt)
}

/// 中位数，偶数长度时取中间两个元素的平均值
pub fn median(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(NavError::EmptyInput("median"));
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n % 2 == 1 {
        Ok(sorted[n / 2])
    } else {
        Ok((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

pub fn min(data: &[f64]) -> Result<f64> {
    data.iter()
        .copied()
        .reduce(f64::min)
        .ok_or(NavError::EmptyInput("min"))
}

pub fn max(data: &[f64]) -> Result<f64> {
    data.iter()
        .copied()
        .reduce(f64::max)
        .ok_or(NavError::EmptyInput("max"))
}

/// Spearman 秩相关系数（输入为秩序列）
///
/// 公式: rho = Σ(R - R̄)(R' - R̄') / sqrt(Σ(R - R̄)² · Σ(R' - R̄')²)
pub fn spearman_coefficient(r: &[f64], rs: &[f64]) -> Result<f64> {
    if r.len() != rs.len() {
        return Err(NavError::InvalidArgument(format!(
            "序列长度不同: {} != {}",
            r.len(),
            rs.len()
        )));
    }
    if r.len() < 2 {
        return Err(NavError::InvalidArgument(
            "Spearman 系数需要至少两个元素".to_string(),
        ));
    }

    let mr = mean(r)?;
    let mrs = mean(rs)?;
    let (mut numerator, mut z1, mut z2) = (0.0, 0.0, 0.0);
    for (a, b) in r.iter().zip(rs) {
        let x = a - mr;
        let xs = b - mrs;
        numerator += x * xs;
        z1 += x * x;
        z2 += xs * xs;
    }

    // 合并开方，避免两次 sqrt 带来的舍入误差
    let rho = numerator / (z1 * z2).sqrt();
    if !rho.is_finite() {
        return Err(NavError::NonFinite("spearman coefficient"));
    }
    Ok(rho)
}

/// 正态分布累积分布函数的近似（Abramowitz & Stegun, p. 933）
///
/// P(x) 部分误差小于 1e-5，Z(x) 部分误差小于 2.7e-3；标准差为 0 时退化为阶跃函数。
pub fn normal_cdf_approx(x: f64, avg: f64, stddev: f64) -> f64 {
    if stddev == 0.0 {
        return if x >= avg { 1.0 } else { 0.0 };
    }

    let standardized = (x - avg) / stddev;
    let t = standardized.abs();

    let t2 = t * t;
    let t4 = t2 * t2;
    let t6 = t2 * t4;
    let z = 2.49089 + 1.466003 * t2 - 0.024393 * t4 + 0.178257 * t6;

    let p = 1.0 / (1.0 + 0.33267 * t);
    let p2 = p * p;
    let p3 = p2 * p;
    let approx = 1.0 - (0.4361836 * p - 0.1201676 * p2 + 0.9372980 * p3) / z;

    if standardized < 0.0 { 1.0 - approx } else { approx }
}

/// 多个位置的平均（坐标与朝向分别取平均，朝向对 360 取模）
pub fn average_position(positions: &[GeoPosition]) -> Result<GeoPosition> {
    if positions.is_empty() {
        return Err(NavError::EmptyInput("average_position"));
    }
    let k = positions.len() as f64;
    let sum = positions
        .iter()
        .fold(GeoPosition::new(0.0, 0.0, 0.0), |acc, p| acc.add(p));
    let orientation = positions.iter().map(GeoPosition::orientation).sum::<f64>() / k;
    GeoPosition::with_orientation(sum.x() / k, sum.y() / k, sum.z() / k, orientation % 360.0)
}
