/// 对数距离路径损耗模型
///
/// 公式: P(d) = P(d0) - 10 * n * log10(d / d0)
///
/// 用于在缺少离线实测数据时合成离线指纹。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// 听不到的接入点使用的信号强度下限 (dBm)
pub const UNHEARABLE_STRENGTH: f64 = -100.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLossModel {
    /// 参考距离处的接收功率 P(d0)，单位 dBm
    pub reference_power: f64,
    /// 路径损耗指数 n
    pub exponent: f64,
    /// 参考距离 d0
    pub reference_distance: f64,
}

impl PathLossModel {
    pub fn new(reference_power: f64, exponent: f64, reference_distance: f64) -> Self {
        PathLossModel {
            reference_power,
            exponent,
            reference_distance,
        }
    }

    /// 自由空间模型 (n = 2)
    pub fn free_space(reference_power: f64, reference_distance: f64) -> Self {
        Self::new(reference_power, 2.0, reference_distance)
    }

    /// 根据距离预测信号强度
    ///
    /// 参考距离以内模型饱和，返回参考功率
    pub fn predict(&self, distance: f64) -> f64 {
        let effective = distance.max(self.reference_distance);
        self.reference_power - 10.0 * self.exponent * (effective / self.reference_distance).log10()
    }

    /// 反解距离: d = d0 * 10^((P(d0) - P) / (10 * n))
    pub fn distance_for(&self, strength: f64) -> f64 {
        let exponent = (self.reference_power - strength) / (10.0 * self.exponent);
        self.reference_distance * 10_f64.powf(exponent)
    }

    /// 验证模型参数的合理性
    pub fn validate(&self) -> Result<()> {
        if !(self.reference_distance > 0.0) {
            return Err(NavError::Config(format!(
                "参考距离必须为正数，实际为 {}",
                self.reference_distance
            )));
        }
        if !(self.exponent > 0.0) {
            return Err(NavError::Config(format!(
                "路径损耗指数必须为正数（信号随距离衰减），实际为 {}",
                self.exponent
            )));
        }
        if !self.reference_power.is_finite() {
            return Err(NavError::Config("参考功率必须是有限数".to_string()));
        }
        Ok(())
    }

    pub fn description(&self) -> String {
        format!(
            "路径损耗模型 - P(d0)={:.2} dBm, n={:.3}, d0={:.2}",
            self.reference_power, self.exponent, self.reference_distance
        )
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        PathLossModel::new(-33.77, 3.415, 1.0)
    }
}

impl fmt::Display for PathLossModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
