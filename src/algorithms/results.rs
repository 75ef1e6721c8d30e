/// 定位结果数据结构
///
/// 包含邻居排序记录、单个位置估计以及一次运行的估计集合

use std::fmt;

use chrono::{DateTime, Utc};

use crate::algorithms::GeoPosition;

/// 候选位置及其在指纹空间中的距离
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub position: GeoPosition,
    pub distance: f64,
}

impl Neighbor {
    pub fn new(position: GeoPosition, distance: f64) -> Self {
        Neighbor { position, distance }
    }
}

/// 按距离升序排列，距离相同时保持原有顺序
pub fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// 单个在线位置的估计结果
#[derive(Clone, Debug, PartialEq)]
pub struct PositionEstimate {
    /// 在线轨迹记录的真实位置
    pub true_position: GeoPosition,
    /// 估计位置（只估计 x、y）
    pub estimated: GeoPosition,
    /// 参与平均的邻居数量
    pub neighbor_count: usize,
}

impl PositionEstimate {
    pub fn new(true_position: GeoPosition, estimated: GeoPosition, neighbor_count: usize) -> Self {
        PositionEstimate {
            true_position,
            estimated,
            neighbor_count,
        }
    }

    /// 平面定位误差
    pub fn error_2d(&self) -> f64 {
        self.true_position.distance_2d(&self.estimated)
    }

    /// 三维定位误差
    pub fn error_3d(&self) -> f64 {
        self.true_position.distance(&self.estimated)
    }
}

impl fmt::Display for PositionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "真实 ({:.2}, {:.2}) -> 估计 ({:.2}, {:.2}), 误差 {:.3}",
            self.true_position.x(),
            self.true_position.y(),
            self.estimated.x(),
            self.estimated.y(),
            self.error_2d()
        )
    }
}

/// 一次定位运行的全部估计，按在线位置首次出现的顺序保存
#[derive(Clone, Debug)]
pub struct EstimateSet {
    estimates: Vec<PositionEstimate>,
    /// 使用的算法名称
    pub method: String,
    pub generated_at: DateTime<Utc>,
}

impl EstimateSet {
    pub fn new(method: impl Into<String>) -> Self {
        EstimateSet {
            estimates: Vec::new(),
            method: method.into(),
            generated_at: Utc::now(),
        }
    }

    pub fn from_vec(method: impl Into<String>, estimates: Vec<PositionEstimate>) -> Self {
        EstimateSet {
            estimates,
            ..Self::new(method)
        }
    }

    pub fn push(&mut self, estimate: PositionEstimate) {
        self.estimates.push(estimate);
    }

    pub fn all(&self) -> &[PositionEstimate] {
        &self.estimates
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionEstimate> {
        self.estimates.iter()
    }

    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// 按真实位置（忽略朝向）查找估计
    pub fn get(&self, true_position: &GeoPosition) -> Option<&PositionEstimate> {
        self.estimates
            .iter()
            .find(|e| e.true_position.equals_without_orientation(true_position))
    }

    /// (真实位置, 估计位置) 对
    pub fn pairs(&self) -> Vec<(GeoPosition, GeoPosition)> {
        self.estimates
            .iter()
            .map(|e| (e.true_position, e.estimated))
            .collect()
    }

    /// 平均平面误差
    pub fn average_error(&self) -> Option<f64> {
        if self.estimates.is_empty() {
            return None;
        }
        let total: f64 = self.estimates.iter().map(PositionEstimate::error_2d).sum();
        Some(total / self.estimates.len() as f64)
    }
}
