/// 指纹定位算法实现
///
/// 支持：
/// - 按接入点聚合的信号强度样本（带缓存的均值 / 方差）
/// - 按位置合并的联合指纹
/// - 经验指纹 KNN / NN
/// - 基于路径损耗模型的 KNN / NN

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::algorithms::{
    sort_neighbors, statistics, AccessPointId, AccessPointRegistry, EstimateSet, GeoPosition,
    Neighbor, PathLossModel, PositionEstimate, PositionKey, UNHEARABLE_STRENGTH,
};
use crate::error::{DatasetPool, NavError, Result};
use crate::trace::TraceEntry;

// ============================================================================
// 信号测量数据结构
// ============================================================================

/// 单个信号测量
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalSample {
    pub access_point: AccessPointId,
    /// 信号强度 (dBm)
    pub strength: f64,
    pub noise: Option<f64>,
    pub channel: Option<f64>,
}

impl SignalSample {
    pub fn new(access_point: AccessPointId, strength: f64) -> Self {
        SignalSample {
            access_point,
            strength,
            noise: None,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: f64) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = Some(noise);
        self
    }
}

#[derive(Clone, Debug, Default)]
struct ApSamples {
    strengths: Vec<f64>,
    noise: Vec<f64>,
    channel: Option<f64>,
    average: OnceCell<f64>,
    variance: OnceCell<f64>,
}

impl ApSamples {
    fn push(&mut self, strength: f64, noise: Option<f64>) {
        self.strengths.push(strength);
        if let Some(noise) = noise {
            self.noise.push(noise);
        }
        self.average = OnceCell::new();
        self.variance = OnceCell::new();
    }

    fn average(&self) -> Result<f64> {
        if let Some(avg) = self.average.get() {
            return Ok(*avg);
        }
        let avg = statistics::mean(&self.strengths)?;
        let _ = self.average.set(avg);
        Ok(avg)
    }

    fn variance(&self) -> Result<f64> {
        if let Some(var) = self.variance.get() {
            return Ok(*var);
        }
        let var = statistics::variance(&self.strengths)?;
        let _ = self.variance.set(var);
        Ok(var)
    }
}

/// 按接入点聚合的信号强度样本
///
/// 每个接入点至少有一个强度样本；信道取首次出现的值，之后不再修改。
/// 接入点按 MAC 字典序迭代。
#[derive(Clone, Debug, Default)]
pub struct SignalAggregate {
    samples: BTreeMap<AccessPointId, ApSamples>,
}

impl SignalAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: impl IntoIterator<Item = SignalSample>) -> Self {
        let mut aggregate = SignalAggregate::new();
        for sample in samples {
            aggregate.add(sample);
        }
        aggregate
    }

    /// 追加一个测量，并使该接入点的缓存失效
    pub fn add(&mut self, sample: SignalSample) {
        let entry = self
            .samples
            .entry(sample.access_point)
            .or_insert_with(|| ApSamples {
                channel: sample.channel,
                ..ApSamples::default()
            });
        entry.push(sample.strength, sample.noise);
    }

    pub fn put(&mut self, access_point: AccessPointId, strength: f64, channel: Option<f64>) {
        self.add(SignalSample {
            access_point,
            strength,
            noise: None,
            channel,
        });
    }

    pub fn put_with_noise(
        &mut self,
        access_point: AccessPointId,
        strength: f64,
        noise: f64,
        channel: Option<f64>,
    ) {
        self.add(SignalSample {
            access_point,
            strength,
            noise: Some(noise),
            channel,
        });
    }

    fn samples_of(&self, access_point: &AccessPointId) -> Result<&ApSamples> {
        self.samples
            .get(access_point)
            .ok_or(NavError::UnknownAccessPoint(*access_point))
    }

    pub fn average(&self, access_point: &AccessPointId) -> Result<f64> {
        self.samples_of(access_point)?.average()
    }

    pub fn variance(&self, access_point: &AccessPointId) -> Result<f64> {
        self.samples_of(access_point)?.variance()
    }

    pub fn std_dev(&self, access_point: &AccessPointId) -> Result<f64> {
        self.variance(access_point).map(f64::sqrt)
    }

    /// 噪声均值；没有噪声样本时返回 `EmptyInput`
    pub fn average_noise(&self, access_point: &AccessPointId) -> Result<f64> {
        statistics::mean(&self.samples_of(access_point)?.noise)
    }

    pub fn first_strength(&self, access_point: &AccessPointId) -> Option<f64> {
        self.samples
            .get(access_point)
            .and_then(|s| s.strengths.first().copied())
    }

    pub fn strengths(&self, access_point: &AccessPointId) -> Option<&[f64]> {
        self.samples.get(access_point).map(|s| s.strengths.as_slice())
    }

    pub fn noise(&self, access_point: &AccessPointId) -> Option<&[f64]> {
        self.samples.get(access_point).map(|s| s.noise.as_slice())
    }

    pub fn channel(&self, access_point: &AccessPointId) -> Option<f64> {
        self.samples.get(access_point).and_then(|s| s.channel)
    }

    pub fn sample_count(&self, access_point: &AccessPointId) -> usize {
        self.samples
            .get(access_point)
            .map_or(0, |s| s.strengths.len())
    }

    /// 把另一个聚合的所有样本逐个接入点追加进来
    pub fn merge(&mut self, other: &SignalAggregate) {
        for (id, theirs) in &other.samples {
            let ours = self.samples.entry(*id).or_insert_with(|| ApSamples {
                channel: theirs.channel,
                ..ApSamples::default()
            });
            ours.strengths.extend_from_slice(&theirs.strengths);
            ours.noise.extend_from_slice(&theirs.noise);
            ours.average = OnceCell::new();
            ours.variance = OnceCell::new();
        }
    }

    /// 按平均信号强度降序排列的接入点，强度相同时按 MAC 顺序
    pub fn sorted_access_points(&self) -> Result<Vec<AccessPointId>> {
        let mut ranked = self
            .samples
            .iter()
            .map(|(id, s)| -> Result<(AccessPointId, f64)> { Ok((*id, s.average()?)) })
            .collect::<Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().map(|(id, _)| id).collect())
    }

    pub fn contains(&self, access_point: &AccessPointId) -> bool {
        self.samples.contains_key(access_point)
    }

    pub fn contains_all<'a>(&self, access_points: impl IntoIterator<Item = &'a AccessPointId>) -> bool {
        access_points.into_iter().all(|id| self.contains(id))
    }

    pub fn remove(&mut self, access_point: &AccessPointId) -> bool {
        self.samples.remove(access_point).is_some()
    }

    pub fn access_points(&self) -> impl Iterator<Item = &AccessPointId> {
        self.samples.keys()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ============================================================================
// 联合指纹
// ============================================================================

/// 一个物理位置（忽略朝向）上合并后的信号特征
#[derive(Clone, Debug)]
pub struct Fingerprint {
    pub position: GeoPosition,
    pub aggregate: SignalAggregate,
}

/// 位置到指纹的映射，按位置首次出现的顺序迭代
#[derive(Clone, Debug, Default)]
pub struct FingerprintMap {
    fingerprints: Vec<Fingerprint>,
    index: HashMap<PositionKey, usize>,
}

impl FingerprintMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并同一位置的所有轨迹记录
    pub fn from_entries(entries: &[TraceEntry]) -> Self {
        let mut map = FingerprintMap::new();
        for entry in entries {
            map.insert_or_merge(&entry.position, &entry.samples);
        }
        map
    }

    /// 位置已存在时合并样本，否则插入新指纹
    pub fn insert_or_merge(&mut self, position: &GeoPosition, aggregate: &SignalAggregate) {
        let key = position.key(false);
        match self.index.get(&key) {
            Some(&i) => self.fingerprints[i].aggregate.merge(aggregate),
            None => {
                self.index.insert(key, self.fingerprints.len());
                self.fingerprints.push(Fingerprint {
                    position: position.without_orientation(),
                    aggregate: aggregate.clone(),
                });
            }
        }
    }

    pub fn get(&self, position: &GeoPosition) -> Option<&SignalAggregate> {
        self.index
            .get(&position.key(false))
            .map(|&i| &self.fingerprints[i].aggregate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = &GeoPosition> {
        self.fingerprints.iter().map(|f| &f.position)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

// ============================================================================
// 定位算法集合
// ============================================================================

/// 指纹定位算法集合
pub struct FingerprintAlgorithm;

impl FingerprintAlgorithm {
    /// 构建联合指纹
    pub fn joint_fingerprints(entries: &[TraceEntry]) -> FingerprintMap {
        FingerprintMap::from_entries(entries)
    }

    /// 指纹空间中的欧几里得距离
    ///
    /// 只累计两侧都出现的接入点，单侧出现的接入点不参与计算
    pub fn fingerprint_distance(a: &SignalAggregate, b: &SignalAggregate) -> Result<f64> {
        let mut sum = 0.0;
        for id in a.access_points() {
            if b.contains(id) {
                let diff = a.average(id)? - b.average(id)?;
                sum += diff * diff;
            }
        }
        Ok(sum.sqrt())
    }

    /// 计算到每个候选位置的距离并升序排列
    pub fn rank_neighbors(online: &SignalAggregate, offline: &FingerprintMap) -> Result<Vec<Neighbor>> {
        let mut neighbors = offline
            .iter()
            .map(|fp| {
                Self::fingerprint_distance(online, &fp.aggregate)
                    .map(|d| Neighbor::new(fp.position, d))
            })
            .collect::<Result<Vec<_>>>()?;
        sort_neighbors(&mut neighbors);
        Ok(neighbors)
    }

    /// 取前 k 个邻居的 x、y 平均值
    ///
    /// # 错误
    /// `k == 0` 或 `k` 大于候选数量时返回 `InvalidArgument`
    pub fn average_neighbors(neighbors: &[Neighbor], k: usize) -> Result<GeoPosition> {
        validate_k(k, neighbors.len())?;

        let (x, y) = neighbors[..k]
            .iter()
            .fold((0.0, 0.0), |(x, y), n| (x + n.position.x(), y + n.position.y()));
        Ok(GeoPosition::planar(x / k as f64, y / k as f64))
    }

    /// 经验指纹 KNN
    pub fn empirical_knn(offline: &[TraceEntry], online: &[TraceEntry], k: usize) -> Result<EstimateSet> {
        let offline_map = Self::joint_fingerprints(offline);
        let online_map = Self::joint_fingerprints(online);
        check_fingerprints(&offline_map, &online_map, k)?;

        let mut estimates = EstimateSet::new(if k == 1 { "empirical-nn" } else { "empirical-knn" });
        for fp in online_map.iter() {
            let neighbors = Self::rank_neighbors(&fp.aggregate, &offline_map)?;
            let estimated = Self::average_neighbors(&neighbors, k)?;
            debug!("在线位置 {} 估计为 {}", fp.position, estimated);
            estimates.push(PositionEstimate::new(fp.position, estimated, k));
        }
        Ok(estimates)
    }

    /// 经验指纹最近邻
    pub fn empirical_nn(offline: &[TraceEntry], online: &[TraceEntry]) -> Result<EstimateSet> {
        Self::empirical_knn(offline, online, 1)
    }

    /// 为一个在线指纹合成离线模型指纹
    ///
    /// 在线指纹中的每个接入点（按平均强度降序）：离线位置听到该接入点时用
    /// 路径损耗模型预测强度，否则填入 `UNHEARABLE_STRENGTH`。
    pub fn model_fingerprints(
        online: &SignalAggregate,
        offline: &FingerprintMap,
        registry: &AccessPointRegistry,
        model: &PathLossModel,
    ) -> Result<FingerprintMap> {
        let access_points = online.sorted_access_points()?;
        let mut synthesized = FingerprintMap::new();

        for fp in offline.iter() {
            let mut aggregate = SignalAggregate::new();
            for id in &access_points {
                let strength = if fp.aggregate.contains(id) {
                    let ap_position = registry
                        .position_of(id)
                        .ok_or(NavError::UnknownAccessPoint(*id))?;
                    model.predict(fp.position.distance(&ap_position))
                } else {
                    UNHEARABLE_STRENGTH
                };
                aggregate.put(*id, strength, fp.aggregate.channel(id));
            }
            synthesized.insert_or_merge(&fp.position, &aggregate);
        }
        Ok(synthesized)
    }

    /// 基于路径损耗模型的 KNN
    pub fn model_knn(
        offline: &[TraceEntry],
        online: &[TraceEntry],
        k: usize,
        registry: &AccessPointRegistry,
        model: &PathLossModel,
    ) -> Result<EstimateSet> {
        model.validate()?;
        let offline_map = Self::joint_fingerprints(offline);
        let online_map = Self::joint_fingerprints(online);
        check_fingerprints(&offline_map, &online_map, k)?;

        let mut estimates = EstimateSet::new(if k == 1 { "model-nn" } else { "model-knn" });
        for fp in online_map.iter() {
            let synthesized = Self::model_fingerprints(&fp.aggregate, &offline_map, registry, model)?;
            let neighbors = Self::rank_neighbors(&fp.aggregate, &synthesized)?;
            let estimated = Self::average_neighbors(&neighbors, k)?;
            debug!("在线位置 {} 模型估计为 {}", fp.position, estimated);
            estimates.push(PositionEstimate::new(fp.position, estimated, k));
        }
        Ok(estimates)
    }

    /// 基于路径损耗模型的最近邻
    pub fn model_nn(
        offline: &[TraceEntry],
        online: &[TraceEntry],
        registry: &AccessPointRegistry,
        model: &PathLossModel,
    ) -> Result<EstimateSet> {
        Self::model_knn(offline, online, 1, registry, model)
    }
}

fn validate_k(k: usize, candidates: usize) -> Result<()> {
    if k == 0 {
        return Err(NavError::InvalidArgument("k 必须大于 0".to_string()));
    }
    if k > candidates {
        return Err(NavError::InvalidArgument(format!(
            "k = {} 大于候选位置数量 {}",
            k, candidates
        )));
    }
    Ok(())
}

fn check_fingerprints(offline: &FingerprintMap, online: &FingerprintMap, k: usize) -> Result<()> {
    if offline.is_empty() {
        return Err(NavError::EmptyFingerprints(DatasetPool::Offline));
    }
    if online.is_empty() {
        return Err(NavError::EmptyFingerprints(DatasetPool::Online));
    }
    validate_k(k, offline.len())
}
