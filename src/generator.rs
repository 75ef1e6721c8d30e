/// 离线 / 在线数据集生成
///
/// 把两个独立的轨迹池按位置（可选朝向）分桶，然后在每个桶里无放回地随机抽取
/// 固定数量的记录。`Radar` 模式下会先把所有记录裁剪到公共接入点集合。
///
/// 随机源通过构造函数注入，固定种子时输出完全可复现。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithms::{AccessPointId, GeoPosition, PositionKey};
use crate::error::{DatasetPool, NavError, Result};
use crate::trace::{write_trace_file, TraceEntry};

// ============================================================================
// 配置
// ============================================================================

/// 轨迹解释模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceMode {
    /// 先把记录归一化到最小公共接入点集合
    Radar,
    RadarPUnknown,
    #[default]
    Rice,
}

impl FromStr for TraceMode {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Radar" => Ok(TraceMode::Radar),
            "RadarPUnknown" => Ok(TraceMode::RadarPUnknown),
            "Rice" => Ok(TraceMode::Rice),
            other => Err(NavError::UnknownTraceMode(other.to_string())),
        }
    }
}

impl fmt::Display for TraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceMode::Radar => "Radar",
            TraceMode::RadarPUnknown => "RadarPUnknown",
            TraceMode::Rice => "Rice",
        };
        write!(f, "{}", name)
    }
}

/// 生成参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 每个离线桶抽取的记录数
    pub offline_size: usize,
    /// 每个选中的在线桶抽取的记录数
    pub online_size: usize,
    /// 在线集合覆盖的位置比例（百分比）
    pub online_ratio: f64,
    /// 分桶时忽略朝向
    pub discard_orientation: bool,
    pub mode: TraceMode,
    /// 允许记录缺少的最小集合接入点数量，也是裁剪后保留的额外接入点数量
    pub ap_tolerance: usize,
    /// 随机种子，`None` 时使用系统熵
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            offline_size: 10,
            online_size: 5,
            online_ratio: 100.0,
            discard_orientation: true,
            mode: TraceMode::Rice,
            ap_tolerance: 0,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.offline_size == 0 || self.online_size == 0 {
            return Err(NavError::Config(format!(
                "每个位置的样本数必须至少为 1（离线 {}, 在线 {}）",
                self.offline_size, self.online_size
            )));
        }
        if !(self.online_ratio > 0.0 && self.online_ratio <= 100.0) {
            return Err(NavError::Config(format!(
                "在线比例必须在 (0, 100] 之间，实际为 {}",
                self.online_ratio
            )));
        }
        Ok(())
    }
}

// ============================================================================
// 分桶
// ============================================================================

#[derive(Debug)]
struct Bucket {
    position: GeoPosition,
    entries: Vec<TraceEntry>,
}

/// 按首次出现顺序排列的桶
#[derive(Debug, Default)]
struct Buckets {
    buckets: Vec<Bucket>,
    index: HashMap<PositionKey, usize>,
}

impl Buckets {
    fn group(entries: &[TraceEntry], discard_orientation: bool) -> Self {
        let mut grouped = Buckets::default();
        for entry in entries {
            let mut entry = entry.clone();
            if discard_orientation {
                entry.position = entry.position.without_orientation();
            }
            let key = entry.position.key(!discard_orientation);
            match grouped.index.get(&key) {
                Some(&i) => grouped.buckets[i].entries.push(entry),
                None => {
                    grouped.index.insert(key, grouped.buckets.len());
                    grouped.buckets.push(Bucket {
                        position: entry.position,
                        entries: vec![entry],
                    });
                }
            }
        }
        grouped
    }

    fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bucket> {
        self.buckets.iter_mut()
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}

// ============================================================================
// 生成结果
// ============================================================================

/// 生成的离线 / 在线数据集
#[derive(Clone, Debug)]
pub struct GeneratedDataset {
    pub offline: Vec<TraceEntry>,
    pub online: Vec<TraceEntry>,
    /// `Radar` 模式下的最小公共接入点集合（按 MAC 排序），其他模式为空
    pub minimum_ap_set: Vec<AccessPointId>,
    /// 在线位置的首次出现顺序
    pub online_order: Vec<GeoPosition>,
}

impl GeneratedDataset {
    pub fn write_offline(&self, path: impl AsRef<Path>) -> Result<()> {
        write_trace_file(path, &self.offline)
    }

    pub fn write_online(&self, path: impl AsRef<Path>) -> Result<()> {
        write_trace_file(path, &self.online)
    }
}

// ============================================================================
// 生成器
// ============================================================================

pub struct DatasetGenerator<R: Rng = ChaCha8Rng> {
    config: GeneratorConfig,
    rng: R,
}

impl DatasetGenerator<ChaCha8Rng> {
    /// 固定种子，输出可复现
    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Result<Self> {
        Self::new(config, ChaCha8Rng::seed_from_u64(seed))
    }

    /// 使用系统熵作为种子
    pub fn from_entropy(config: GeneratorConfig) -> Result<Self> {
        Self::new(config, ChaCha8Rng::from_entropy())
    }

    /// 根据配置中的种子选择随机源
    pub fn from_config(config: GeneratorConfig) -> Result<Self> {
        match config.seed {
            Some(seed) => Self::with_seed(config, seed),
            None => Self::from_entropy(config),
        }
    }
}

impl<R: Rng> DatasetGenerator<R> {
    pub fn new(config: GeneratorConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(DatasetGenerator { config, rng })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// 生成离线与在线数据集
    ///
    /// # 错误
    /// 任一轨迹池为空，或某个桶的记录数少于要求值时整体失败，不返回部分结果
    pub fn generate(&mut self, offline: &[TraceEntry], online: &[TraceEntry]) -> Result<GeneratedDataset> {
        if offline.is_empty() {
            return Err(NavError::EmptyTracePool(DatasetPool::Offline));
        }
        if online.is_empty() {
            return Err(NavError::EmptyTracePool(DatasetPool::Online));
        }

        let discard = self.config.discard_orientation;
        let mut offline_buckets = Buckets::group(offline, discard);
        let mut online_buckets = Buckets::group(online, discard);
        info!(
            "{} 模式: {} 个离线指纹位置, {} 个在线测试位置",
            self.config.mode,
            offline_buckets.len(),
            online_buckets.len()
        );
        let online_order: Vec<GeoPosition> = online_buckets.iter().map(|b| b.position).collect();

        let mut minimum_ap_set = Vec::new();
        if self.config.mode == TraceMode::Radar {
            minimum_ap_set = minimum_ap_set_of(&offline_buckets, &online_buckets);
            info!("最小接入点集合包含 {} 个接入点", minimum_ap_set.len());

            let members: HashSet<AccessPointId> = minimum_ap_set.iter().copied().collect();
            let tolerance = self.config.ap_tolerance;
            delete_unsuitable(&mut offline_buckets, &members, tolerance);
            delete_unsuitable(&mut online_buckets, &members, tolerance);
            self.trim(&mut offline_buckets, &members);
            self.trim(&mut online_buckets, &members);
        }

        check_bucket_sizes(&offline_buckets, self.config.offline_size, DatasetPool::Offline)?;
        check_bucket_sizes(&online_buckets, self.config.online_size, DatasetPool::Online)?;

        let selected = self.choose_online_buckets(&online_buckets);
        info!("在线集合包含 {} 个位置", selected.len());

        let mut online_set = Vec::new();
        for (i, bucket) in online_buckets.iter_mut().enumerate() {
            if selected.contains(&i) {
                draw(&mut self.rng, &mut bucket.entries, self.config.online_size, &mut online_set);
            }
        }

        let mut offline_set = Vec::new();
        for bucket in offline_buckets.iter_mut() {
            draw(&mut self.rng, &mut bucket.entries, self.config.offline_size, &mut offline_set);
        }

        info!(
            "生成完成: 离线 {} 条, 在线 {} 条",
            offline_set.len(),
            online_set.len()
        );
        Ok(GeneratedDataset {
            offline: offline_set,
            online: online_set,
            minimum_ap_set,
            online_order,
        })
    }

    /// 删除每条记录中不在最小集合内的接入点，随机保留 `ap_tolerance` 个
    fn trim(&mut self, buckets: &mut Buckets, members: &HashSet<AccessPointId>) {
        let keep = self.config.ap_tolerance;
        for bucket in buckets.iter_mut() {
            for entry in &mut bucket.entries {
                let mut extras: Vec<AccessPointId> = entry
                    .samples
                    .access_points()
                    .filter(|id| !members.contains(*id))
                    .copied()
                    .collect();
                let to_delete = extras.len().saturating_sub(keep);
                for _ in 0..to_delete {
                    let k = self.rng.gen_range(0..extras.len());
                    let id = extras.remove(k);
                    entry.samples.remove(&id);
                }
            }
        }
    }

    /// 选出参与在线集合的桶下标
    ///
    /// 先按位置（忽略朝向）分组，随机选出若干个位置，
    /// 再在每个位置的朝向桶中随机选一个
    fn choose_online_buckets(&mut self, buckets: &Buckets) -> HashSet<usize> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_index: HashMap<PositionKey, usize> = HashMap::new();
        for (i, bucket) in buckets.iter().enumerate() {
            let key = bucket.position.key(false);
            match group_index.get(&key) {
                Some(&g) => groups[g].push(i),
                None => {
                    group_index.insert(key, groups.len());
                    groups.push(vec![i]);
                }
            }
        }

        let wanted = (groups.len() as f64 * self.config.online_ratio / 100.0 + 0.5).floor() as usize;
        let count = wanted.clamp(1, groups.len());

        let mut remaining: Vec<usize> = (0..groups.len()).collect();
        let mut selected = HashSet::with_capacity(count);
        for _ in 0..count {
            let pi = self.rng.gen_range(0..remaining.len());
            let group = &groups[remaining[pi]];
            let bi = self.rng.gen_range(0..group.len());
            selected.insert(group[bi]);
            remaining.remove(pi);
        }
        selected
    }
}

/// 在所有离线和在线桶中都出现过的接入点
fn minimum_ap_set_of(offline: &Buckets, online: &Buckets) -> Vec<AccessPointId> {
    let mut survivors: Option<HashSet<AccessPointId>> = None;
    for bucket in offline.iter().chain(online.iter()) {
        let seen: HashSet<AccessPointId> = bucket
            .entries
            .iter()
            .flat_map(|e| e.samples.access_points().copied())
            .collect();
        survivors = Some(match survivors {
            None => seen,
            Some(current) => current.intersection(&seen).copied().collect(),
        });
    }
    let mut set: Vec<AccessPointId> = survivors.unwrap_or_default().into_iter().collect();
    set.sort();
    set
}

/// 删除缺少超过 `tolerance` 个最小集合接入点的记录
fn delete_unsuitable(buckets: &mut Buckets, members: &HashSet<AccessPointId>, tolerance: usize) {
    for bucket in buckets.iter_mut() {
        let before = bucket.entries.len();
        bucket.entries.retain(|entry| {
            let missing = members.iter().filter(|id| !entry.samples.contains(id)).count();
            missing <= tolerance
        });
        if bucket.entries.len() < before {
            debug!(
                "位置 {} 删除了 {} 条接入点不全的记录",
                bucket.position,
                before - bucket.entries.len()
            );
        }
    }
}

fn check_bucket_sizes(buckets: &Buckets, required: usize, pool: DatasetPool) -> Result<()> {
    for bucket in buckets.iter() {
        let available = bucket.entries.len();
        if available < required {
            return Err(NavError::InsufficientSamples {
                pool,
                position: bucket.position.to_string(),
                available,
                required,
            });
        }
        if available == required {
            warn!(
                "{} 位置 {} 的全部 {} 条记录都会被使用，无法随机化",
                pool, bucket.position, available
            );
        }
    }
    Ok(())
}

/// 无放回地随机抽取 `count` 条记录
fn draw<R: Rng>(rng: &mut R, bucket: &mut Vec<TraceEntry>, count: usize, out: &mut Vec<TraceEntry>) {
    for _ in 0..count {
        let j = rng.gen_range(0..bucket.len());
        out.push(bucket.remove(j));
    }
}
