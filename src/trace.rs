/// 轨迹文件读写
///
/// 每行是以分号分隔的 `key=value` 字段，以 `#` 开头的行为注释：
///
/// ```text
/// t=1139643118358;id=00:02:2D:21:0F:33;pos=0.0,0.0,0.0;degree=0.0;00:14:BF:B1:7C:54=-56,2437000000,3
/// ```
///
/// 识别的键为 `t`、`id`、`pos`、`degree`、`speed`，其余键都按接入点 MAC 处理。

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info};

use crate::algorithms::{AccessPointId, GeoPosition, SignalAggregate};
use crate::error::{NavError, Result};
use crate::io::write_atomically;

// ============================================================================
// 轨迹记录
// ============================================================================

/// 一次扫描记录：设备在某个位置听到的所有接入点
#[derive(Clone, Debug)]
pub struct TraceEntry {
    /// 毫秒时间戳，-1 表示未记录
    pub timestamp: i64,
    /// 采集设备的 MAC
    pub device: AccessPointId,
    pub position: GeoPosition,
    pub speed: Option<f64>,
    pub samples: SignalAggregate,
}

impl TraceEntry {
    pub fn new(timestamp: i64, device: AccessPointId, position: GeoPosition, samples: SignalAggregate) -> Self {
        TraceEntry {
            timestamp,
            device,
            position,
            speed: None,
            samples,
        }
    }

    /// 时间戳转换为 UTC 时间
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        if self.timestamp < 0 {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
    }

    /// 序列化为一行轨迹格式
    ///
    /// 每个接入点只写出第一个强度样本和信道，信道未知时写 `NaN`
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "t={};id={};pos={:?},{:?},{:?};degree={:?}",
            self.timestamp,
            self.device,
            self.position.x(),
            self.position.y(),
            self.position.z(),
            self.position.orientation()
        );
        if let Some(speed) = self.speed {
            line.push_str(&format!(";speed={:?}", speed));
        }
        for id in self.samples.access_points() {
            let strength = self.samples.first_strength(id).unwrap_or(f64::NAN);
            let channel = self.samples.channel(id).unwrap_or(f64::NAN);
            line.push_str(&format!(";{}={:?},{:?}", id, strength, channel));
        }
        line
    }
}

impl Default for TraceEntry {
    fn default() -> Self {
        TraceEntry::new(
            -1,
            AccessPointId::new([0; 6]),
            GeoPosition::unset(),
            SignalAggregate::new(),
        )
    }
}

// ============================================================================
// 准入过滤器
// ============================================================================

/// 解析时决定某个值是否被接受
///
/// 空过滤器接受一切
pub trait AdmissionFilter<T: ?Sized> {
    fn contains(&self, item: &T) -> bool;

    fn is_empty(&self) -> bool;

    fn admits(&self, item: &T) -> bool {
        self.is_empty() || self.contains(item)
    }
}

/// 接入点过滤器
#[derive(Clone, Debug, Default)]
pub enum ApFilter {
    #[default]
    AllowAll,
    /// 只接受列出的接入点
    Explicit(HashSet<AccessPointId>),
    /// 排除列出的接入点
    Exclude(HashSet<AccessPointId>),
    /// 按 MAC 文本匹配，例如厂商前缀 `^00:14:BF`
    Pattern(Regex),
    /// 任一子过滤器包含即接受
    Any(Vec<ApFilter>),
}

impl ApFilter {
    pub fn explicit(ids: impl IntoIterator<Item = AccessPointId>) -> Self {
        ApFilter::Explicit(ids.into_iter().collect())
    }

    pub fn exclude(ids: impl IntoIterator<Item = AccessPointId>) -> Self {
        ApFilter::Exclude(ids.into_iter().collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(ApFilter::Pattern)
            .map_err(|e| NavError::Config(format!("接入点过滤正则无效: {}", e)))
    }
}

impl AdmissionFilter<AccessPointId> for ApFilter {
    fn contains(&self, id: &AccessPointId) -> bool {
        match self {
            ApFilter::AllowAll => true,
            ApFilter::Explicit(ids) => ids.contains(id),
            ApFilter::Exclude(ids) => !ids.contains(id),
            ApFilter::Pattern(re) => re.is_match(&id.to_string()),
            ApFilter::Any(filters) => filters.iter().any(|f| f.contains(id)),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ApFilter::AllowAll => true,
            ApFilter::Explicit(ids) | ApFilter::Exclude(ids) => ids.is_empty(),
            ApFilter::Pattern(_) => false,
            ApFilter::Any(filters) => filters.is_empty(),
        }
    }
}

/// 位置过滤器，比较时忽略朝向
#[derive(Clone, Debug, Default)]
pub enum PositionFilter {
    #[default]
    AllowAll,
    Explicit(Vec<GeoPosition>),
    Exclude(Vec<GeoPosition>),
    /// 只接受与起点在每个坐标上相差网格尺寸整数倍的位置
    Grid { start: GeoPosition, dimension: f64 },
}

impl AdmissionFilter<GeoPosition> for PositionFilter {
    fn contains(&self, position: &GeoPosition) -> bool {
        match self {
            PositionFilter::AllowAll => true,
            PositionFilter::Explicit(list) => list.iter().any(|p| p.equals_without_orientation(position)),
            PositionFilter::Exclude(list) => !list.iter().any(|p| p.equals_without_orientation(position)),
            PositionFilter::Grid { start, dimension } => {
                let on_grid = |a: f64, b: f64| (a - b).abs() % dimension == 0.0;
                on_grid(position.x(), start.x())
                    && on_grid(position.y(), start.y())
                    && on_grid(position.z(), start.z())
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            PositionFilter::AllowAll => true,
            PositionFilter::Explicit(list) | PositionFilter::Exclude(list) => list.is_empty(),
            PositionFilter::Grid { .. } => false,
        }
    }
}

/// 朝向过滤器：接受的取整后角度集合
#[derive(Clone, Debug, Default)]
pub struct OrientationFilter {
    degrees: Vec<f64>,
}

impl OrientationFilter {
    pub fn new(degrees: impl IntoIterator<Item = f64>) -> Self {
        OrientationFilter {
            degrees: degrees.into_iter().collect(),
        }
    }

    pub fn add(&mut self, degree: f64) {
        if !self.degrees.contains(&degree) {
            self.degrees.push(degree);
        }
    }
}

impl AdmissionFilter<f64> for OrientationFilter {
    fn contains(&self, degree: &f64) -> bool {
        self.degrees.contains(degree)
    }

    fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }
}

// ============================================================================
// 解析器
// ============================================================================

/// 轨迹文件解析器
#[derive(Clone, Debug)]
pub struct TraceParser {
    /// 朝向取整精度（度）
    pub precision: f64,
    pub ap_filter: ApFilter,
    pub position_filter: PositionFilter,
    pub orientation_filter: OrientationFilter,
    /// 跳过 ad-hoc 节点（值的第三个字段为 `1`）
    pub skip_ad_hoc: bool,
}

impl TraceParser {
    pub fn new(precision: f64) -> Self {
        TraceParser {
            precision,
            ap_filter: ApFilter::default(),
            position_filter: PositionFilter::default(),
            orientation_filter: OrientationFilter::default(),
            skip_ad_hoc: true,
        }
    }

    pub fn with_ap_filter(mut self, filter: ApFilter) -> Self {
        self.ap_filter = filter;
        self
    }

    pub fn with_position_filter(mut self, filter: PositionFilter) -> Self {
        self.position_filter = filter;
        self
    }

    pub fn with_orientation_filter(mut self, filter: OrientationFilter) -> Self {
        self.orientation_filter = filter;
        self
    }

    pub fn with_skip_ad_hoc(mut self, skip: bool) -> Self {
        self.skip_ad_hoc = skip;
        self
    }

    /// 读取并解析轨迹文件，任何一行出错都会使整个文件失败
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Vec<TraceEntry>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| NavError::io(path, e))?;
        let entries = self.parse_str(&content)?;
        info!("从 {} 读取 {} 条轨迹记录", path.display(), entries.len());
        Ok(entries)
    }

    /// 解析轨迹文本
    pub fn parse_str(&self, content: &str) -> Result<Vec<TraceEntry>> {
        if !(self.precision > 0.0) {
            return Err(NavError::InvalidArgument(format!(
                "朝向精度必须为正数，实际为 {}",
                self.precision
            )));
        }

        let mut entries = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(entry) = self.parse_line(line, i + 1)? {
                entries.push(entry);
            }
        }
        debug!("解析完成，共 {} 条记录", entries.len());
        Ok(entries)
    }

    /// 解析一行；被位置过滤器拒绝时返回 `None`
    fn parse_line(&self, line: &str, number: usize) -> Result<Option<TraceEntry>> {
        let fail = |message: String| NavError::Parse { line: number, message };

        let mut entry = TraceEntry::default();
        let mut coordinates = None;
        let mut orientation = f64::NAN;

        for field in line.split(';').filter(|f| !f.is_empty()) {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| fail(format!("需要 key=value，实际为 '{}'", field)))?;

            match key {
                "t" => {
                    entry.timestamp = value
                        .parse()
                        .map_err(|_| fail(format!("时间戳无效: '{}'", value)))?;
                }
                "id" => {
                    entry.device = AccessPointId::parse(value).map_err(|e| fail(e.to_string()))?;
                }
                "pos" => {
                    let parts: Vec<&str> = value.splitn(3, ',').collect();
                    if parts.len() != 3 {
                        return Err(fail(format!("需要 x,y,z 坐标，实际为 '{}'", value)));
                    }
                    let mut xyz = [0.0; 3];
                    for (slot, part) in xyz.iter_mut().zip(&parts) {
                        *slot = parse_number(part).map_err(|m| fail(m))?;
                    }
                    coordinates = Some(xyz);
                }
                "degree" => {
                    let raw = parse_number(value).map_err(|m| fail(m))?;
                    if raw.is_nan() {
                        continue;
                    }
                    let mut degree = (raw / self.precision + 0.5).floor() * self.precision;
                    if degree == 360.0 {
                        degree = 0.0;
                    }
                    // 被朝向过滤器拒绝时只丢弃朝向，记录本身保留
                    if self.orientation_filter.admits(&degree) {
                        orientation = degree;
                    }
                }
                "speed" => {
                    entry.speed = Some(parse_number(value).map_err(|m| fail(m))?);
                }
                _ => self.parse_access_point(key, value, &mut entry.samples).map_err(|m| fail(m))?,
            }
        }

        let [x, y, z] = coordinates.ok_or_else(|| fail("缺少 pos 字段".to_string()))?;
        entry.position =
            GeoPosition::with_orientation(x, y, z, orientation).map_err(|e| fail(e.to_string()))?;

        if !self.position_filter.admits(&entry.position) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn parse_access_point(
        &self,
        key: &str,
        value: &str,
        samples: &mut SignalAggregate,
    ) -> std::result::Result<(), String> {
        let id = AccessPointId::parse(key).map_err(|e| e.to_string())?;
        if !self.ap_filter.admits(&id) {
            return Ok(());
        }

        let parts: Vec<&str> = value.split(',').collect();
        if self.skip_ad_hoc && (parts.len() == 3 || parts.len() == 4) && parts[2] == "1" {
            return Ok(());
        }

        match parts.len() {
            2 | 3 => {
                let strength = parse_number(parts[0])?;
                let channel = parse_channel(parts[1])?;
                samples.put(id, strength, channel);
            }
            4 => {
                let strength = parse_number(parts[0])?;
                let channel = parse_channel(parts[1])?;
                let noise = parse_number(parts[3])?;
                samples.put_with_noise(id, strength, noise, channel);
            }
            n => {
                return Err(format!("接入点 {} 的值需要 2 到 4 个字段，实际为 {}", id, n));
            }
        }
        Ok(())
    }
}

impl Default for TraceParser {
    fn default() -> Self {
        TraceParser::new(1.0)
    }
}

fn parse_number(text: &str) -> std::result::Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| format!("数值无效: '{}'", text))
}

fn parse_channel(text: &str) -> std::result::Result<Option<f64>, String> {
    let channel = parse_number(text)?;
    Ok((!channel.is_nan()).then_some(channel))
}

/// 把轨迹记录逐行写入文件
pub fn write_trace_file(path: impl AsRef<Path>, entries: &[TraceEntry]) -> Result<()> {
    let path = path.as_ref();
    let mut content = String::new();
    for entry in entries {
        content.push_str(&entry.to_line());
        content.push('\n');
    }
    write_atomically(path, &content)?;
    info!("写入 {} 条轨迹记录到 {}", entries.len(), path.display());
    Ok(())
}
