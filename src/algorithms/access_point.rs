/// 接入点标识与接入点位置登记表

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::algorithms::GeoPosition;
use crate::error::{NavError, Result};

static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}):([0-9A-Fa-f]{2}):([0-9A-Fa-f]{2}):([0-9A-Fa-f]{2}):([0-9A-Fa-f]{2}):([0-9A-Fa-f]{2})$")
        .expect("MAC 正则表达式错误")
});

/// 6 字节接入点 MAC 地址
///
/// 按字节字典序排序；哈希只使用后 4 个字节，容忍厂商前缀不同的同一设备。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccessPointId([u8; 6]);

impl AccessPointId {
    pub const fn new(bytes: [u8; 6]) -> Self {
        AccessPointId(bytes)
    }

    /// 解析 `AA:BB:CC:DD:EE:FF` 形式的地址，每组必须是两位十六进制数
    pub fn parse(text: &str) -> Result<Self> {
        let captures = MAC_PATTERN
            .captures(text)
            .ok_or_else(|| NavError::InvalidMac(text.to_string()))?;

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&captures[i + 1], 16)
                .map_err(|_| NavError::InvalidMac(text.to_string()))?;
        }
        Ok(AccessPointId(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Hash for AccessPointId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let tail = u32::from_be_bytes([self.0[2], self.0[3], self.0[4], self.0[5]]);
        tail.hash(state);
    }
}

impl fmt::Display for AccessPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for AccessPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessPointId({self})")
    }
}

impl FromStr for AccessPointId {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// 已知物理位置的接入点
#[derive(Clone, Debug)]
pub struct AccessPoint {
    pub id: AccessPointId,
    /// 接入点友好名称
    pub name: String,
    pub position: GeoPosition,
}

impl AccessPoint {
    pub fn new(id: AccessPointId, name: impl Into<String>, position: GeoPosition) -> Self {
        AccessPoint {
            id,
            name: name.into(),
            position,
        }
    }

    /// 到某个位置的三维距离
    pub fn distance_to(&self, position: &GeoPosition) -> f64 {
        self.position.distance(position)
    }
}

/// 配置文件中的接入点条目
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccessPointEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl AccessPointEntry {
    pub fn to_access_point(&self) -> Result<AccessPoint> {
        let id = AccessPointId::parse(&self.id)?;
        Ok(AccessPoint::new(
            id,
            self.name.clone(),
            GeoPosition::new(self.x, self.y, self.z),
        ))
    }
}

/// 接入点位置登记表，模型定位法通过它查询接入点坐标
#[derive(Clone, Debug, Default)]
pub struct AccessPointRegistry {
    access_points: HashMap<AccessPointId, AccessPoint>,
}

impl AccessPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(access_points: Vec<AccessPoint>) -> Self {
        let mut registry = AccessPointRegistry::new();
        for ap in access_points {
            registry.add(ap);
        }
        registry
    }

    /// 从配置条目构建，任何一个 MAC 无效都会失败
    pub fn from_entries(entries: &[AccessPointEntry]) -> Result<Self> {
        let access_points = entries
            .iter()
            .map(AccessPointEntry::to_access_point)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_vec(access_points))
    }

    pub fn add(&mut self, access_point: AccessPoint) {
        self.access_points.insert(access_point.id, access_point);
    }

    pub fn get(&self, id: &AccessPointId) -> Option<&AccessPoint> {
        self.access_points.get(id)
    }

    /// 查询接入点坐标
    pub fn position_of(&self, id: &AccessPointId) -> Option<GeoPosition> {
        self.access_points.get(id).map(|ap| ap.position)
    }

    pub fn remove(&mut self, id: &AccessPointId) -> Option<AccessPoint> {
        self.access_points.remove(id)
    }

    pub fn len(&self) -> usize {
        self.access_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccessPointId, &AccessPoint)> {
        self.access_points.iter()
    }
}
