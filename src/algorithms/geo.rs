/// 三维位置与朝向
///
/// `GeoPosition` 构造后按值使用；需要作为哈希键时使用 `PositionKey`，
/// 不在原位置对象上修改朝向。

use std::cmp::Ordering;
use std::fmt;

use crate::error::{NavError, Result};

/// 带朝向的三维坐标，朝向以度为单位，`NaN` 表示未设置
#[derive(Clone, Copy, Debug)]
pub struct GeoPosition {
    x: f64,
    y: f64,
    z: f64,
    orientation: f64,
}

impl GeoPosition {
    /// 创建不带朝向的位置
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        GeoPosition {
            x,
            y,
            z,
            orientation: f64::NAN,
        }
    }

    /// 平面位置，z 取 0
    pub fn planar(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0)
    }

    /// 创建带朝向的位置
    ///
    /// 朝向必须位于 [0, 360) 或为 `NaN`
    pub fn with_orientation(x: f64, y: f64, z: f64, orientation: f64) -> Result<Self> {
        validate_orientation(orientation)?;
        Ok(GeoPosition {
            x,
            y,
            z,
            orientation,
        })
    }

    /// 所有分量均未设置
    pub fn unset() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    /// 从字符串解析
    ///
    /// 支持 `x,y,z`、`x,y,z,o` 以及空白分隔的同样形式；朝向可写作 `NaN`
    pub fn parse(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = if text.contains(',') {
            text.split(',').map(str::trim).filter(|t| !t.is_empty()).collect()
        } else {
            text.split_whitespace().collect()
        };

        if tokens.len() != 3 && tokens.len() != 4 {
            return Err(NavError::InvalidPosition(text.to_string()));
        }

        let number = |token: &str| -> Result<f64> {
            token
                .parse::<f64>()
                .map_err(|_| NavError::InvalidPosition(text.to_string()))
        };

        let x = number(tokens[0])?;
        let y = number(tokens[1])?;
        let z = number(tokens[2])?;
        let orientation = match tokens.get(3) {
            Some(&"NaN") | None => f64::NAN,
            Some(token) => number(*token)?,
        };

        Self::with_orientation(x, y, z, orientation)
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    pub fn has_orientation(&self) -> bool {
        !self.orientation.is_nan()
    }

    /// 返回替换朝向后的新位置
    pub fn oriented(&self, orientation: f64) -> Result<Self> {
        Self::with_orientation(self.x, self.y, self.z, orientation)
    }

    /// 返回去掉朝向的新位置
    pub fn without_orientation(&self) -> Self {
        Self::new(self.x, self.y, self.z)
    }

    /// 至少有一个坐标已设置
    pub fn is_initialized(&self) -> bool {
        !(self.x.is_nan() && self.y.is_nan() && self.z.is_nan())
    }

    /// 只比较坐标，忽略朝向
    pub fn equals_without_orientation(&self, other: &GeoPosition) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }

    /// 三维欧几里得距离
    pub fn distance(&self, other: &GeoPosition) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// 平面距离（忽略 z）
    pub fn distance_2d(&self, other: &GeoPosition) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// 坐标相加，保留本位置的朝向
    pub fn add(&self, other: &GeoPosition) -> Self {
        GeoPosition {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            orientation: self.orientation,
        }
    }

    /// 坐标按系数缩放，保留朝向
    pub fn stretch(&self, factor: f64) -> Self {
        GeoPosition {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
            orientation: self.orientation,
        }
    }

    /// 坐标三元组
    pub fn coordinates(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// 归一化哈希键
    pub fn key(&self, keep_orientation: bool) -> PositionKey {
        PositionKey::new(self, keep_orientation)
    }
}

fn validate_orientation(orientation: f64) -> Result<()> {
    if orientation.is_nan() || (0.0..360.0).contains(&orientation) {
        Ok(())
    } else {
        Err(NavError::InvalidOrientation(orientation))
    }
}

impl Default for GeoPosition {
    fn default() -> Self {
        Self::unset()
    }
}

impl PartialEq for GeoPosition {
    fn eq(&self, other: &Self) -> bool {
        if !self.is_initialized()
            && !other.is_initialized()
            && self.orientation.is_nan()
            && other.orientation.is_nan()
        {
            return true;
        }
        if !self.equals_without_orientation(other) {
            return false;
        }
        self.orientation == other.orientation
            || (self.orientation.is_nan() && other.orientation.is_nan())
    }
}

impl PartialOrd for GeoPosition {
    /// 按 x、y、z、朝向依次比较
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        for (a, b) in [
            (self.x, other.x),
            (self.y, other.y),
            (self.z, other.z),
            (self.orientation, other.orientation),
        ] {
            if a < b {
                return Some(Ordering::Less);
            }
            if a > b {
                return Some(Ordering::Greater);
            }
        }
        Some(Ordering::Equal)
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:?}, {:?}, {:?}, {:?})",
            self.x, self.y, self.z, self.orientation
        )
    }
}

/// 位置的归一化哈希键
///
/// 坐标按位比较，`-0.0` 折叠为 `0.0`，所有 `NaN` 折叠为同一值；
/// 朝向可选择保留或丢弃。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    x: u64,
    y: u64,
    z: u64,
    orientation: Option<u64>,
}

impl PositionKey {
    pub fn new(position: &GeoPosition, keep_orientation: bool) -> Self {
        let orientation = if keep_orientation && position.has_orientation() {
            Some(canonical_bits(position.orientation))
        } else {
            None
        };
        PositionKey {
            x: canonical_bits(position.x),
            y: canonical_bits(position.y),
            z: canonical_bits(position.z),
            orientation,
        }
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}
