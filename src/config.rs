/// 运行配置
///
/// JSON 格式，所有字段都有默认值，缺省字段按默认值补齐。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithms::{AccessPointEntry, AccessPointRegistry, PathLossModel};
use crate::error::{NavError, Result};
use crate::generator::GeneratorConfig;
use crate::trace::TraceParser;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 离线（训练）轨迹文件
    pub offline_trace: PathBuf,
    /// 在线（测试）轨迹文件
    pub online_trace: PathBuf,
    /// 离线轨迹朝向取整精度（度）
    pub offline_precision: f64,
    /// 在线轨迹朝向取整精度（度）
    pub online_precision: f64,
    pub skip_ad_hoc: bool,
    pub generator: GeneratorConfig,
    /// KNN 的邻居数
    pub k: usize,
    pub path_loss: PathLossModel,
    /// 模型定位需要的接入点坐标
    pub access_points: Vec<AccessPointEntry>,
    /// 结果输出目录
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            offline_trace: PathBuf::from("data/offline.trace"),
            online_trace: PathBuf::from("data/online.trace"),
            offline_precision: 45.0,
            online_precision: 5.0,
            skip_ad_hoc: true,
            generator: GeneratorConfig::default(),
            k: 3,
            path_loss: PathLossModel::default(),
            access_points: Vec::new(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| NavError::io(path, e))?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        crate::io::write_atomically(path, &text)
    }

    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        self.path_loss.validate()?;
        if self.k == 0 {
            return Err(NavError::Config("k 必须至少为 1".to_string()));
        }
        for (name, precision) in [
            ("offline_precision", self.offline_precision),
            ("online_precision", self.online_precision),
        ] {
            if !(precision > 0.0) {
                return Err(NavError::Config(format!(
                    "{} 必须为正数，实际为 {}",
                    name, precision
                )));
            }
        }
        Ok(())
    }

    pub fn offline_parser(&self) -> TraceParser {
        TraceParser::new(self.offline_precision).with_skip_ad_hoc(self.skip_ad_hoc)
    }

    pub fn online_parser(&self) -> TraceParser {
        TraceParser::new(self.online_precision).with_skip_ad_hoc(self.skip_ad_hoc)
    }

    pub fn registry(&self) -> Result<AccessPointRegistry> {
        AccessPointRegistry::from_entries(&self.access_points)
    }

    /// 输出目录下的文件路径
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}
