/// WiFi 指纹室内定位流程
///
/// 支持的功能：
/// - 读取离线 / 在线轨迹并生成数据集
/// - 经验指纹 NN / KNN 与路径损耗模型 NN / KNN 定位
/// - 估计结果写文件与累积分布评分

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::algorithms::{EstimateSet, FingerprintAlgorithm};
use crate::config::RunConfig;
use crate::error::{NavError, Result};
use crate::evaluation::{cdf_table, evaluate, ErrorSummary};
use crate::generator::{DatasetGenerator, GeneratedDataset};
use crate::io::{read_estimates, write_estimates, write_evaluation};
use crate::trace::TraceEntry;

/// 定位方法
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    EmpiricalNn,
    EmpiricalKnn,
    ModelNn,
    ModelKnn,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::EmpiricalNn => "empirical_nn",
            Method::EmpiricalKnn => "empirical_knn",
            Method::ModelNn => "model_nn",
            Method::ModelKnn => "model_knn",
        }
    }

    pub fn output_file(&self) -> String {
        format!("{}_output.txt", self.name())
    }

    pub fn score_file(&self) -> String {
        format!("score_{}.txt", self.name())
    }

    pub fn uses_model(&self) -> bool {
        matches!(self, Method::ModelNn | Method::ModelKnn)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 一种方法的运行结果
#[derive(Clone, Debug)]
pub struct MethodReport {
    pub method: Method,
    pub estimates_path: PathBuf,
    pub score_path: PathBuf,
    pub summary: ErrorSummary,
}

/// 完整运行的汇总
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub offline_entries: usize,
    pub online_entries: usize,
    pub reports: Vec<MethodReport>,
    pub finished_at: DateTime<Utc>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "运行完成于 {}（离线 {} 条, 在线 {} 条）",
            self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.offline_entries,
            self.online_entries
        )?;
        for report in &self.reports {
            writeln!(f, "  {:<14} {}", report.method.name(), report.summary)?;
        }
        Ok(())
    }
}

/// 按配置执行 读取 -> 生成 -> 定位 -> 写文件 -> 评分
pub struct PositioningPipeline {
    config: RunConfig,
}

impl PositioningPipeline {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(PositioningPipeline { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// 读取离线和在线轨迹文件
    pub fn load_traces(&self) -> Result<(Vec<TraceEntry>, Vec<TraceEntry>)> {
        let offline = self.config.offline_parser().parse_file(&self.config.offline_trace)?;
        let online = self.config.online_parser().parse_file(&self.config.online_trace)?;
        Ok((offline, online))
    }

    /// 从已解析的轨迹生成数据集
    pub fn generate_from(&self, offline: &[TraceEntry], online: &[TraceEntry]) -> Result<GeneratedDataset> {
        let mut generator = DatasetGenerator::from_config(self.config.generator.clone())?;
        generator.generate(offline, online)
    }

    /// 读取轨迹文件并生成数据集
    pub fn generate(&self) -> Result<GeneratedDataset> {
        let (offline, online) = self.load_traces()?;
        self.generate_from(&offline, &online)
    }

    /// 用指定方法定位
    pub fn estimate(&self, method: Method, dataset: &GeneratedDataset) -> Result<EstimateSet> {
        let (offline, online, k) = (&dataset.offline, &dataset.online, self.config.k);
        match method {
            Method::EmpiricalNn => FingerprintAlgorithm::empirical_nn(offline, online),
            Method::EmpiricalKnn => FingerprintAlgorithm::empirical_knn(offline, online, k),
            Method::ModelNn => {
                let registry = self.config.registry()?;
                FingerprintAlgorithm::model_nn(offline, online, &registry, &self.config.path_loss)
            }
            Method::ModelKnn => {
                let registry = self.config.registry()?;
                FingerprintAlgorithm::model_knn(offline, online, k, &registry, &self.config.path_loss)
            }
        }
    }

    /// 默认运行的方法：经验 NN 和 KNN，配置了接入点坐标时再加上模型 NN 和 KNN
    pub fn default_methods(&self) -> Vec<Method> {
        let mut methods = vec![Method::EmpiricalNn, Method::EmpiricalKnn];
        if !self.config.access_points.is_empty() {
            methods.extend([Method::ModelNn, Method::ModelKnn]);
        }
        methods
    }

    /// 在同一个生成的数据集上运行各个方法，写出估计文件与评分文件
    pub fn run(&self, methods: &[Method]) -> Result<RunSummary> {
        let dataset = self.generate()?;
        self.run_on(&dataset, methods)
    }

    pub fn run_on(&self, dataset: &GeneratedDataset, methods: &[Method]) -> Result<RunSummary> {
        let mut reports = Vec::with_capacity(methods.len());
        for &method in methods {
            let estimates = self.estimate(method, dataset)?;
            let estimates_path = self.config.output_path(&method.output_file());
            write_estimates(&estimates_path, &estimates)?;

            let score_path = self.config.output_path(&method.score_file());
            let summary = score_file(&estimates_path, &score_path)?;
            info!("{}: {}", method, summary);
            reports.push(MethodReport {
                method,
                estimates_path,
                score_path,
                summary,
            });
        }

        Ok(RunSummary {
            offline_entries: dataset.offline.len(),
            online_entries: dataset.online.len(),
            reports,
            finished_at: Utc::now(),
        })
    }
}

/// 读取估计文件，写出累积分布表并返回误差汇总
pub fn score_file(estimates_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<ErrorSummary> {
    let pairs = read_estimates(estimates_path)?;
    if pairs.is_empty() {
        return Err(NavError::EmptyInput("estimates"));
    }
    let errors = evaluate(&pairs);
    write_evaluation(output_path, &cdf_table(&errors))?;
    ErrorSummary::from_errors(&errors)
}
