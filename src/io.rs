/// 估计结果文件与评估文件的读写
///
/// 估计文件每行 `True=x,y,z;Est=x,y,z`，评估文件每行 `err=<v>;percentage=<p>`，
/// 最后一行之后都没有换行符。浮点数按最短往返格式输出。

use std::fs;
use std::path::Path;

use tracing::info;

use crate::algorithms::{EstimateSet, GeoPosition};
use crate::error::{NavError, Result};
use crate::evaluation::CdfRow;

/// 先写临时文件再重命名，失败时不留下半截的目标文件
pub fn write_atomically(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");
    if let Err(e) = fs::write(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(NavError::io(&temp_path, e));
    }
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        NavError::io(path, e)
    })
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| NavError::io(path, e))
}

// ============================================================================
// 估计文件
// ============================================================================

fn format_coordinates(position: &GeoPosition) -> String {
    format!("{:?},{:?},{:?}", position.x(), position.y(), position.z())
}

pub fn format_estimate_line(true_position: &GeoPosition, estimated: &GeoPosition) -> String {
    format!(
        "True={};Est={}",
        format_coordinates(true_position),
        format_coordinates(estimated)
    )
}

pub fn format_estimates(estimates: &EstimateSet) -> String {
    estimates
        .iter()
        .map(|e| format_estimate_line(&e.true_position, &e.estimated))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 解析估计文件内容为 (真实位置, 估计位置) 对，保持文件中的顺序
pub fn parse_estimates(content: &str) -> Result<Vec<(GeoPosition, GeoPosition)>> {
    let mut pairs = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fail = |message: &str| NavError::Parse {
            line: i + 1,
            message: format!("{}: '{}'", message, line),
        };

        let (true_part, est_part) = line.split_once(';').ok_or_else(|| fail("缺少分号"))?;
        let true_text = true_part
            .strip_prefix("True=")
            .ok_or_else(|| fail("缺少 True= 字段"))?;
        let est_text = est_part
            .strip_prefix("Est=")
            .ok_or_else(|| fail("缺少 Est= 字段"))?;

        pairs.push((GeoPosition::parse(true_text)?, GeoPosition::parse(est_text)?));
    }
    Ok(pairs)
}

pub fn write_estimates(path: impl AsRef<Path>, estimates: &EstimateSet) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, &format_estimates(estimates))?;
    info!(
        "{} 估计结果 {} 条写入 {}",
        estimates.method,
        estimates.len(),
        path.display()
    );
    Ok(())
}

pub fn read_estimates(path: impl AsRef<Path>) -> Result<Vec<(GeoPosition, GeoPosition)>> {
    parse_estimates(&read_text(path.as_ref())?)
}

// ============================================================================
// 评估文件
// ============================================================================

pub fn format_evaluation(rows: &[CdfRow]) -> String {
    rows.iter()
        .map(CdfRow::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_evaluation(path: impl AsRef<Path>, rows: &[CdfRow]) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, &format_evaluation(rows))?;
    info!("累积分布表 {} 行写入 {}", rows.len(), path.display());
    Ok(())
}
