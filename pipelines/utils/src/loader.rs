//! 对 `ct_lung::config` 的更一层封装. 从环境变量或者家目录获取流水线配置.

use anyhow::{anyhow, Context};
use ct_lung::config::PipelineConfig;
use std::env;
use std::path::PathBuf;

/// 数据根目录环境变量.
pub const BASE_DIR_VAR: &str = "KAGGLE_LUNG_DIR";

/// 断点续跑位置环境变量.
pub const RESUME_VAR: &str = "KAGGLE_LUNG_RESUME";

/// 获取数据根目录.
///
/// 1. 若环境变量 `$KAGGLE_LUNG_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/kaggle_lung`.
pub fn base_dir_from_env_or_home() -> anyhow::Result<PathBuf> {
    match env::var(BASE_DIR_VAR) {
        Ok(d) if !d.is_empty() => Ok(PathBuf::from(d)),
        _ => ct_lung::dataset::home_dataset_dir_with(["kaggle_lung"])
            .ok_or_else(|| anyhow!("cannot locate home directory, set `${BASE_DIR_VAR}`")),
    }
}

/// 解析断点续跑位置. 空值视为 0.
pub fn parse_resume(value: Option<&str>) -> anyhow::Result<usize> {
    match value.map(str::trim) {
        None | Some("") => Ok(0),
        Some(v) => v
            .parse()
            .with_context(|| format!("invalid resume index `{v}`")),
    }
}

/// 从 `$KAGGLE_LUNG_DIR` 或者 `$HOME/dataset/kaggle_lung` 构建流水线配置.
///
/// 续跑位置依次取自第一个命令行参数与 `$KAGGLE_LUNG_RESUME`.
pub fn config_from_env_or_home() -> anyhow::Result<PipelineConfig> {
    let base = base_dir_from_env_or_home()?;
    let resume = env::args().nth(1).or_else(|| env::var(RESUME_VAR).ok());
    let cfg = PipelineConfig::with_base(&base).resume_from(parse_resume(resume.as_deref())?);
    log::info!(
        "dataset base `{}`, resuming from #{}",
        base.display(),
        cfg.resume_from
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resume() {
        assert_eq!(parse_resume(None).unwrap(), 0);
        assert_eq!(parse_resume(Some("")).unwrap(), 0);
        assert_eq!(parse_resume(Some(" 12 ")).unwrap(), 12);
        assert!(parse_resume(Some("-1")).is_err());
        assert!(parse_resume(Some("abc")).is_err());
    }
}
