//! 预处理流水线的配置.
//!
//! 所有路径与文件名均显式地保存在 [`PipelineConfig`] 中, 并在构造各阶段组件时传入.

use crate::consts::{hu::LUNG_THRESHOLD, DEFAULT_TARGET_SPACING};
use crate::dataset::labels::CancerStatus;
use crate::resample::{ResampleError, Resampler};
use crate::segment::LungSegmenter;
use std::path::{Path, PathBuf};

/// 默认的标签表文件名.
pub const LABELS_FILE_NAME: &str = "stage1_labels.csv";

/// 流水线配置.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// 输入数据目录, 包含标签表.
    pub input_data_dir: PathBuf,
    /// DICOM 图像目录, 每个病人一个子目录.
    pub input_images_dir: PathBuf,
    /// 预处理结果目录, 每个病人一个子目录.
    pub processed_images_dir: PathBuf,
    /// 绘图输出目录.
    pub plots_dir: PathBuf,
    /// 标签表文件名.
    pub labels_file_name: String,
    /// 从第几个病人 (按编号排序后的位置) 开始处理, 用于断点续跑.
    pub resume_from: usize,
    /// 重采样目标体素分辨率 (z, 高, 宽), 毫米.
    pub target_spacing: [f64; 3],
    /// 肺分割的空气/组织阈值.
    pub lung_threshold: i16,
}

impl Default for PipelineConfig {
    /// 以当前目录为根.
    fn default() -> Self {
        Self::with_base(".")
    }
}

impl PipelineConfig {
    /// 以 `base` 为根目录构建默认布局:
    ///
    /// - `base/data/`
    /// - `base/data/sample_images/`
    /// - `base/data/processed_images/`
    /// - `base/plots/`
    pub fn with_base<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        let data = base.join("data");
        Self {
            input_images_dir: data.join("sample_images"),
            processed_images_dir: data.join("processed_images"),
            input_data_dir: data,
            plots_dir: base.join("plots"),
            labels_file_name: LABELS_FILE_NAME.to_owned(),
            resume_from: 0,
            target_spacing: DEFAULT_TARGET_SPACING,
            lung_threshold: LUNG_THRESHOLD,
        }
    }

    /// 设置断点续跑位置.
    #[inline]
    pub fn resume_from(mut self, index: usize) -> Self {
        self.resume_from = index;
        self
    }

    /// 标签表的完整路径.
    #[inline]
    pub fn labels_path(&self) -> PathBuf {
        self.input_data_dir.join(&self.labels_file_name)
    }

    /// 病人 DICOM 序列目录.
    #[inline]
    pub fn patient_images_dir(&self, patient_id: &str) -> PathBuf {
        self.input_images_dir.join(patient_id)
    }

    /// 绘图输出路径: `plots_dir/<kind>/<status>_<patient_id>.<ext>`.
    pub fn plot_path(&self, kind: &str, status: CancerStatus, patient_id: &str, ext: &str) -> PathBuf {
        let mut path = self.plots_dir.join(kind);
        path.push(format!("{status}_{patient_id}.{ext}"));
        path
    }

    /// 按配置构建重采样器.
    #[inline]
    pub fn resampler(&self) -> Result<Resampler, ResampleError> {
        Resampler::new(self.target_spacing)
    }

    /// 按配置构建肺分割器.
    #[inline]
    pub fn segmenter(&self) -> LungSegmenter {
        LungSegmenter::new(self.lung_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let cfg = PipelineConfig::with_base("/work");
        assert_eq!(cfg.input_data_dir, Path::new("/work/data"));
        assert_eq!(cfg.input_images_dir, Path::new("/work/data/sample_images"));
        assert_eq!(
            cfg.processed_images_dir,
            Path::new("/work/data/processed_images")
        );
        assert_eq!(cfg.labels_path(), Path::new("/work/data/stage1_labels.csv"));
        assert_eq!(
            cfg.patient_images_dir("abc"),
            Path::new("/work/data/sample_images/abc")
        );
        assert_eq!(cfg.resume_from, 0);
        assert_eq!(cfg.target_spacing, [1.0; 3]);
        assert_eq!(cfg.segmenter(), LungSegmenter::default());
        assert_eq!(PipelineConfig::default().plots_dir, Path::new("./plots"));
    }

    #[test]
    fn test_plot_path() {
        let cfg = PipelineConfig::with_base("/work").resume_from(3);
        assert_eq!(cfg.resume_from, 3);
        assert_eq!(
            cfg.plot_path("hist", CancerStatus::Benign, "abc", "png"),
            Path::new("/work/plots/hist/benign_abc.png")
        );
    }

    #[test]
    fn test_bad_target_spacing() {
        let mut cfg = PipelineConfig::default();
        cfg.target_spacing = [1.0, 0.0, 1.0];
        assert!(cfg.resampler().is_err());
    }
}
