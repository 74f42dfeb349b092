//! 程序运行函数.

use crate::profile::{RunProfile, Stage};
use anyhow::Context;
use ct_lung::calibrate::calibrate_scan;
use ct_lung::config::PipelineConfig;
use ct_lung::dataset::{resumable_scan_loader, ArtifactStore, RawScan};
use ct_lung::resample::Resampler;
use ct_lung::segment::LungSegmenter;
use ct_lung::VoxelGrid;
use std::time::Instant;

/// 单个病人的处理摘要.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSummary {
    /// 重采样前形状.
    pub before: ct_lung::Idx3d,
    /// 重采样后形状.
    pub after: ct_lung::Idx3d,
    /// 重采样后实际体素分辨率.
    pub spacing: [f64; 3],
    /// 未填充掩码中的肺体素个数.
    pub lungs: usize,
    /// 填充掩码中的肺体素个数.
    pub lungs_fill: usize,
}

/// 处理单个病人所需的各阶段组件.
pub struct Stages {
    resampler: Resampler,
    segmenter: LungSegmenter,
    store: ArtifactStore,
}

impl Stages {
    /// 按配置构建.
    pub fn from_config(cfg: &PipelineConfig) -> anyhow::Result<Self> {
        Ok(Self {
            resampler: cfg.resampler()?,
            segmenter: cfg.segmenter(),
            store: ArtifactStore::new(&cfg.processed_images_dir),
        })
    }

    /// 校准, 重采样, 分割并保存一个已加载的扫描.
    pub fn process(&self, patient_id: &str, scan: RawScan, profile: &mut RunProfile) -> anyhow::Result<PatientSummary> {
        let before = scan.pixels.dim();
        let volume = profile
            .time(Stage::Calibrate, || calibrate_scan(scan.pixels.view(), &scan.meta))
            .context("calibration failed")?;
        drop(scan);

        let volume = profile
            .time(Stage::Resample, || self.resampler.resample(&volume))
            .context("resampling failed")?;

        let (lungs, lungs_fill) = profile.time(Stage::Segment, || {
            (
                self.segmenter.segment(&volume, false),
                self.segmenter.segment(&volume, true),
            )
        });

        profile
            .time(Stage::Write, || {
                self.store.write(patient_id, &volume, &lungs, &lungs_fill)
            })
            .context("cannot save artifacts")?;

        Ok(PatientSummary {
            before,
            after: volume.shape(),
            spacing: volume.spacing(),
            lungs: lungs.count(),
            lungs_fill: lungs_fill.count(),
        })
    }
}

/// 日志中的进度标记, 从 1 开始计数.
fn progress(index: usize, total: usize) -> String {
    format!("#{}/{total}", index + 1)
}

/// 实际运行. 单个病人的错误只会被记录, 并跳过该病人.
pub fn run(cfg: &PipelineConfig) -> anyhow::Result<RunProfile> {
    let stages = Stages::from_config(cfg)?;
    let mut loader = resumable_scan_loader(&cfg.input_images_dir, cfg.resume_from)
        .with_context(|| format!("cannot list `{}`", cfg.input_images_dir.display()))?;
    let total = cfg.resume_from + loader.len();
    log::info!("preprocessing {} of {total} patients", loader.len());

    let mut profile = RunProfile::new();
    for index in cfg.resume_from.. {
        let since = Instant::now();
        let Some((id, scan)) = profile.time(Stage::Load, || loader.next()) else {
            break;
        };
        let outcome = scan
            .context("cannot load scan")
            .and_then(|scan| stages.process(&id, scan, &mut profile));
        let at = progress(index, total);
        match outcome {
            Ok(s) => {
                let took = since.elapsed();
                log::info!(
                    "{at} `{id}`: {:?} -> {:?} at {:?} mm, lungs {} / {} voxels, {} ms",
                    s.before,
                    s.after,
                    s.spacing,
                    s.lungs,
                    s.lungs_fill,
                    took.as_millis()
                );
                profile.count_processed(&id, took);
            }
            Err(e) => {
                log::warn!("{at} `{id}` skipped: {e:#}");
                profile.count_skipped();
            }
        }
    }
    Ok(profile.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_lung::dataset::{ScanMeta, SpacingSource};
    use ndarray::{s, Array3};

    /// 组织中带有一个 2x2 气囊的 3 层扫描, 原始值 = HU + 1024.
    fn raw_scan() -> RawScan {
        let mut pixels = Array3::<i32>::from_elem((3, 4, 4), 40 + 1024);
        pixels.slice_mut(s![1, 1..3, 1..3]).fill(-900 + 1024);
        RawScan {
            pixels,
            meta: ScanMeta {
                slice_count: 3,
                slice_shape: (4, 4),
                spacing: [1.0, 1.0, 1.0],
                spacing_source: SpacingSource::ImagePosition,
                intercept: -1024.0,
                slope: 1.0,
            },
        }
    }

    #[test]
    fn test_process_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::with_base(dir.path());
        let stages = Stages::from_config(&cfg).unwrap();
        let mut profile = RunProfile::new();

        let s = stages.process("p0", raw_scan(), &mut profile).unwrap();
        assert_eq!(s.before, (3, 4, 4));
        assert_eq!(s.after, (3, 4, 4));
        assert_eq!(s.spacing, [1.0; 3]);
        assert_eq!((s.lungs, s.lungs_fill), (4, 4));

        let store = ArtifactStore::new(&cfg.processed_images_dir);
        assert!(store.is_complete("p0"));
        let back = store.read("p0").unwrap();
        assert_eq!(back.lungs.count(), 4);
    }

    #[test]
    fn test_run_skips_broken_patients() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::with_base(dir.path());
        let images = &cfg.input_images_dir;
        std::fs::create_dir_all(images.join("empty")).unwrap();
        std::fs::create_dir_all(images.join("garbage")).unwrap();
        std::fs::write(images.join("garbage").join("1.dcm"), b"not a dicom file").unwrap();

        let profile = run(&cfg).unwrap();
        assert_eq!(profile.get_processed(), 0);
        assert_eq!(profile.get_skipped(), 2);

        let profile = run(&cfg.clone().resume_from(1)).unwrap();
        assert_eq!(profile.get_skipped(), 1);
    }

    #[test]
    fn test_progress_is_one_based() {
        assert_eq!(progress(0, 3), "#1/3");
        assert_eq!(progress(2, 3), "#3/3");
        // 从第 2 个病人恢复时, 总数仍然包含已跳过的病人.
        assert_eq!(progress(1, 5), "#2/5");
    }

    #[test]
    fn test_run_without_images_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&PipelineConfig::with_base(dir.path())).is_err());
    }
}
