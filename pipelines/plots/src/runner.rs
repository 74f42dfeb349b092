//! 程序运行函数.

use anyhow::Context;
use ct_lung::config::PipelineConfig;
use ct_lung::dataset::{self, ArtifactStore, CancerStatus, PatientLabels, ProcessedPatient};
use ct_lung::vis::{PlotTarget, RenderConfig, Visualizer};
use ct_lung::{ImgWriteVis, VoxelGrid};

/// 读取标签表. 标签表不可用时所有病人均视为 [`CancerStatus::Unknown`].
fn labels_or_empty(cfg: &PipelineConfig) -> Option<PatientLabels> {
    let path = cfg.labels_path();
    match PatientLabels::open(&path) {
        Ok(labels) => {
            log::info!("{} labelled patients in `{}`", labels.len(), path.display());
            Some(labels)
        }
        Err(e) => {
            log::warn!("labels unavailable, every patient is unknown: {e}");
            None
        }
    }
}

/// 为一个病人生成全部图像.
///
/// 若默认切片越界 (扫描太短), 则改用中间层.
pub fn plot_patient(
    cfg: &PipelineConfig,
    patient_id: &str,
    status: CancerStatus,
    patient: &ProcessedPatient,
) -> anyhow::Result<()> {
    let volume = &patient.volume;
    let mut render = RenderConfig {
        status,
        ..RenderConfig::default()
    };
    if render.slice_index >= volume.len_z() {
        render.slice_index = volume.len_z() / 2;
    }
    let at = |kind: &str, ext: &str| cfg.plot_path(kind, status, patient_id, ext);

    let gray = Visualizer::new(render.clone());
    let hist = gray.plot_histogram(volume, &PlotTarget::Save(at("hist", "png")))?;
    log::debug!("`{patient_id}` HU range {:?}", hist.range());
    gray.plot_slice(volume, &PlotTarget::Save(at("slice", "png")))?;

    let color = Visualizer::new(RenderConfig {
        color: true,
        ..render.clone()
    });
    color.plot_slice(volume, &PlotTarget::Save(at("tissue", "png")))?;

    let lungs = at("lungs", "png");
    if let Some(dir) = lungs.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create `{}`", dir.display()))?;
    }
    patient
        .lungs_fill
        .slice_at(render.slice_index)
        .save(&lungs)
        .with_context(|| format!("cannot save `{}`", lungs.display()))?;

    let triangles = gray.plot_3d(volume, &PlotTarget::Save(at("mesh", "stl")))?;
    let lung_triangles = gray.plot_mask_3d(&patient.lungs_fill, &PlotTarget::Save(at("lungs_mesh", "stl")))?;
    gray.plot_animation(volume, &PlotTarget::Save(at("animation", "gif")))?;
    log::info!("`{patient_id}` ({status}): {triangles} scan triangles, {lung_triangles} lung triangles");
    Ok(())
}

/// 实际运行. 返回 (成功绘制, 跳过) 的病人个数.
///
/// 预处理结果不完整或者绘图失败的病人会被记录并跳过.
pub fn run(cfg: &PipelineConfig) -> anyhow::Result<(usize, usize)> {
    let store = ArtifactStore::new(&cfg.processed_images_dir);
    let ids = dataset::patient_ids(store.root())
        .with_context(|| format!("cannot list `{}`", store.root().display()))?;
    let labels = labels_or_empty(cfg);

    let (mut plotted, mut skipped) = (0, 0);
    for (index, id) in ids.iter().enumerate().skip(cfg.resume_from) {
        let missing = store.missing(id);
        if !missing.is_empty() {
            log::warn!("#{} `{id}` skipped, missing {missing:?}", index + 1);
            skipped += 1;
            continue;
        }
        let status = labels
            .as_ref()
            .map_or(CancerStatus::Unknown, |l| l.cancer_status(id));
        let outcome = store
            .read(id)
            .context("cannot read artifacts")
            .and_then(|patient| plot_patient(cfg, id, status, &patient));
        match outcome {
            Ok(()) => plotted += 1,
            Err(e) => {
                log::warn!("#{} `{id}` skipped: {e:#}", index + 1);
                skipped += 1;
            }
        }
    }
    Ok((plotted, skipped))
}
